//! Raw backend payloads and their mapping into domain types.
//!
//! Backend documents are loosely shaped: ids arrive as `id` or `_id`, most fields
//! are optional and prices may be numbers or strings. Everything is normalized
//! here, once, so the rest of the crate works with typed entities only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::domain::aggregates::{
    Cart, CartLine, Combo, ComboChild, Order, OrderDraft, OrderId, OrderLine, OrderStatus,
    PaymentMethod, PaymentStatus, Product, TransferInstructions,
};
use crate::domain::value_objects::{Money, ProductId};
use crate::shipping::{BackendZone, PriceTable, ZonePrice};
use crate::{Result, StorefrontError};

fn pick_id(id: Option<String>, mongo_id: Option<String>) -> Option<String> {
    id.or(mongo_id).filter(|s| !s.trim().is_empty())
}

fn product_id(raw: Option<String>, what: &str) -> Result<ProductId> {
    let raw = raw.ok_or_else(|| StorefrontError::Decode(format!("{what} without id")))?;
    ProductId::new(raw).map_err(|e| StorefrontError::Decode(format!("{what}: {e}")))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProduct {
    pub id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<u32>,
    pub is_active: Option<bool>,
    pub image_url: Option<String>,
}

impl RawProduct {
    pub fn into_domain(self) -> Result<Product> {
        let id = product_id(pick_id(self.id, self.mongo_id), "product")?;
        Ok(Product {
            id,
            name: self.name,
            description: self.description,
            category: self.category,
            price: self.price.unwrap_or_default(),
            stock: self.stock.unwrap_or(0),
            is_active: self.is_active.unwrap_or(true),
            image_url: self.image_url,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawComboItem {
    pub name: Option<String>,
    pub product: Option<RawProduct>,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCombo {
    pub id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Money>,
    #[serde(default, alias = "products")]
    pub items: Vec<RawComboItem>,
    pub is_active: Option<bool>,
    pub image_url: Option<String>,
}

impl RawCombo {
    pub fn into_domain(self) -> Result<Combo> {
        let id = product_id(pick_id(self.id, self.mongo_id), "combo")?;
        let items = self.items.into_iter()
            .map(|i| ComboChild {
                name: i.name.or_else(|| i.product.map(|p| p.name)).unwrap_or_default(),
                quantity: i.quantity,
            })
            .collect();
        Ok(Combo {
            id,
            name: self.name,
            description: self.description,
            price: self.price.unwrap_or_default(),
            items,
            is_active: self.is_active.unwrap_or(true),
            image_url: self.image_url,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCartItem {
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: u32,
    pub item_type: Option<String>,
    pub price: Option<Money>,
    pub product: Option<RawProduct>,
    pub combo: Option<RawCombo>,
}

impl RawCartItem {
    /// `None` when the referenced product or combo no longer exists.
    fn into_line(self) -> Option<CartLine> {
        let is_combo = self.item_type.as_deref() == Some("combo") || (self.product.is_none() && self.combo.is_some());
        let (product_id, name, price, kind, active) = if is_combo {
            let combo = self.combo?.into_domain().ok()?;
            let kind = combo.line_kind();
            (combo.id, combo.name, combo.price, kind, combo.is_active)
        } else {
            let product = self.product?.into_domain().ok()?;
            let kind = product.line_kind();
            (product.id, product.name, product.price, kind, product.is_active)
        };
        Some(CartLine { product_id, name, quantity: self.quantity, unit_price: self.price.unwrap_or(price), kind, active })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCart {
    #[serde(default)]
    pub items: Vec<RawCartItem>,
}

impl RawCart {
    pub fn into_domain(self) -> Cart {
        let lines = self.items.into_iter().filter_map(|item| {
            let reference = item.product_id.clone().unwrap_or_default();
            let line = item.into_line();
            if line.is_none() {
                tracing::warn!(product_id = %reference, "dropping cart line for a product that no longer exists");
            }
            line
        });
        Cart::from_lines(lines)
    }
}

fn parse_payment_method(raw: &str) -> Option<PaymentMethod> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "gateway" | "mercadopago" => Some(PaymentMethod::Gateway),
        "bank_transfer" | "transfer" | "transferencia" => Some(PaymentMethod::BankTransfer),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrderItem {
    pub product_id: Option<String>,
    pub name: Option<String>,
    pub product: Option<RawProduct>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(alias = "price")]
    pub unit_price: Option<Money>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawOrder {
    pub id: Option<String>,
    #[serde(rename = "_id")]
    pub mongo_id: Option<String>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub items: Vec<RawOrderItem>,
    pub shipping_cost: Option<Money>,
    #[serde(alias = "total_amount")]
    pub total: Option<Money>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RawOrder {
    pub fn order_id(&self) -> Option<OrderId> {
        pick_id(self.id.clone(), self.mongo_id.clone()).and_then(OrderId::from_backend)
    }

    pub fn into_domain(self) -> Result<Order> {
        let id = self.order_id().ok_or_else(|| StorefrontError::Decode("order without id".into()))?;
        let items = self.items.into_iter()
            .map(|i| {
                let product_name = i.product.as_ref().map(|p| p.name.clone());
                OrderLine {
                    product_id: i.product_id.and_then(|p| ProductId::new(p).ok()),
                    name: i.name.or(product_name).unwrap_or_default(),
                    quantity: i.quantity,
                    unit_price: i.unit_price.unwrap_or_default(),
                }
            })
            .collect();
        Ok(Order {
            id,
            status: self.status.unwrap_or_default(),
            payment_status: self.payment_status.unwrap_or_default(),
            payment_method: self.payment_method.as_deref().and_then(parse_payment_method),
            items,
            shipping_cost: self.shipping_cost.unwrap_or_default(),
            total: self.total.unwrap_or_default(),
            created_at: self.created_at,
        })
    }
}

/// What order creation hands back. The id may be missing; the checkout flow
/// treats that as a failed submission.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub order_id: Option<OrderId>,
    pub total: Option<Money>,
}

impl From<RawOrder> for OrderReceipt {
    fn from(raw: RawOrder) -> Self { Self { order_id: raw.order_id(), total: raw.total } }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderBody<'a> {
    pub items: &'a [crate::domain::aggregates::OrderDraftItem],
    pub shipping_address: &'a crate::domain::aggregates::ShippingAddress,
}

impl<'a> From<&'a OrderDraft> for CreateOrderBody<'a> {
    fn from(draft: &'a OrderDraft) -> Self { Self { items: &draft.items, shipping_address: &draft.shipping_address } }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentPreference {
    pub init_point: Option<String>,
    pub preference_id: Option<String>,
}

impl PaymentPreference {
    pub fn redirect_url(&self) -> Option<&str> { self.init_point.as_deref().filter(|u| !u.trim().is_empty()) }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawZonePrice {
    pub price: Option<Money>,
    pub address: Option<String>,
}

/// Shipping settings keyed by zone name. Unknown zones and unpriced entries are skipped.
pub fn price_table(raw: BTreeMap<String, RawZonePrice>) -> PriceTable {
    PriceTable::from_entries(raw.into_iter().filter_map(|(key, entry)| {
        let zone = match key.parse::<BackendZone>() {
            Ok(zone) => zone,
            Err(_) => { tracing::debug!(zone = %key, "ignoring unknown shipping zone"); return None; }
        };
        let Some(price) = entry.price else {
            tracing::warn!(zone = %key, "shipping zone without price is not offered");
            return None;
        };
        Some((zone, ZonePrice { price, address: entry.address }))
    }))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPaymentSettings {
    #[serde(alias = "alias")]
    pub transfer_alias: Option<String>,
    #[serde(alias = "whatsapp")]
    pub contact_channel: Option<String>,
}

impl RawPaymentSettings {
    pub fn into_domain(self) -> Result<TransferInstructions> {
        let transfer_alias = self.transfer_alias.filter(|a| !a.trim().is_empty())
            .ok_or_else(|| StorefrontError::Decode("payment settings without transfer alias".into()))?;
        Ok(TransferInstructions { transfer_alias, contact_channel: self.contact_channel })
    }
}

/// Error body shapes: `{"detail": "..."}`, `{"detail": [{"msg": "..."}]}` or `{"message": "..."}`.
pub fn error_detail(body: &serde_json::Value) -> Option<String> {
    let detail = body.get("detail").or_else(|| body.get("message"))?;
    match detail {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items.iter().filter_map(|i| i.get("msg").and_then(|m| m.as_str())).collect();
            if msgs.is_empty() { None } else { Some(msgs.join("; ")) }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::LineItemKind;
    use serde_json::json;

    #[test]
    fn test_id_aliasing() {
        let a: RawProduct = serde_json::from_value(json!({"_id": "abc", "name": "Gin", "price": 12000, "stock": 4})).unwrap();
        let b: RawProduct = serde_json::from_value(json!({"id": "abc", "name": "Gin", "price": "12000", "stock": 4})).unwrap();
        assert_eq!(a.into_domain().unwrap(), b.into_domain().unwrap());
    }

    #[test]
    fn test_cart_drops_deleted_products() {
        let raw: RawCart = serde_json::from_value(json!({"items": [
            {"product_id": "p1", "quantity": 2, "product": {"_id": "p1", "name": "Vermut", "price": 3500, "stock": 6}},
            {"product_id": "gone", "quantity": 1, "product": null},
            {"product_id": "c1", "quantity": 1, "item_type": "combo", "combo": {"_id": "c1", "name": "Combo Fernet", "price": 9800,
                "products": [{"product": {"_id": "f", "name": "Fernet"}, "quantity": 1}, {"name": "Coca 2L", "quantity": 2}]}}
        ]})).unwrap();
        let cart = raw.into_domain();
        assert_eq!(cart.line_count(), 2);
        let vermut = &cart.lines()[0];
        assert_eq!(vermut.stock_limit(), Some(6));
        assert_eq!(vermut.unit_price, Money::from_units(3500));
        match &cart.lines()[1].kind {
            LineItemKind::Combo { children } => {
                assert_eq!(children[0].name, "Fernet");
                assert_eq!(children[1], ComboChild { name: "Coca 2L".into(), quantity: 2 });
            }
            other => panic!("expected combo, got {other:?}"),
        }
    }

    #[test]
    fn test_inactive_product_line_is_kept_but_flagged() {
        let raw: RawCart = serde_json::from_value(json!({"items": [
            {"quantity": 1, "product": {"id": "p1", "name": "Old", "price": 10, "is_active": false}}
        ]})).unwrap();
        assert!(!raw.into_domain().lines()[0].active);
    }

    #[test]
    fn test_order_without_id() {
        let raw: RawOrder = serde_json::from_value(json!({"status": "pending", "total": 1000})).unwrap();
        let receipt = OrderReceipt::from(raw.clone());
        assert!(receipt.order_id.is_none());
        assert!(matches!(raw.into_domain(), Err(StorefrontError::Decode(_))));
    }

    #[test]
    fn test_order_mapping() {
        let raw: RawOrder = serde_json::from_value(json!({
            "_id": "o-77", "status": "confirmed", "payment_status": "approved", "payment_method": "mercadopago",
            "items": [{"product_id": "p1", "product": {"name": "Malbec"}, "quantity": 2, "price": 4500}],
            "shipping_cost": 0, "total_amount": 9000, "created_at": "2026-03-01T12:00:00Z"
        })).unwrap();
        let order = raw.into_domain().unwrap();
        assert_eq!(order.id.as_str(), "o-77");
        assert!(order.is_paid());
        assert_eq!(order.payment_method, Some(PaymentMethod::Gateway));
        assert_eq!(order.items[0].name, "Malbec");
        assert_eq!(order.total, Money::from_units(9000));
    }

    #[test]
    fn test_unknown_statuses_do_not_fail() {
        let raw: RawOrder = serde_json::from_value(json!({"id": "o1", "status": "on_hold", "payment_status": "chargeback"})).unwrap();
        let order = raw.into_domain().unwrap();
        assert_eq!(order.status, OrderStatus::Unknown);
        assert_eq!(order.payment_status, PaymentStatus::Unknown);
    }

    #[test]
    fn test_price_table_skips_unknown_and_unpriced() {
        let raw: BTreeMap<String, RawZonePrice> = serde_json::from_value(json!({
            "central": {"price": 500}, "remote": {"price": null}, "express": {"price": 3000},
            "pickup": {"price": 0, "address": "Av. Rivadavia 5000"}
        })).unwrap();
        let table = price_table(raw);
        assert_eq!(table.zones().collect::<Vec<_>>(), vec![BackendZone::Central, BackendZone::Pickup]);
        assert_eq!(table.pickup_address(), Some("Av. Rivadavia 5000"));
    }

    #[test]
    fn test_error_detail_shapes() {
        assert_eq!(error_detail(&json!({"detail": "Sin stock"})), Some("Sin stock".into()));
        assert_eq!(error_detail(&json!({"detail": [{"msg": "a"}, {"msg": "b"}]})), Some("a; b".into()));
        assert_eq!(error_detail(&json!({"message": "x"})), Some("x".into()));
        assert_eq!(error_detail(&json!({"detail": ""})), None);
        assert_eq!(error_detail(&json!({})), None);
    }

    #[test]
    fn test_payment_settings_aliases() {
        let raw: RawPaymentSettings = serde_json::from_value(json!({"alias": "bodega.mp", "whatsapp": "+54 9 11 5555 4444"})).unwrap();
        let instructions = raw.into_domain().unwrap();
        assert_eq!(instructions.transfer_alias, "bodega.mp");
        assert!(RawPaymentSettings::default().into_domain().is_err());
    }
}
