//! Order types
//!
//! The client only drafts orders. Ids, statuses and totals always come from the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;
use crate::domain::aggregates::cart::{Cart, CartLine, ItemType};
use crate::domain::value_objects::{Money, ProductId};

/// Backend-assigned order id
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wraps a backend id. Blank ids are rejected so a missing id can never pass as valid.
    pub fn from_backend(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() { None } else { Some(Self(value)) }
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Gateway, BankTransfer }

impl PaymentMethod {
    /// Value of the `payment_method` query parameter on order creation.
    pub fn as_query(&self) -> &'static str {
        match self { Self::Gateway => "mercadopago", Self::BankTransfer => "transfer" }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Preparing, Shipped, Delivered, Cancelled, #[serde(other)] Unknown }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Pending, Approved, Rejected, Refunded, #[serde(other)] Unknown }

/// Delivery address entered at checkout
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct AddressRecord {
    #[validate(length(min = 1, max = 120))]
    pub street: String,
    #[validate(length(min = 1, max = 20))]
    pub number: String,
    pub apartment: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub city: String,
    pub postal_code: Option<String>,
    #[validate(length(min = 6, max = 20))]
    pub phone: String,
    #[validate(length(max = 300))]
    pub notes: Option<String>,
}

/// Contact details for a pickup order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct PickupContact {
    #[validate(length(min = 6, max = 20))]
    pub phone: String,
    pub name: Option<String>,
}

/// Address sent with the order; pickup orders carry the store address instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShippingAddress {
    Delivery { zone: String, cost: Money, address: AddressRecord },
    Pickup { pickup_address: String, phone: String, name: Option<String> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDraftItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub item_type: ItemType,
}

impl From<&CartLine> for OrderDraftItem {
    fn from(line: &CartLine) -> Self {
        Self { product_id: line.product_id.clone(), quantity: line.quantity, item_type: line.item_type() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub items: Vec<OrderDraftItem>,
    pub shipping_address: ShippingAddress,
    #[serde(skip)]
    pub payment_method: Option<PaymentMethod>,
}

impl OrderDraft {
    pub fn from_cart(cart: &Cart, shipping_address: ShippingAddress, payment_method: PaymentMethod) -> Self {
        let items = cart.lines().iter().map(OrderDraftItem::from).collect();
        Self { items, shipping_address, payment_method: Some(payment_method) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine { pub product_id: Option<ProductId>, pub name: String, pub quantity: u32, pub unit_price: Money }

/// Order as the backend reports it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub items: Vec<OrderLine>,
    pub shipping_cost: Money,
    pub total: Money,
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_paid(&self) -> bool { self.payment_status == PaymentStatus::Approved }
}

/// Bank-transfer instructions shown after a transfer order is placed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstructions {
    pub transfer_alias: String,
    pub contact_channel: Option<String>,
}
