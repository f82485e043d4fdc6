//! Backend REST API seam.
//!
//! [`StorefrontApi`] is what cart and checkout talk to. [`HttpStorefrontApi`] is the
//! production implementation; tests swap in an in-memory backend.

use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::aggregates::{Cart, CatalogFilter, Combo, Order, OrderDraft, OrderId, Product, TransferInstructions};
use crate::domain::value_objects::ProductId;
use crate::shipping::PriceTable;
use crate::Result;

pub mod http;
pub mod payload;
#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpStorefrontApi;
pub use payload::{OrderReceipt, PaymentPreference};

/// Every mutating cart call returns the authoritative cart after the change.
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    async fn fetch_cart(&self) -> Result<Cart>;
    async fn add_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<Cart>;
    async fn update_cart_item(&self, product_id: &ProductId, quantity: u32) -> Result<Cart>;
    async fn remove_cart_item(&self, product_id: &ProductId) -> Result<Cart>;
    async fn clear_cart(&self) -> Result<Cart>;

    async fn list_products(&self, filter: &CatalogFilter) -> Result<Vec<Product>>;
    async fn get_product(&self, id: &ProductId) -> Result<Product>;
    async fn list_combos(&self, filter: &CatalogFilter) -> Result<Vec<Combo>>;
    async fn get_combo(&self, id: &ProductId) -> Result<Combo>;

    /// The idempotency key lets the backend fold retried submissions into one order.
    async fn create_order(&self, draft: &OrderDraft, idempotency_key: Uuid) -> Result<OrderReceipt>;
    async fn my_orders(&self) -> Result<Vec<Order>>;
    async fn get_order(&self, id: &OrderId) -> Result<Order>;

    async fn create_payment_preference(&self, order_id: &OrderId) -> Result<PaymentPreference>;

    async fn shipping_prices(&self) -> Result<PriceTable>;
    async fn payment_settings(&self) -> Result<TransferInstructions>;
}
