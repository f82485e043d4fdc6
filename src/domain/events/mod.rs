//! Domain events
use crate::domain::aggregates::{OrderId, PaymentMethod};
use crate::domain::value_objects::ProductId;
use crate::shipping::BackendZone;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Zone(ZoneEvent),
    Cart(CartEvent),
    Checkout(CheckoutEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ZoneEvent {
    Selected { zone_key: String, backend_zone: BackendZone },
    Cleared { previous: String, reason: ZoneClearReason },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneClearReason { Unavailable, Reset }

#[derive(Clone, Debug, PartialEq)]
pub enum CartEvent {
    LineAdded { product_id: ProductId, quantity: u32 },
    QuantityChanged { product_id: ProductId, quantity: u32 },
    LineRemoved { product_id: ProductId },
    Cleared,
    LinesPruned { product_ids: Vec<ProductId> },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutEvent {
    PaymentSelectionOpened,
    ReturnedToCart,
    OrderCreated { order_id: OrderId, payment_method: PaymentMethod },
    RedirectIssued { order_id: OrderId },
    PaymentInitiationFailed { order_id: OrderId },
    TransferConfirmed { order_id: OrderId },
    PaymentApproved { order_id: OrderId },
    Abandoned { order_id: Option<OrderId> },
}
