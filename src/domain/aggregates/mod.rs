//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{CatalogFilter, Combo, Product};
pub use order::{AddressRecord, Order, OrderDraft, OrderDraftItem, OrderId, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, PickupContact, ShippingAddress, TransferInstructions};
pub use cart::{Cart, CartLine, ComboChild, ItemType, LineItemKind};
