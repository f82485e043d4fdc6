//! Storefront core
//!
//! Client-side core of a beverage delivery storefront sitting over a REST backend.
//!
//! ## Features
//! - Cart management with stock-bound validation and per-line serialization
//! - Delivery zones, map/dropdown zone selection and shipping pricing
//! - Free-shipping policy evaluation
//! - Checkout with gateway redirect or bank transfer, plus pending-payment recovery
//! - Catalog and order history reads

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod session;
pub mod shipping;
pub mod telemetry;

pub use cart::CartState;
pub use checkout::{CheckoutFlow, CheckoutOutcome, CheckoutState, GatewayReturn, ShippingDetails};
pub use config::StorefrontConfig;
pub use domain::aggregates::{Cart, CartLine, ItemType, LineItemKind, PaymentMethod};
pub use domain::value_objects::{LatLng, Money, ProductId};
pub use session::Session;
pub use shipping::{BackendZone, FreeShippingRule, PriceTable, ShippingPriceResolver, ZoneCatalog, ZoneSelection};

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorefrontError {
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: String, requested: u32, available: u32 },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    #[error("Product {0} is not in the cart")]
    NotInCart(String),

    #[error("Zone {0} is not available")]
    ZoneUnavailable(String),

    #[error("Unknown zone: {0}")]
    InvalidZoneKind(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid shipping details: {0}")]
    InvalidShipping(String),

    #[error("Order creation failed: {0}")]
    OrderCreationFailed(String),

    #[error("Payment initiation failed: {0}")]
    PaymentInitiationFailed(String),

    #[error("Cannot {action} while in {state}")]
    InvalidTransition { action: &'static str, state: &'static str },

    #[error("Age verification required")]
    AgeVerificationRequired,

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Not found")]
    NotFound,

    #[error("Backend rejected the request ({status})")]
    BackendValidationError { status: u16, detail: Option<String> },

    #[error("Backend error ({status})")]
    BackendServerError { status: u16 },

    #[error("Malformed backend response: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl StorefrontError {
    /// Message suitable for a transient notification.
    ///
    /// Backend validation detail is passed through verbatim; everything else
    /// falls back to a fixed message per category.
    pub fn user_message(&self) -> String {
        match self {
            Self::BackendValidationError { detail: Some(detail), .. } => detail.clone(),
            Self::BackendValidationError { status: 404, .. } | Self::NotFound => "No encontramos lo que buscabas.".into(),
            Self::BackendValidationError { .. } => "Revisá los datos ingresados e intentá nuevamente.".into(),
            Self::BackendServerError { .. } => "Error del servidor. Intentá más tarde.".into(),
            Self::RequestTimeout => "La solicitud tardó demasiado. Intentá nuevamente.".into(),
            Self::NetworkUnavailable(_) => "Sin conexión a internet. Verificá tu conexión.".into(),
            Self::InsufficientStock { available, .. } => format!("Solo hay {available} unidades disponibles."),
            Self::InvalidQuantity(_) => "La cantidad debe ser al menos 1.".into(),
            Self::NotInCart(_) => "El producto ya no está en tu carrito.".into(),
            Self::ZoneUnavailable(_) => "La zona seleccionada no está disponible. Elegí otra zona.".into(),
            Self::InvalidZoneKind(_) => "Zona de envío desconocida.".into(),
            Self::EmptyCart => "Tu carrito está vacío.".into(),
            Self::InvalidShipping(_) => "Completá los datos de envío.".into(),
            Self::OrderCreationFailed(_) => "No pudimos crear tu pedido. Intentá nuevamente.".into(),
            Self::PaymentInitiationFailed(_) => "No pudimos iniciar el pago. Intentá nuevamente.".into(),
            Self::AgeVerificationRequired => "Debés ser mayor de 18 años para comprar.".into(),
            Self::InvalidTransition { .. } | Self::Decode(_) | Self::Storage(_) => "Ocurrió un error inesperado.".into(),
        }
    }

    /// Whether retrying the same action later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnavailable(_) | Self::RequestTimeout | Self::BackendServerError { .. } | Self::PaymentInitiationFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
