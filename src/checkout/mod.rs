//! Checkout state machine
//!
//! ```text
//! Cart -> PaymentMethodSelection -> GatewayRedirectPending   -> Terminal(Success | Abandoned)
//!                                -> BankTransferConfirmation
//! ```
//!
//! The backend assigns the order id. Nothing past order creation runs without one.

pub mod pending;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;
use crate::api::StorefrontApi;
use crate::cart::CartState;
use crate::config::StorefrontConfig;
use crate::domain::aggregates::{OrderDraft, OrderDraftItem, OrderId, PaymentMethod, PickupContact, ShippingAddress, TransferInstructions};
use crate::domain::events::{CheckoutEvent, DomainEvent};
use crate::shipping::{BackendZone, PriceTable, ShippingSelection};
use crate::{Result, StorefrontError};

pub use pending::{FilePendingPaymentStore, MemoryPendingPaymentStore, PendingPaymentRecord, PendingPaymentStore};

#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutOutcome {
    Success { order_id: OrderId },
    Abandoned,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutState {
    Cart,
    /// `pending_order` is set when an order exists but its payment could not be started.
    PaymentMethodSelection { pending_order: Option<OrderId> },
    /// `redirect_url` is `None` when the state was rebuilt from a stored record.
    GatewayRedirectPending { order_id: OrderId, redirect_url: Option<String> },
    BankTransferConfirmation { order_id: OrderId, instructions: Option<TransferInstructions> },
    Terminal(CheckoutOutcome),
}

impl CheckoutState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::PaymentMethodSelection { .. } => "payment_method_selection",
            Self::GatewayRedirectPending { .. } => "gateway_redirect_pending",
            Self::BankTransferConfirmation { .. } => "bank_transfer_confirmation",
            Self::Terminal(_) => "terminal",
        }
    }

    /// True once the order is placed or the attempt is over.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::BankTransferConfirmation { .. } | Self::Terminal(_))
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            Self::PaymentMethodSelection { pending_order } => pending_order.as_ref(),
            Self::GatewayRedirectPending { order_id, .. } | Self::BankTransferConfirmation { order_id, .. } => Some(order_id),
            Self::Terminal(CheckoutOutcome::Success { order_id }) => Some(order_id),
            Self::Cart | Self::Terminal(CheckoutOutcome::Abandoned) => None,
        }
    }
}

/// Where the order goes
#[derive(Clone, Debug, PartialEq)]
pub enum ShippingDetails {
    Delivery(ShippingSelection),
    /// Without a `pickup_address` the configured fallback address is used.
    Pickup { contact: PickupContact, pickup_address: Option<String> },
}

impl ShippingDetails {
    /// Pickup at the store address served with the shipping prices.
    pub fn pickup(contact: PickupContact, prices: &PriceTable) -> Self {
        Self::Pickup { contact, pickup_address: prices.pickup_address().map(String::from) }
    }

    fn into_address(self, default_pickup: &str) -> Result<ShippingAddress> {
        match self {
            Self::Delivery(selection) => {
                if selection.zone == BackendZone::Pickup {
                    return Err(StorefrontError::InvalidShipping("pickup requires contact details".into()));
                }
                let address = selection.address.ok_or_else(|| StorefrontError::InvalidShipping("delivery address missing".into()))?;
                address.validate().map_err(|e| StorefrontError::InvalidShipping(e.to_string()))?;
                Ok(ShippingAddress::Delivery { zone: selection.zone.as_str().to_string(), cost: selection.cost, address })
            }
            Self::Pickup { contact, pickup_address } => {
                contact.validate().map_err(|e| StorefrontError::InvalidShipping(e.to_string()))?;
                Ok(ShippingAddress::Pickup {
                    pickup_address: pickup_address.unwrap_or_else(|| default_pickup.to_string()),
                    phone: contact.phone,
                    name: contact.name,
                })
            }
        }
    }
}

/// Status the payment gateway reports on its return redirect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatewayReturn { Approved, Pending, Rejected }

impl GatewayReturn {
    pub fn from_query(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "approved" | "success" => Some(Self::Approved),
            "pending" | "in_process" => Some(Self::Pending),
            "rejected" | "failure" | "cancelled" => Some(Self::Rejected),
            _ => None,
        }
    }
}

pub struct CheckoutFlow {
    cart: Arc<CartState>,
    api: Arc<dyn StorefrontApi>,
    store: Arc<dyn PendingPaymentStore>,
    payment_timeout: Duration,
    pending_ttl: Duration,
    pickup_address: String,
    state: CheckoutState,
    /// Sent as `Idempotency-Key`; the same for every submit of one attempt.
    attempt_key: Uuid,
    events: Vec<DomainEvent>,
}

impl std::fmt::Debug for CheckoutFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutFlow").field("state", &self.state).field("attempt_key", &self.attempt_key).finish_non_exhaustive()
    }
}

impl CheckoutFlow {
    pub fn new(cart: Arc<CartState>, api: Arc<dyn StorefrontApi>, store: Arc<dyn PendingPaymentStore>, config: &StorefrontConfig) -> Self {
        Self {
            cart,
            api,
            store,
            payment_timeout: config.payment_timeout,
            pending_ttl: config.pending_payment_ttl,
            pickup_address: config.pickup_address.clone(),
            state: CheckoutState::Cart,
            attempt_key: Uuid::new_v4(),
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> &CheckoutState { &self.state }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    fn raise(&mut self, event: CheckoutEvent) { self.events.push(DomainEvent::Checkout(event)); }

    fn invalid(&self, action: &'static str) -> StorefrontError {
        StorefrontError::InvalidTransition { action, state: self.state.name() }
    }

    fn new_attempt(&mut self) { self.attempt_key = Uuid::new_v4(); }

    pub async fn proceed_to_payment(&mut self) -> Result<()> {
        if self.state != CheckoutState::Cart { return Err(self.invalid("proceed_to_payment")); }
        self.cart.prune_unavailable();
        if self.cart.is_empty() { return Err(StorefrontError::EmptyCart); }
        self.state = CheckoutState::PaymentMethodSelection { pending_order: None };
        self.raise(CheckoutEvent::PaymentSelectionOpened);
        Ok(())
    }

    /// Back to the cart. The cart is untouched; a new submit starts a new attempt.
    pub fn back(&mut self) -> Result<()> {
        let CheckoutState::PaymentMethodSelection { pending_order } = &self.state else {
            return Err(self.invalid("back"));
        };
        if let Some(order_id) = pending_order {
            tracing::info!(%order_id, "leaving unpaid order behind");
        }
        self.state = CheckoutState::Cart;
        self.new_attempt();
        self.raise(CheckoutEvent::ReturnedToCart);
        Ok(())
    }

    pub async fn submit(&mut self, method: PaymentMethod, shipping: ShippingDetails) -> Result<()> {
        let CheckoutState::PaymentMethodSelection { pending_order } = &self.state else {
            return Err(self.invalid("submit"));
        };
        if let Some(order_id) = pending_order.clone() {
            // An order already exists for this attempt; only its gateway payment is outstanding.
            return match method {
                PaymentMethod::Gateway => self.initiate_gateway(order_id).await,
                PaymentMethod::BankTransfer => Err(self.invalid("submit")),
            };
        }

        let shipping_address = shipping.into_address(&self.pickup_address)?;
        self.cart.prune_unavailable();
        let cart = self.cart.snapshot();
        if cart.is_empty() { return Err(StorefrontError::EmptyCart); }

        let draft = OrderDraft::from_cart(&cart, shipping_address, method);
        let receipt = self.api.create_order(&draft, self.attempt_key).await.map_err(|e| {
            tracing::warn!(payment_method = method.as_query(), error = %e, "order submission failed");
            e
        })?;
        let order_id = receipt.order_id.ok_or_else(|| {
            tracing::error!("order response carried no id");
            StorefrontError::OrderCreationFailed("backend response carried no order id".into())
        })?;
        tracing::info!(%order_id, payment_method = method.as_query(), "order created");
        self.raise(CheckoutEvent::OrderCreated { order_id: order_id.clone(), payment_method: method });

        match method {
            PaymentMethod::Gateway => self.initiate_gateway(order_id).await,
            PaymentMethod::BankTransfer => {
                self.confirm_transfer(order_id).await;
                Ok(())
            }
        }
    }

    /// Asks again for a redirect for the order whose payment could not be started.
    pub async fn retry_payment(&mut self) -> Result<()> {
        match &self.state {
            CheckoutState::PaymentMethodSelection { pending_order: Some(order_id) } => {
                let order_id = order_id.clone();
                self.initiate_gateway(order_id).await
            }
            _ => Err(self.invalid("retry_payment")),
        }
    }

    async fn initiate_gateway(&mut self, order_id: OrderId) -> Result<()> {
        let items = self.cart.snapshot().lines().iter().map(OrderDraftItem::from).collect();
        self.store.save(&PendingPaymentRecord::new(order_id.clone(), items, Utc::now())).await?;

        let failure = match tokio::time::timeout(self.payment_timeout, self.api.create_payment_preference(&order_id)).await {
            Ok(Ok(preference)) => match preference.redirect_url() {
                Some(url) => {
                    tracing::info!(%order_id, "payment redirect issued");
                    self.state = CheckoutState::GatewayRedirectPending { order_id: order_id.clone(), redirect_url: Some(url.to_string()) };
                    self.raise(CheckoutEvent::RedirectIssued { order_id });
                    return Ok(());
                }
                None => "payment preference carried no redirect url".to_string(),
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("payment preference timed out after {}s", self.payment_timeout.as_secs()),
        };

        tracing::warn!(%order_id, reason = %failure, "payment initiation failed");
        if let Err(e) = self.store.remove().await {
            tracing::error!(%order_id, error = %e, "could not remove pending payment record");
        }
        self.state = CheckoutState::PaymentMethodSelection { pending_order: Some(order_id.clone()) };
        self.raise(CheckoutEvent::PaymentInitiationFailed { order_id });
        Err(StorefrontError::PaymentInitiationFailed(failure))
    }

    async fn confirm_transfer(&mut self, order_id: OrderId) {
        let instructions = match self.api.payment_settings().await {
            Ok(instructions) => Some(instructions),
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "transfer instructions unavailable");
                None
            }
        };
        self.empty_cart().await;
        self.state = CheckoutState::BankTransferConfirmation { order_id: order_id.clone(), instructions };
        self.new_attempt();
        self.raise(CheckoutEvent::TransferConfirmed { order_id });
    }

    /// The order is placed, so a failure to clear the backend cart only
    /// affects what the user sees next.
    async fn empty_cart(&self) {
        if let Err(e) = self.cart.clear().await {
            tracing::warn!(error = %e, "clearing cart after order failed; resetting local copy");
            self.cart.reset_local();
        }
    }

    /// Reconciles a return from the gateway using the stored pending record.
    /// Works on a fresh flow too, for an app restarted mid-payment.
    pub async fn resume_after_redirect(&mut self, outcome: GatewayReturn) -> Result<()> {
        if !matches!(self.state, CheckoutState::Cart | CheckoutState::GatewayRedirectPending { .. }) {
            return Err(self.invalid("resume_after_redirect"));
        }
        let record = self.store.load().await?;
        let order_id = match (&record, &self.state) {
            (Some(record), _) => record.order_id.clone(),
            (None, CheckoutState::GatewayRedirectPending { order_id, .. }) => order_id.clone(),
            (None, _) => return Err(self.invalid("resume_after_redirect")),
        };

        match outcome {
            GatewayReturn::Approved => {
                self.store.remove().await?;
                self.empty_cart().await;
                tracing::info!(%order_id, "payment approved");
                self.state = CheckoutState::Terminal(CheckoutOutcome::Success { order_id: order_id.clone() });
                self.new_attempt();
                self.raise(CheckoutEvent::PaymentApproved { order_id });
                Ok(())
            }
            GatewayReturn::Rejected => self.finish_abandoned(Some(order_id)).await,
            GatewayReturn::Pending => {
                // Only an unresolved payment can expire.
                if record.as_ref().is_some_and(|r| r.is_stale(Utc::now(), self.pending_ttl)) {
                    tracing::warn!(%order_id, "pending payment expired");
                    return self.finish_abandoned(Some(order_id)).await;
                }
                let redirect_url = match &self.state {
                    CheckoutState::GatewayRedirectPending { redirect_url, .. } => redirect_url.clone(),
                    _ => None,
                };
                tracing::info!(%order_id, "payment still pending");
                self.state = CheckoutState::GatewayRedirectPending { order_id, redirect_url };
                Ok(())
            }
        }
    }

    /// Ends the attempt from any state that is not already finished.
    pub async fn abandon(&mut self) -> Result<()> {
        if self.state.is_finished() { return Err(self.invalid("abandon")); }
        let order_id = self.state.order_id().cloned();
        self.finish_abandoned(order_id).await
    }

    async fn finish_abandoned(&mut self, order_id: Option<OrderId>) -> Result<()> {
        self.store.remove().await?;
        self.state = CheckoutState::Terminal(CheckoutOutcome::Abandoned);
        self.new_attempt();
        self.raise(CheckoutEvent::Abandoned { order_id });
        Ok(())
    }
}
