//! Authenticated session context
//!
//! Owns the backend handle for one signed-in user. Cart and checkout are built
//! from it rather than from app-wide singletons.

use std::fmt;
use std::sync::Arc;
use crate::api::{HttpStorefrontApi, StorefrontApi};
use crate::cart::CartState;
use crate::checkout::{CheckoutFlow, FilePendingPaymentStore};
use crate::config::StorefrontConfig;
use crate::{Result, StorefrontError};

#[derive(Clone)]
pub struct Session {
    api: Arc<dyn StorefrontApi>,
    age_verified: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("age_verified", &self.age_verified).finish_non_exhaustive()
    }
}

impl Session {
    /// Session against the configured backend using the user's bearer token.
    pub fn connect(config: &StorefrontConfig, token: impl Into<String>, age_verified: bool) -> Result<Self> {
        let api = HttpStorefrontApi::new(config, Some(token.into()))?;
        Ok(Self::with_api(Arc::new(api), age_verified))
    }

    pub fn with_api(api: Arc<dyn StorefrontApi>, age_verified: bool) -> Self {
        Self { api, age_verified }
    }

    pub fn api(&self) -> Arc<dyn StorefrontApi> { Arc::clone(&self.api) }
    pub fn is_age_verified(&self) -> bool { self.age_verified }

    pub fn mark_age_verified(&mut self) { self.age_verified = true; }

    pub fn require_age_verified(&self) -> Result<()> {
        if self.age_verified { Ok(()) } else { Err(StorefrontError::AgeVerificationRequired) }
    }

    /// Empty cart for this session, hydrated from the backend.
    pub async fn open_cart(&self) -> Result<Arc<CartState>> {
        self.require_age_verified()?;
        let cart = Arc::new(CartState::new(self.api()));
        cart.hydrate().await?;
        tracing::info!(lines = cart.snapshot().line_count(), "cart opened");
        Ok(cart)
    }

    /// Checkout over `cart`, persisting the pending-payment marker at the configured path.
    pub fn checkout(&self, cart: Arc<CartState>, config: &StorefrontConfig) -> Result<CheckoutFlow> {
        self.require_age_verified()?;
        let store = Arc::new(FilePendingPaymentStore::new(config.pending_payment_path.clone()));
        Ok(CheckoutFlow::new(cart, self.api(), store, config))
    }
}
