//! Server-confirmed cart state
//!
//! The local cart only ever changes to a snapshot the backend returned. Failed
//! calls leave it exactly as it was. Mutations on the same line are serialized,
//! and responses are sequenced so a late answer cannot roll back a newer one.

mod locks;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::api::StorefrontApi;
use crate::domain::aggregates::{Cart, LineItemKind};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{Money, ProductId};
use crate::shipping::{FreeShippingEvaluation, FreeShippingRule};
use crate::{Result, StorefrontError};
use locks::LineLocks;

struct Applied {
    cart: Cart,
    seq: u64,
    /// Seq of the newest whole-cart snapshot; line responses issued before it are void.
    whole_seq: u64,
}

enum Scope<'a> {
    Line(&'a ProductId),
    Whole,
}

pub struct CartState {
    api: Arc<dyn StorefrontApi>,
    applied: RwLock<Applied>,
    next_seq: AtomicU64,
    locks: LineLocks,
    events: Mutex<Vec<DomainEvent>>,
}

impl CartState {
    pub fn new(api: Arc<dyn StorefrontApi>) -> Self {
        Self {
            api,
            applied: RwLock::new(Applied { cart: Cart::new(), seq: 0, whole_seq: 0 }),
            next_seq: AtomicU64::new(1),
            locks: LineLocks::default(),
            events: Mutex::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Applied> { self.applied.read().unwrap_or_else(PoisonError::into_inner) }
    fn write(&self) -> RwLockWriteGuard<'_, Applied> { self.applied.write().unwrap_or_else(PoisonError::into_inner) }

    fn issue(&self) -> u64 { self.next_seq.fetch_add(1, Ordering::SeqCst) }

    fn apply(&self, seq: u64, cart: Cart, scope: Scope<'_>) {
        let mut applied = self.write();
        if seq > applied.seq {
            applied.cart = cart;
            applied.seq = seq;
            if matches!(scope, Scope::Whole) { applied.whole_seq = seq; }
        } else if seq < applied.whole_seq {
            tracing::debug!(seq, whole = applied.whole_seq, "discarding response overtaken by a whole-cart snapshot");
        } else if let Scope::Line(product_id) = scope {
            // Older than the last snapshot, but still the latest word on its own line.
            let line = cart.line(product_id).cloned();
            applied.cart.put_line(product_id, line);
        } else {
            tracing::debug!(seq, applied = applied.seq, "discarding stale cart snapshot");
        }
    }

    fn raise(&self, event: CartEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(DomainEvent::Cart(event));
    }

    pub fn take_events(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn snapshot(&self) -> Cart { self.read().cart.clone() }
    pub fn is_empty(&self) -> bool { self.read().cart.is_empty() }
    pub fn total(&self) -> Money { self.read().cart.total() }

    pub fn free_shipping(&self, rule: &FreeShippingRule) -> FreeShippingEvaluation {
        rule.evaluate(self.read().cart.lines())
    }

    /// Replaces the local cart with the backend's.
    pub async fn hydrate(&self) -> Result<()> {
        let seq = self.issue();
        let cart = self.api.fetch_cart().await?;
        self.apply(seq, cart, Scope::Whole);
        Ok(())
    }

    pub async fn add_line(&self, product_id: &ProductId, quantity: u32, kind: LineItemKind) -> Result<()> {
        let _line = self.locks.acquire(product_id).await;
        let merged = self.read().cart.check_add(product_id, quantity, &kind)?;
        let seq = self.issue();
        let cart = self.api.add_cart_item(product_id, quantity).await.map_err(|e| {
            tracing::warn!(%product_id, quantity, error = %e, "add to cart failed");
            e
        })?;
        self.apply(seq, cart, Scope::Line(product_id));
        tracing::info!(%product_id, quantity, merged, "cart line added");
        self.raise(CartEvent::LineAdded { product_id: product_id.clone(), quantity });
        Ok(())
    }

    /// Sets an absolute quantity. An unchanged quantity returns without a backend call.
    pub async fn set_quantity(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        let _line = self.locks.acquire(product_id).await;
        self.set_quantity_locked(product_id, quantity).await
    }

    pub async fn increment(&self, product_id: &ProductId) -> Result<()> {
        let _line = self.locks.acquire(product_id).await;
        let current = self.current_quantity(product_id)?;
        self.set_quantity_locked(product_id, current.saturating_add(1)).await
    }

    /// Never drops below one; removing a line is an explicit [`Self::remove_line`].
    pub async fn decrement(&self, product_id: &ProductId) -> Result<()> {
        let _line = self.locks.acquire(product_id).await;
        let current = self.current_quantity(product_id)?;
        self.set_quantity_locked(product_id, current.saturating_sub(1)).await
    }

    fn current_quantity(&self, product_id: &ProductId) -> Result<u32> {
        self.read().cart.line(product_id).map(|l| l.quantity).ok_or_else(|| StorefrontError::NotInCart(product_id.to_string()))
    }

    async fn set_quantity_locked(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        if !self.read().cart.check_set(product_id, quantity)? {
            tracing::debug!(%product_id, quantity, "quantity unchanged");
            return Ok(());
        }
        let seq = self.issue();
        let cart = self.api.update_cart_item(product_id, quantity).await.map_err(|e| {
            tracing::warn!(%product_id, quantity, error = %e, "quantity update failed");
            e
        })?;
        self.apply(seq, cart, Scope::Line(product_id));
        self.raise(CartEvent::QuantityChanged { product_id: product_id.clone(), quantity });
        Ok(())
    }

    /// Removing a line that is not in the cart succeeds without a backend call.
    pub async fn remove_line(&self, product_id: &ProductId) -> Result<()> {
        let _line = self.locks.acquire(product_id).await;
        if self.read().cart.line(product_id).is_none() { return Ok(()); }
        let seq = self.issue();
        let cart = self.api.remove_cart_item(product_id).await?;
        self.apply(seq, cart, Scope::Line(product_id));
        self.raise(CartEvent::LineRemoved { product_id: product_id.clone() });
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if self.is_empty() { return Ok(()); }
        let seq = self.issue();
        let cart = self.api.clear_cart().await?;
        self.apply(seq, cart, Scope::Whole);
        self.locks.release_idle().await;
        tracing::info!("cart cleared");
        self.raise(CartEvent::Cleared);
        Ok(())
    }

    /// Drops lines whose product or combo was deactivated. Local only: the backend
    /// keeps them until its own cleanup, but they are never submitted.
    pub fn prune_unavailable(&self) -> Vec<ProductId> {
        let removed = self.write().cart.prune_inactive();
        if !removed.is_empty() {
            tracing::warn!(count = removed.len(), "dropped unavailable cart lines");
            self.raise(CartEvent::LinesPruned { product_ids: removed.clone() });
        }
        removed
    }

    /// Empties the local cart without a backend call, for when the backend
    /// already emptied it (order placed) but the confirming call failed.
    pub(crate) fn reset_local(&self) {
        let seq = self.issue();
        self.apply(seq, Cart::new(), Scope::Whole);
    }
}
