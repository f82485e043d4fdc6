//! Pending-payment marker
//!
//! Written just before a gateway redirect and removed once the outcome is known,
//! so a user returning from the gateway (or reopening the app) can be reconciled
//! with the order that was already created.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use crate::domain::aggregates::{OrderDraftItem, OrderId};
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPaymentRecord {
    pub order_id: OrderId,
    pub timestamp_ms: i64,
    pub items: Vec<OrderDraftItem>,
}

impl PendingPaymentRecord {
    pub fn new(order_id: OrderId, items: Vec<OrderDraftItem>, now: DateTime<Utc>) -> Self {
        Self { order_id, timestamp_ms: now.timestamp_millis(), items }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age_ms = now.timestamp_millis().saturating_sub(self.timestamp_ms);
        age_ms > i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Durable slot for at most one pending record.
#[async_trait]
pub trait PendingPaymentStore: Send + Sync {
    async fn load(&self) -> Result<Option<PendingPaymentRecord>>;
    async fn save(&self, record: &PendingPaymentRecord) -> Result<()>;
    /// Removing an absent record is not an error.
    async fn remove(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FilePendingPaymentStore {
    path: PathBuf,
}

impl FilePendingPaymentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
    pub fn path(&self) -> &Path { &self.path }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn storage_error(context: &str, path: &Path, err: impl std::fmt::Display) -> StorefrontError {
    StorefrontError::Storage(format!("{context} {}: {err}", path.display()))
}

#[async_trait]
impl PendingPaymentStore for FilePendingPaymentStore {
    async fn load(&self) -> Result<Option<PendingPaymentRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("reading", &self.path, e)),
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable pending payment record");
                Ok(None)
            }
        }
    }

    async fn save(&self, record: &PendingPaymentRecord) -> Result<()> {
        let bytes = serde_json::to_vec(record).map_err(|e| storage_error("encoding", &self.path, e))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| storage_error("creating", dir, e))?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, bytes).await.map_err(|e| storage_error("writing", &tmp, e))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| storage_error("replacing", &self.path, e))?;
        tracing::debug!(order_id = %record.order_id, "pending payment saved");
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("removing", &self.path, e)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryPendingPaymentStore {
    record: Mutex<Option<PendingPaymentRecord>>,
}

impl MemoryPendingPaymentStore {
    pub fn new() -> Self { Self::default() }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<PendingPaymentRecord>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PendingPaymentStore for MemoryPendingPaymentStore {
    async fn load(&self) -> Result<Option<PendingPaymentRecord>> { Ok(self.slot().clone()) }

    async fn save(&self, record: &PendingPaymentRecord) -> Result<()> {
        *self.slot() = Some(record.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.slot().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ItemType;
    use crate::domain::value_objects::ProductId;

    fn record() -> PendingPaymentRecord {
        let items = vec![OrderDraftItem { product_id: ProductId::new("p1").unwrap(), quantity: 2, item_type: ItemType::Product }];
        PendingPaymentRecord::new(OrderId::from_backend("order-7").unwrap(), items, Utc::now())
    }

    #[test]
    fn test_record_wire_format() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["orderId"], "order-7");
        assert!(json["timestampMs"].is_i64());
        assert_eq!(json["items"][0]["quantity"], 2);
    }

    #[test]
    fn test_staleness() {
        let rec = record();
        let later = Utc::now() + chrono::Duration::hours(25);
        assert!(!rec.is_stale(Utc::now(), Duration::from_secs(24 * 3600)));
        assert!(rec.is_stale(later, Duration::from_secs(24 * 3600)));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePendingPaymentStore::new(dir.path().join("state").join("pending.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let rec = record();
        store.save(&rec).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(rec));
        assert!(!store.temp_path().exists());

        store.remove().await.unwrap();
        store.remove().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(FilePendingPaymentStore::new(path).load().await.unwrap(), None);
    }
}
