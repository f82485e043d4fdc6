use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use crate::domain::value_objects::ProductId;

/// One async mutex per cart line. Waiters are served in arrival order, so
/// mutations on a line reach the backend in the order they were issued.
#[derive(Default)]
pub(crate) struct LineLocks {
    lines: Mutex<HashMap<ProductId, Arc<Mutex<()>>>>,
}

impl LineLocks {
    pub(crate) async fn acquire(&self, product_id: &ProductId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut lines = self.lines.lock().await;
            Arc::clone(lines.entry(product_id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        lock.lock_owned().await
    }

    /// Forgets locks nobody holds or waits on.
    pub(crate) async fn release_idle(&self) {
        self.lines.lock().await.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
