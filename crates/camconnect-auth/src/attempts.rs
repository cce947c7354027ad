//! PIN attempt counter mirrored to persistent storage

use crate::storage::{keys, KeyValueStore, StoreEdit};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Number of PIN attempts made in the current (non-locked) sequence.
///
/// Every mutation is written through to the store so a restart in the middle
/// of a sequence keeps its count. Mutations are serialized so the persisted
/// value never lags behind a concurrent update.
pub struct AttemptCounter {
    value: AtomicU32,
    write_lock: Mutex<()>,
    store: Arc<dyn KeyValueStore>,
}

impl AttemptCounter {
    /// Restore the counter from storage (absent or unreadable means 0)
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let value = store
            .get_i64(keys::PIN_ATTEMPTS)
            .await
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);
        debug!("Loaded PIN attempt count: {}", value);
        Self {
            value: AtomicU32::new(value),
            write_lock: Mutex::new(()),
            store,
        }
    }

    /// Current attempt count
    pub fn get(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }

    /// Add one attempt and return the new count
    pub async fn increment(&self) -> u32 {
        let _guard = self.write_lock.lock().await;
        let value = self.value.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.persist(StoreEdit::new().put(keys::PIN_ATTEMPTS, value))
            .await;
        value
    }

    /// Set the count back to 0
    #[cfg(test)]
    pub async fn reset(&self) {
        self.reset_with(StoreEdit::new()).await;
    }

    /// Set the count back to 0, committing `edit` in the same write
    pub(crate) async fn reset_with(&self, edit: StoreEdit) {
        let _guard = self.write_lock.lock().await;
        self.value.store(0, Ordering::SeqCst);
        self.persist(edit.put(keys::PIN_ATTEMPTS, 0)).await;
    }

    async fn persist(&self, edit: StoreEdit) {
        if let Err(e) = self.store.apply(edit).await {
            warn!("Failed to persist PIN attempt state: {}", e);
        }
    }
}
