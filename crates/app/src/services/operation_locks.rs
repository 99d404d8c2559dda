//! Per-integration async locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use tillguard_domain::id::StoreId;
use tillguard_domain::provider::Provider;

/// Serializes operations on the same (store, provider) pair within this
/// process. Operations on different pairs run concurrently.
#[derive(Default)]
pub struct OperationLocks {
    locks: Mutex<HashMap<(StoreId, Provider), Arc<tokio::sync::Mutex<()>>>>,
}

impl OperationLocks {
    /// Wait for exclusive access to `(store_id, provider)`.
    pub async fn acquire(&self, store_id: StoreId, provider: Provider) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry((store_id, provider)).or_default())
        };
        lock.lock_owned().await
    }
}
