//! Per-collection mutual exclusion for load-modify-save sequences.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Table of per-collection exclusive locks.
///
/// One lock exists per collection name for the life of the table. Locks are
/// created on first use and never removed, so the table only grows. The
/// table's own `RwLock` is held just long enough to look up or insert an
/// entry; the per-collection lock is an async mutex held across the whole
/// load-modify-save sequence.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `collection`, created if this is its first use.
    ///
    /// Double-checked: the common path only takes the table's read lock.
    pub fn lock_for(&self, collection: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self
            .locks
            .read()
            .expect("lock table poisoned")
            .get(collection)
        {
            return Arc::clone(lock);
        }
        let mut locks = self.locks.write().expect("lock table poisoned");
        Arc::clone(locks.entry(collection.to_string()).or_default())
    }

    /// Acquire exclusive access to `collection`, waiting for any holder.
    pub async fn acquire(&self, collection: &str) -> OwnedMutexGuard<()> {
        self.lock_for(collection).lock_owned().await
    }

    /// Number of collections that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.read().expect("lock table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
