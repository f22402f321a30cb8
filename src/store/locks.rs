// Per-key serialization for read-modify-write sequences.
//
// The backing store offers no transactions and no row locking, so two
// concurrent approvals can both read stock before either write lands. Every
// mutating sequence in the engine and the ledger runs under the lock for the
// request id or medication id it touches.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use. Lock entries are
    /// small and keyed by stable ids, so they are never reclaimed.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}
