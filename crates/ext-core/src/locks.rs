//! Per-key serialization of lifecycle operations.
//!
//! An operation on `(id, namespace)` holds a shared lock on `id` plus a
//! mutex on the pair, so operations on different namespaces of the same id
//! run in parallel while two operations on the same pair queue up. Global
//! operations (global installs, uninstall-all) hold `id` exclusively, which
//! also orders them against every namespace-scoped operation on that id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use ext_meta::{ExtensionId, Namespace};
use tokio::sync::{
    Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock,
};

type Key = (ExtensionId, Namespace);

#[derive(Debug, Default)]
pub struct OperationLocks {
    table: Mutex<LockTable>,
}

#[derive(Debug, Default)]
struct LockTable {
    ids: HashMap<ExtensionId, Arc<RwLock<()>>>,
    pairs: HashMap<Key, Arc<AsyncMutex<()>>>,
}

impl LockTable {
    /// Forget locks nobody holds or waits for.
    fn prune(&mut self) {
        self.ids.retain(|_, lock| Arc::strong_count(lock) > 1);
        self.pairs.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Held for the duration of one operation.
#[derive(Debug)]
pub enum OperationGuard {
    Scoped {
        _id: OwnedRwLockReadGuard<()>,
        _pair: OwnedMutexGuard<()>,
    },
    Exclusive(OwnedRwLockWriteGuard<()>),
}

impl OperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize against every other operation on `(id, namespace)`.
    pub async fn lock(&self, id: &ExtensionId, namespace: &Namespace) -> OperationGuard {
        let (id_lock, pair_lock) = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            table.prune();
            let id_lock = table.ids.entry(id.clone()).or_default().clone();
            let pair_lock = match namespace {
                Namespace::Global => None,
                Namespace::Named(_) => Some(
                    table
                        .pairs
                        .entry((id.clone(), namespace.clone()))
                        .or_default()
                        .clone(),
                ),
            };
            (id_lock, pair_lock)
        };

        match pair_lock {
            None => OperationGuard::Exclusive(id_lock.write_owned().await),
            Some(pair_lock) => {
                let id_guard = id_lock.read_owned().await;
                OperationGuard::Scoped {
                    _id: id_guard,
                    _pair: pair_lock.lock_owned().await,
                }
            }
        }
    }

    /// Lock several keys in a fixed order so overlapping callers can't deadlock.
    pub async fn lock_all(&self, keys: &[(&ExtensionId, &Namespace)]) -> Vec<OperationGuard> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for (id, namespace) in keys {
            guards.push(self.lock(id, namespace).await);
        }
        guards
    }
}
