//! Per-id write locks.
//!
//! Saves and deletes of the same service id are serialized; operations on
//! different ids never contend.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use warden_core::id::ServiceId;

/// A table of mutexes keyed by service id.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<ServiceId, Arc<Mutex<()>>>,
}

impl LockTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding writes to `id`.
    ///
    /// Callers hold the returned mutex's guard for the whole write.
    pub fn get(&self, id: ServiceId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id).or_default().value())
    }

    /// Number of ids that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no id has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
