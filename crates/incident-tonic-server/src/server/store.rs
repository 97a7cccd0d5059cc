//! Process-local record storage.
//!
//! [`Store`] is a cheaply cloneable handle to a `RecordId -> T` map guarded by
//! a [`parking_lot::RwLock`]. Every clone shares the same map, so a store
//! created at startup and handed to a service lives for the whole server
//! lifetime. Nothing is persisted, evicted, or expired.
//!
//! Locks are only held for the duration of a single map operation and never
//! across an `.await`, so handlers running in parallel on the multi-threaded
//! runtime cannot interleave inside an insert. Concurrent inserts under the
//! same identifier resolve as last-write-wins.

use incident_tonic_core::types::RecordId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct Store<T> {
    records: Arc<RwLock<HashMap<RecordId, T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Store<T> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Stores `record` under `id`, returning the record it replaced, if any.
    pub fn insert(&self, id: RecordId, record: T) -> Option<T> {
        self.records.write().insert(id, record)
    }
}

#[cfg(test)]
impl<T> Store<T> {
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl<T: Clone> Store<T> {
    /// Returns a copy of the record stored under `id`.
    pub fn get(&self, id: &str) -> Option<T> {
        self.records.read().get(id).cloned()
    }
}
