//! Shared parameter table.
//!
//! Elements communicate out-of-band values through a [`ParamTable`] handle
//! the graph passes to every phase. The table is an opaque concurrent store:
//! typed at the access points, untyped inside. Its own locking is its own
//! concern; the engine never holds a table lock across a phase.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;

type Slot = Arc<dyn Any + Send + Sync>;

/// Concurrent keyed store of shared parameters.
#[derive(Default)]
pub struct ParamTable {
    entries: DashMap<String, Slot>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value under `key`.
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Arc::new(value));
    }

    /// Fetch the value under `key`, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let slot = self.entries.get(key)?;
        Arc::clone(slot.value()).downcast::<T>().ok()
    }

    /// Remove the value under `key`. Returns whether anything was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Used by explicit graph teardown.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
