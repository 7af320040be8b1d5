//! In-memory implementation of the host runtime's loaded-unit cache.

use dashmap::DashMap;
use modload_api::{Unit, UnitCache};
use std::sync::{Arc, Mutex};

/// Thread-safe unit cache with a per-name lock table providing the
/// at-most-one-in-flight-load guarantee the resolver relies on.
///
/// Lock table entries are created on first use and kept for the lifetime of
/// the cache; the set of names is bounded by the scanned tree, so the table
/// stays small.
#[derive(Default)]
pub struct InMemoryUnitCache {
    units: DashMap<String, Arc<Unit>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InMemoryUnitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl UnitCache for InMemoryUnitCache {
    fn get(&self, name: &str) -> Option<Arc<Unit>> {
        self.units.get(name).map(|unit| unit.clone())
    }

    fn insert(&self, name: &str, unit: Arc<Unit>) {
        self.units.insert(name.to_string(), unit);
    }

    fn evict(&self, name: &str) -> bool {
        self.units.remove(name).is_some()
    }

    fn load_lock(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
