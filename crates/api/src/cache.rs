//! The host runtime's loaded-unit cache boundary.

use crate::unit::Unit;
use std::sync::{Arc, Mutex};

/// Loaded-unit cache with per-name load serialization.
///
/// The host runtime guarantees at most one in-flight load per symbolic
/// name; the engine obtains that guarantee through [`UnitCache::load_lock`]
/// rather than reimplementing it. Holding the returned lock while
/// materializing keeps the registry's own metadata lock out of the
/// materialization body.
pub trait UnitCache: Send + Sync {
    /// Currently cached unit for `name`, if any.
    fn get(&self, name: &str) -> Option<Arc<Unit>>;

    /// Insert or replace the cached unit for `name`.
    fn insert(&self, name: &str, unit: Arc<Unit>);

    /// Evict the cached unit. Returns whether a unit was present.
    fn evict(&self, name: &str) -> bool;

    /// Per-name load lock. All callers asking for the same name receive
    /// the same lock; a second resolver of an in-flight name blocks here
    /// until the first completes.
    fn load_lock(&self, name: &str) -> Arc<Mutex<()>>;
}
