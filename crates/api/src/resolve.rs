//! The host runtime's ordered name-lookup path.

use crate::materialize::BoxError;
use crate::unit::UnitDescriptor;
use std::sync::{Arc, RwLock};

/// One source consulted during name resolution.
///
/// Returning `Ok(None)` defers to the next source in the chain; an error
/// aborts the lookup and surfaces to the caller.
pub trait ResolutionSource: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Option<UnitDescriptor>, BoxError>;
}

/// Ordered chain of resolution sources. The first source to return a
/// descriptor wins.
///
/// Stands in for the host runtime's own lookup path: the engine installs
/// its hook at the front so that names it owns take precedence over
/// default resolution, and removes it on teardown without touching units
/// that were already materialized.
#[derive(Default)]
pub struct ResolverChain {
    sources: RwLock<Vec<Arc<dyn ResolutionSource>>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a source ahead of all existing sources.
    pub fn install_first(&self, source: Arc<dyn ResolutionSource>) {
        let mut sources = self.sources.write().unwrap();
        sources.insert(0, source);
    }

    /// Append a source after all existing sources.
    pub fn install_last(&self, source: Arc<dyn ResolutionSource>) {
        let mut sources = self.sources.write().unwrap();
        sources.push(source);
    }

    /// Remove a previously installed source, matched by pointer identity.
    /// No-op if the source was never installed.
    pub fn remove(&self, source: &Arc<dyn ResolutionSource>) {
        let mut sources = self.sources.write().unwrap();
        sources.retain(|s| !Arc::ptr_eq(s, source));
    }

    pub fn len(&self) -> usize {
        self.sources.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Walk the chain in order and return the first descriptor found.
    pub fn resolve(&self, name: &str) -> Result<Option<UnitDescriptor>, BoxError> {
        let sources = self.sources.read().unwrap().clone();
        for source in sources {
            if let Some(descriptor) = source.resolve(name)? {
                return Ok(Some(descriptor));
            }
        }
        Ok(None)
    }
}
