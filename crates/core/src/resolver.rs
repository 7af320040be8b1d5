//! The resolution hook: lazy, at-most-once materialization on lookup.
//!
//! This is the boundary the host runtime's lookup path consults for every
//! name it cannot satisfy itself. The registry lock is never held across
//! the materialization body; per-name exclusivity comes from the unit
//! cache's load locks instead.

use crate::error::{ModloadError, Result};
use crate::registry::{Entry, LoadState, ResolutionRegistry};
use modload_api::{
    BoxError, DependencySink, MaterializeContext, Materializer, ResolutionSource, Unit, UnitCache,
    UnitDescriptor,
};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

pub struct ResolutionHook {
    registry: Arc<ResolutionRegistry>,
    cache: Arc<dyn UnitCache>,
    materializer: Arc<dyn Materializer>,
}

impl ResolutionHook {
    pub fn new(
        registry: Arc<ResolutionRegistry>,
        cache: Arc<dyn UnitCache>,
        materializer: Arc<dyn Materializer>,
    ) -> Self {
        Self {
            registry,
            cache,
            materializer,
        }
    }

    /// Resolve a symbolic name to a descriptor, materializing on first use.
    ///
    /// `Ok(None)` means the name is not ours and other resolution sources
    /// should be consulted. A name whose last materialization failed keeps
    /// raising the recorded error until a reload succeeds.
    pub fn resolve(&self, name: &str) -> Result<Option<UnitDescriptor>> {
        if !self.registry.contains(name) {
            // An ancestor container may never have been scanned as its own
            // entry. Synthesize a descriptor on the fly without registering
            // it: the shortest rule that satisfies lookups like `App` when
            // only `App.Models.User` is registered.
            if self.registry.is_ancestor(name) {
                debug!("synthesizing virtual container for {name}");
                return Ok(Some(UnitDescriptor::virtual_container(name)));
            }
            return Ok(None);
        }

        let entry = self.registry.get(name)?;
        match entry.state {
            LoadState::Loaded => Ok(Some(self.descriptor(name, &entry))),
            LoadState::Failed => Err(recorded_failure(name, &entry)),
            LoadState::Discovered | LoadState::Unloaded | LoadState::Loading => {
                self.materialize(name)
            }
        }
    }

    /// First-time (or post-unload) materialization under the per-name load
    /// lock. A concurrent resolver of the same name blocks on the lock and
    /// then observes the winner's outcome through the re-check.
    fn materialize(&self, name: &str) -> Result<Option<UnitDescriptor>> {
        let lock = self.cache.load_lock(name);
        let _guard = lock.lock().unwrap();

        let entry = self.registry.get(name)?;
        match entry.state {
            LoadState::Loaded => return Ok(Some(self.descriptor(name, &entry))),
            LoadState::Failed => return Err(recorded_failure(name, &entry)),
            _ => {}
        }

        self.registry.mark_loading(name)?;

        let Some(locator) = entry.locator.as_deref() else {
            // Virtual container: nothing to execute. Stamped with the
            // materialization time since there is no backing resource.
            let unit = Arc::new(Unit::new(name));
            self.cache.insert(name, unit.clone());
            self.registry.mark_loaded(name, SystemTime::now())?;
            return Ok(Some(UnitDescriptor {
                name: name.to_string(),
                kind: entry.kind,
                locator: None,
                unit: Some(unit),
            }));
        };

        debug!("materializing {name} from {}", locator.display());
        let ctx = MaterializeContext::new(
            name,
            locator,
            self.registry.as_ref() as &dyn DependencySink,
        );
        let loaded = self
            .materializer
            .materialize(&ctx)
            .and_then(|unit| {
                let modified_at = std::fs::metadata(locator)?.modified()?;
                Ok((unit, modified_at))
            });

        match loaded {
            Ok((unit, modified_at)) => {
                let unit = Arc::new(unit);
                self.cache.insert(name, unit.clone());
                self.registry.mark_loaded(name, modified_at)?;
                Ok(Some(UnitDescriptor {
                    name: name.to_string(),
                    kind: entry.kind,
                    locator: Some(locator.to_path_buf()),
                    unit: Some(unit),
                }))
            }
            Err(e) => {
                let error = ModloadError::materialization(name, &e);
                self.registry.mark_failed(name, e.to_string())?;
                Err(error)
            }
        }
    }

    fn descriptor(&self, name: &str, entry: &Entry) -> UnitDescriptor {
        UnitDescriptor {
            name: name.to_string(),
            kind: entry.kind,
            locator: entry.locator.clone(),
            unit: self.cache.get(name),
        }
    }
}

fn recorded_failure(name: &str, entry: &Entry) -> ModloadError {
    ModloadError::Materialization {
        name: name.to_string(),
        message: entry
            .last_error
            .clone()
            .unwrap_or_else(|| "materialization previously failed".to_string()),
    }
}

impl ResolutionSource for ResolutionHook {
    fn resolve(&self, name: &str) -> std::result::Result<Option<UnitDescriptor>, BoxError> {
        ResolutionHook::resolve(self, name).map_err(BoxError::from)
    }
}
