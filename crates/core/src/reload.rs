//! Dependency-aware hot reload.
//!
//! A changed resource invalidates its unit and the transitive dependent
//! set. The whole set is evicted dependents-first, so no unit outlives a
//! unit that depends on it mid-phase, then re-materialized in the reverse
//! order so dependencies are back before their dependents.

use crate::registry::{LoadState, ResolutionRegistry};
use crate::resolver::ResolutionHook;
use modload_api::UnitCache;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one reload pass. Per-member materialization failures are
/// aggregated here rather than propagated, so one broken unit cannot block
/// reload of unrelated dependents.
#[derive(Debug, Default, Clone)]
pub struct ReloadReport {
    /// Names re-materialized successfully, dependencies first.
    pub reloaded: Vec<String>,
    /// Names whose re-materialization failed, with the failure message.
    /// The entries stay `Failed` until a later reload succeeds.
    pub failed: Vec<(String, String)>,
    /// The change was stale or irrelevant; nothing was touched.
    pub skipped: bool,
}

impl ReloadReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

pub struct ReloadEngine {
    registry: Arc<ResolutionRegistry>,
    cache: Arc<dyn UnitCache>,
    hook: Arc<ResolutionHook>,
}

impl ReloadEngine {
    pub fn new(
        registry: Arc<ResolutionRegistry>,
        cache: Arc<dyn UnitCache>,
        hook: Arc<ResolutionHook>,
    ) -> Self {
        Self {
            registry,
            cache,
            hook,
        }
    }

    /// Reload the unit backed by `changed` together with everything that
    /// transitively depends on it.
    ///
    /// A locator no registry entry matches is logged and skipped: the
    /// change is irrelevant to this system. Duplicate or out-of-order
    /// notifications for an already-current unit are harmless no-ops.
    pub fn reload(&self, changed: &Path) -> ReloadReport {
        let Some(name) = self.registry.name_for_locator(changed) else {
            debug!("no entry backed by {}, ignoring change", changed.display());
            return ReloadReport::skipped();
        };
        if self.is_current(&name, changed) {
            debug!("{name} is already current, ignoring change");
            return ReloadReport::skipped();
        }
        self.reload_name(&name)
    }

    /// Reload a unit by symbolic name, dependents included.
    pub fn reload_name(&self, name: &str) -> ReloadReport {
        let order = self.registry.reload_order(name);
        info!("reloading {name} and {} dependent(s)", order.len() - 1);

        // Unload phase: dependents first, the changed unit last.
        for member in &order {
            self.cache.evict(member);
            if let Err(e) = self.registry.mark_unloaded(member) {
                warn!("could not mark {member} unloaded: {e}");
            }
        }

        // Reload phase: dependencies first. Re-materialization is forced
        // here rather than left lazy so interdependent units never observe
        // partial staleness on next use.
        let mut report = ReloadReport::default();
        for member in order.iter().rev() {
            match self.hook.resolve(member) {
                Ok(_) => report.reloaded.push(member.clone()),
                Err(e) => {
                    warn!("reload of {member} failed: {e}");
                    report.failed.push((member.clone(), e.to_string()));
                }
            }
        }
        report
    }

    /// True when the entry is loaded and its recorded timestamp is no older
    /// than the backing file's current one.
    fn is_current(&self, name: &str, locator: &Path) -> bool {
        let Ok(entry) = self.registry.get(name) else {
            return false;
        };
        if entry.state != LoadState::Loaded {
            return false;
        }
        let (Some(recorded), Ok(current)) = (
            entry.modified_at,
            std::fs::metadata(locator).and_then(|m| m.modified()),
        ) else {
            return false;
        };
        recorded >= current
    }
}
