//! Composition root: owns the registry, scanner, hook, and reload engine,
//! and exposes the setup / eager-materialize / reload lifecycle.
//!
//! A coordinator is an explicit, injectable instance, never a process-wide
//! singleton; compose several for independent resolution domains.

use crate::cache::InMemoryUnitCache;
use crate::error::Result;
use crate::inflect::NameMapper;
use crate::registry::{LoadState, ResolutionRegistry};
use crate::reload::{ReloadEngine, ReloadReport};
use crate::resolver::ResolutionHook;
use crate::scanner::{IgnoreRules, ScanConvention, ScanReport, Scanner};
use modload_api::{
    ChangeEvent, ChangeKind, Materializer, ResolutionSource, ResolverChain, UnitCache,
    UnitDescriptor,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Configuration surface of one resolution domain.
#[derive(Debug, Default)]
pub struct CoordinatorConfig {
    /// Resource roots to scan and watch.
    pub roots: Vec<PathBuf>,
    pub ignore: IgnoreRules,
    /// Inflection overrides, e.g. `html_parser -> HTMLParser`.
    pub overrides: HashMap<String, String>,
    /// Fixed top-level symbolic-name prefix.
    pub top_level_prefix: Option<String>,
    pub convention: ScanConvention,
}

impl CoordinatorConfig {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.top_level_prefix = Some(prefix.into());
        self
    }

    pub fn with_convention(mut self, convention: ScanConvention) -> Self {
        self.convention = convention;
        self
    }
}

/// Outcome of an eager-materialization pass.
#[derive(Debug, Default, Clone)]
pub struct EagerReport {
    pub materialized: usize,
    pub failed: Vec<(String, String)>,
}

pub struct Coordinator {
    config: CoordinatorConfig,
    registry: Arc<ResolutionRegistry>,
    cache: Arc<dyn UnitCache>,
    scanner: Scanner,
    hook: Arc<ResolutionHook>,
    engine: ReloadEngine,
    /// The hook as installed into a resolver chain; kept so teardown can
    /// remove exactly the installed source by pointer identity.
    source: Arc<dyn ResolutionSource>,
    setup_done: AtomicBool,
    watch_token: CancellationToken,
}

impl Coordinator {
    /// Wire a coordinator with the default in-memory unit cache.
    pub fn new(config: CoordinatorConfig, materializer: Arc<dyn Materializer>) -> Self {
        Self::with_cache(config, materializer, Arc::new(InMemoryUnitCache::new()))
    }

    /// Wire a coordinator against a host-provided unit cache.
    pub fn with_cache(
        config: CoordinatorConfig,
        materializer: Arc<dyn Materializer>,
        cache: Arc<dyn UnitCache>,
    ) -> Self {
        let mut mapper = NameMapper::new();
        mapper.add_overrides(config.overrides.clone());
        let mapper = Arc::new(mapper);

        let registry = Arc::new(ResolutionRegistry::new());
        let scanner = Scanner::new(mapper)
            .with_convention(config.convention.clone())
            .with_ignore(config.ignore.clone())
            .with_prefix(config.top_level_prefix.clone());
        let hook = Arc::new(ResolutionHook::new(
            registry.clone(),
            cache.clone(),
            materializer,
        ));
        let engine = ReloadEngine::new(registry.clone(), cache.clone(), hook.clone());
        let source: Arc<dyn ResolutionSource> = hook.clone();

        Self {
            config,
            registry,
            cache,
            scanner,
            hook,
            engine,
            source,
            setup_done: AtomicBool::new(false),
            watch_token: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ResolutionRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<dyn UnitCache> {
        &self.cache
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.config.roots
    }

    pub(crate) fn convention(&self) -> &ScanConvention {
        &self.config.convention
    }

    /// Scan all roots and populate the registry. Idempotent: repeat calls
    /// rescan, which leaves unchanged entries untouched.
    pub fn setup(&self) -> ScanReport {
        let report = self.scanner.scan(&self.config.roots, &self.registry);
        self.setup_done.store(true, Ordering::SeqCst);
        report
    }

    /// Insert the resolution hook ahead of every existing source in the
    /// host's lookup chain, so names this registry owns take precedence.
    pub fn install(&self, chain: &ResolverChain) {
        if !self.setup_done.load(Ordering::SeqCst) {
            self.setup();
        }
        chain.install_first(self.source.clone());
    }

    /// Resolve a name through this coordinator's hook directly.
    pub fn resolve(&self, name: &str) -> Result<Option<UnitDescriptor>> {
        self.hook.resolve(name)
    }

    /// Materialize every registered unit up front. Per-unit failures are
    /// collected, never fatal: a broken unit must not keep the rest of the
    /// tree from warming up.
    pub fn eager_materialize(&self) -> EagerReport {
        let mut report = EagerReport::default();
        let mut names = self.registry.all_names();
        names.sort();
        for name in names {
            match self.hook.resolve(&name) {
                Ok(_) => report.materialized += 1,
                Err(e) => {
                    warn!("eager materialization of {name} failed: {e}");
                    report.failed.push((name, e.to_string()));
                }
            }
        }
        info!(
            "eager materialization: {} loaded, {} failed",
            report.materialized,
            report.failed.len()
        );
        report
    }

    /// Apply one change notification.
    ///
    /// `Modified` reloads the unit and its dependents. `Created` rescans
    /// the owning root and then reloads the new resource. `Deleted`
    /// unregisters the entry and evicts its unit.
    pub fn handle_change(&self, event: &ChangeEvent) -> ReloadReport {
        match event.kind {
            ChangeKind::Modified => self.engine.reload(&event.locator),
            ChangeKind::Created => {
                if let Some(root) = self.root_of(&event.locator) {
                    self.scanner.scan(&[root.to_path_buf()], &self.registry);
                }
                self.engine.reload(&event.locator)
            }
            ChangeKind::Deleted => {
                if let Some(name) = self.registry.name_for_locator(&event.locator) {
                    info!("unregistering {name}: backing resource deleted");
                    self.cache.evict(&name);
                    self.registry.unregister(&name);
                }
                ReloadReport {
                    skipped: true,
                    ..ReloadReport::default()
                }
            }
        }
    }

    /// Reload every loaded unit whose backing resource changed since it was
    /// materialized. Covers notifications missed while not watching.
    pub fn reload_stale(&self) -> ReloadReport {
        let mut merged = ReloadReport {
            skipped: true,
            ..ReloadReport::default()
        };
        for name in self.registry.all_names() {
            let Ok(entry) = self.registry.get(&name) else {
                continue;
            };
            if entry.state != LoadState::Loaded {
                continue;
            }
            let (Some(locator), Some(recorded)) = (entry.locator, entry.modified_at) else {
                continue;
            };
            let current = std::fs::metadata(&locator).and_then(|m| m.modified());
            if current.is_ok_and(|mtime| mtime > recorded) {
                let report = self.engine.reload(&locator);
                merged.reloaded.extend(report.reloaded);
                merged.failed.extend(report.failed);
                merged.skipped = false;
            }
        }
        merged
    }

    /// Stop the watcher and remove the hook from the chain. Units already
    /// materialized stay valid in the cache until explicitly unloaded.
    pub fn teardown(&self, chain: &ResolverChain) {
        self.watch_token.cancel();
        chain.remove(&self.source);
    }

    pub(crate) fn watch_token(&self) -> CancellationToken {
        self.watch_token.clone()
    }

    fn root_of(&self, path: &Path) -> Option<&Path> {
        self.config
            .roots
            .iter()
            .find(|root| path.starts_with(root))
            .map(PathBuf::as_path)
    }
}
