//! Directory scanner: walks resource roots and populates the registry.
//!
//! A directory carrying the container-marker file is registered as a
//! container backed by that marker; a directory without one becomes a
//! virtual container (no locator), which is how implicit namespace
//! grouping is supported. Every non-marker file with the unit extension
//! becomes a leaf. Scanning is idempotent: rescanning an unchanged tree
//! leaves the registry equivalent.

use crate::error::Result;
use crate::inflect::NameMapper;
use crate::registry::ResolutionRegistry;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use modload_api::EntryKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Naming convention for backing resources.
#[derive(Debug, Clone)]
pub struct ScanConvention {
    /// Extension of leaf resources (without the dot).
    pub unit_extension: String,
    /// File name that marks its directory as a non-virtual container.
    pub container_marker: String,
    /// Terminal segments starting with this prefix are skipped entirely.
    /// The container marker itself is exempt.
    pub reserved_prefix: String,
}

impl Default for ScanConvention {
    fn default() -> Self {
        Self {
            unit_extension: "unit".to_string(),
            container_marker: "_init_.unit".to_string(),
            reserved_prefix: "_".to_string(),
        }
    }
}

/// Skip rules applied to every visited path: a glob set, an optional
/// caller-supplied predicate, or both.
#[derive(Clone, Default)]
pub struct IgnoreRules {
    globs: Option<GlobSet>,
    predicate: Option<Arc<dyn Fn(&Path) -> bool + Send + Sync>>,
}

impl IgnoreRules {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
        }
        Ok(Self {
            globs: Some(builder.build()?),
            predicate: None,
        })
    }

    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&Path) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if let Some(globs) = &self.globs {
            // Match against the terminal segment as well, so `target` style
            // patterns work without leading globs.
            if globs.is_match(path) {
                return true;
            }
            if let Some(name) = path.file_name()
                && globs.is_match(Path::new(name))
            {
                return true;
            }
        }
        self.predicate.as_ref().is_some_and(|p| p(path))
    }
}

impl std::fmt::Debug for IgnoreRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IgnoreRules")
            .field("globs", &self.globs.as_ref().map(|g| g.len()))
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

/// Result of one scan pass.
#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    pub containers: usize,
    pub leaves: usize,
    pub errors: usize,
    pub duration: Duration,
}

/// Walks resource roots and registers every discoverable unit.
pub struct Scanner {
    mapper: Arc<NameMapper>,
    convention: ScanConvention,
    ignore: IgnoreRules,
    /// Fixed top-level symbolic-name prefix, prepended to every root's
    /// derived base name.
    prefix: Option<String>,
}

impl Scanner {
    pub fn new(mapper: Arc<NameMapper>) -> Self {
        Self {
            mapper,
            convention: ScanConvention::default(),
            ignore: IgnoreRules::none(),
            prefix: None,
        }
    }

    pub fn with_convention(mut self, convention: ScanConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn with_ignore(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Scan every root and populate the registry. A failure reading one
    /// subtree is logged and skipped; it never aborts the scan of siblings
    /// or other roots.
    pub fn scan(&self, roots: &[PathBuf], registry: &ResolutionRegistry) -> ScanReport {
        let start = std::time::Instant::now();
        let mut report = ScanReport::default();

        for root in roots {
            if !root.is_dir() {
                warn!("scan root is not a directory, skipping: {}", root.display());
                report.errors += 1;
                continue;
            }
            self.scan_root(root, registry, &mut report);
        }

        report.duration = start.elapsed();
        info!(
            "scan complete: {} containers, {} leaves, {} errors in {:?}",
            report.containers, report.leaves, report.errors, report.duration
        );
        report
    }

    fn scan_root(&self, root: &Path, registry: &ResolutionRegistry, report: &mut ScanReport) {
        let base = match self.base_name(root) {
            Ok(base) => base,
            Err(e) => {
                warn!("cannot derive base name for {}: {e}", root.display());
                report.errors += 1;
                return;
            }
        };

        // The root is a container in its own right, registered before any
        // of its children.
        self.register_container(registry, base.clone(), root, report);

        let convention = self.convention.clone();
        let ignore = self.ignore.clone();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(std::cmp::Ord::cmp)
            .filter_entry(move |entry| !skip_entry(entry.path(), &convention, &ignore))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("unreadable path during scan: {e}");
                    report.errors += 1;
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let path = entry.path();
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());

            if is_dir {
                match self.symbol_for(root, &base, path, false) {
                    Ok(name) => self.register_container(registry, name, path, report),
                    Err(e) => {
                        warn!("skipping {}: {e}", path.display());
                        report.errors += 1;
                    }
                }
                continue;
            }

            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if file_name == self.convention.container_marker {
                continue; // already the locator of its directory
            }
            let has_unit_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == self.convention.unit_extension);
            if !has_unit_ext {
                continue;
            }
            match self.symbol_for(root, &base, path, true) {
                Ok(name) => {
                    debug!("leaf {} -> {name}", path.display());
                    registry.register(name, Some(path.to_path_buf()), EntryKind::Leaf);
                    report.leaves += 1;
                }
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    report.errors += 1;
                }
            }
        }
    }

    fn register_container(
        &self,
        registry: &ResolutionRegistry,
        name: String,
        dir: &Path,
        report: &mut ScanReport,
    ) {
        let marker = dir.join(&self.convention.container_marker);
        let locator = marker.is_file().then_some(marker);
        debug!(
            "container {} -> {name}{}",
            dir.display(),
            if locator.is_none() { " (virtual)" } else { "" }
        );
        registry.register(name, locator, EntryKind::Container);
        report.containers += 1;
    }

    /// Base symbolic name for a root: the mapped terminal segment, under
    /// the fixed prefix when one is configured.
    fn base_name(&self, root: &Path) -> Result<String> {
        let segment = root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let mapped = self.mapper.to_symbol(segment, false)?;
        Ok(match &self.prefix {
            Some(prefix) => format!("{prefix}.{mapped}"),
            None => mapped,
        })
    }

    /// Symbolic name for a path below `root`: the base name joined with
    /// every mapped relative segment, extension stripped on leaves.
    fn symbol_for(&self, root: &Path, base: &str, path: &Path, is_leaf: bool) -> Result<String> {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let mut name = base.to_string();
        let components: Vec<_> = rel.components().collect();
        for (i, component) in components.iter().enumerate() {
            let terminal = i + 1 == components.len();
            let segment = component.as_os_str().to_str().unwrap_or_default();
            let segment = if terminal && is_leaf {
                Path::new(segment)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(segment)
            } else {
                segment
            };
            name.push('.');
            name.push_str(&self.mapper.to_symbol(segment, terminal && is_leaf)?);
        }
        Ok(name)
    }
}

/// Skip ignored paths and reserved-prefix segments entirely: they are
/// neither registered nor recursed into. The container marker is exempt
/// from the reserved-prefix rule.
fn skip_entry(path: &Path, convention: &ScanConvention, ignore: &IgnoreRules) -> bool {
    let Some(segment) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if segment == convention.container_marker {
        return false;
    }
    if segment.starts_with('.') || segment.starts_with(&convention.reserved_prefix) {
        return true;
    }
    ignore.is_ignored(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LoadState;
    use std::collections::BTreeSet;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn scan_fixture(scanner: &Scanner, root: &Path) -> (ResolutionRegistry, ScanReport) {
        let registry = ResolutionRegistry::new();
        let report = scanner.scan(&[root.to_path_buf()], &registry);
        (registry, report)
    }

    fn names(registry: &ResolutionRegistry) -> BTreeSet<String> {
        registry.all_names().into_iter().collect()
    }

    #[test]
    fn registers_containers_and_leaves_by_convention() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        write(&app.join("models/user.unit"), "{}");
        write(&app.join("models/user_profile.unit"), "{}");
        write(&app.join("services/_init_.unit"), "{}");

        let scanner = Scanner::new(Arc::new(NameMapper::new()));
        let (registry, report) = scan_fixture(&scanner, &app);

        assert_eq!(
            names(&registry),
            BTreeSet::from([
                "App".to_string(),
                "App.Models".to_string(),
                "App.Models.User".to_string(),
                "App.Models.UserProfile".to_string(),
                "App.Services".to_string(),
            ])
        );
        assert_eq!(report.containers, 3);
        assert_eq!(report.leaves, 2);

        // app/models has no marker: virtual container, no locator.
        let models = registry.get("App.Models").unwrap();
        assert_eq!(models.kind, EntryKind::Container);
        assert!(models.locator.is_none());

        // app/services carries a marker: that file is the locator.
        let services = registry.get("App.Services").unwrap();
        assert_eq!(
            services.locator.as_deref(),
            Some(app.join("services/_init_.unit").as_path())
        );

        let user = registry.get("App.Models.User").unwrap();
        assert_eq!(user.kind, EntryKind::Leaf);
        assert_eq!(user.state, LoadState::Discovered);
    }

    #[test]
    fn scan_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        write(&app.join("models/user.unit"), "{}");

        let scanner = Scanner::new(Arc::new(NameMapper::new()));
        let registry = ResolutionRegistry::new();
        scanner.scan(&[app.clone()], &registry);
        let first = names(&registry);
        let user_before = registry.get("App.Models.User").unwrap();

        scanner.scan(&[app.clone()], &registry);
        assert_eq!(names(&registry), first);
        let user_after = registry.get("App.Models.User").unwrap();
        assert_eq!(user_after.locator, user_before.locator);
        assert_eq!(user_after.kind, user_before.kind);
        assert_eq!(user_after.state, LoadState::Discovered);
    }

    #[test]
    fn ignored_and_reserved_paths_are_not_visited() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        write(&app.join("models/user.unit"), "{}");
        write(&app.join("models/_draft.unit"), "{}");
        write(&app.join(".hidden/secret.unit"), "{}");
        write(&app.join("vendor/thing.unit"), "{}");
        write(&app.join("notes.txt"), "not a unit");

        let scanner = Scanner::new(Arc::new(NameMapper::new()))
            .with_ignore(IgnoreRules::from_patterns(&["vendor"]).unwrap());
        let (registry, _) = scan_fixture(&scanner, &app);

        assert!(registry.contains("App.Models.User"));
        assert!(!registry.contains("App.Models.Draft"));
        assert!(!registry.contains("App.Hidden"));
        assert!(!registry.contains("App.Vendor"));
        assert!(!registry.contains("App.Vendor.Thing"));
        assert!(!registry.contains("App.Notes"));
    }

    #[test]
    fn ignore_predicate_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        write(&app.join("keep.unit"), "{}");
        write(&app.join("drop.unit"), "{}");

        let scanner = Scanner::new(Arc::new(NameMapper::new())).with_ignore(
            IgnoreRules::none().with_predicate(|path| {
                path.file_name().and_then(|n| n.to_str()) == Some("drop.unit")
            }),
        );
        let (registry, _) = scan_fixture(&scanner, &app);

        assert!(registry.contains("App.Keep"));
        assert!(!registry.contains("App.Drop"));
    }

    #[test]
    fn fixed_prefix_is_prepended() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        write(&app.join("user.unit"), "{}");

        let scanner =
            Scanner::new(Arc::new(NameMapper::new())).with_prefix(Some("Acme".to_string()));
        let (registry, _) = scan_fixture(&scanner, &app);

        assert!(registry.contains("Acme.App"));
        assert!(registry.contains("Acme.App.User"));
    }

    #[test]
    fn missing_root_is_logged_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        write(&app.join("user.unit"), "{}");
        let ghost = dir.path().join("ghost");

        let scanner = Scanner::new(Arc::new(NameMapper::new()));
        let registry = ResolutionRegistry::new();
        let report = scanner.scan(&[ghost, app], &registry);

        assert!(registry.contains("App.User"));
        assert_eq!(report.errors, 1);
    }
}
