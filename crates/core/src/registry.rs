//! The resolution registry: symbolic name -> entry.
//!
//! Single source of truth for every other component. All operations are
//! short critical sections under one lock; nothing here ever executes unit
//! content, so the lock is never held across materialization.

use crate::error::{ModloadError, Result};
use modload_api::{BoxError, DependencySink, EntryKind};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

/// Load state of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Registered by the scanner, never materialized.
    Discovered,
    /// Materialization in flight.
    Loading,
    /// Materialized; the unit cache holds the result.
    Loaded,
    /// Evicted by the reload engine, awaiting re-materialization.
    Unloaded,
    /// Last materialization attempt raised; the error is kept and re-raised
    /// on every lookup until a reload succeeds.
    Failed,
}

/// One registry entry. Dependency edges are kept symmetric with the inverse
/// `dependents` set after every mutation.
#[derive(Debug, Clone)]
pub struct Entry {
    pub locator: Option<PathBuf>,
    pub kind: EntryKind,
    pub state: LoadState,
    pub modified_at: Option<SystemTime>,
    pub dependencies: BTreeSet<String>,
    pub dependents: BTreeSet<String>,
    pub last_error: Option<String>,
}

impl Entry {
    fn discovered(locator: Option<PathBuf>, kind: EntryKind) -> Self {
        Self {
            locator,
            kind,
            state: LoadState::Discovered,
            modified_at: None,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            last_error: None,
        }
    }
}

/// Thread-safe symbolic-name registry.
#[derive(Default)]
pub struct ResolutionRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl ResolutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry in state `Discovered`.
    ///
    /// Dependency edges of a prior entry under the same name are left
    /// untouched; callers wanting a clean replacement must `unregister`
    /// first. Re-registering an entry whose locator and kind are unchanged
    /// is a no-op, so a rescan never demotes a loaded entry.
    pub fn register(&self, name: impl Into<String>, locator: Option<PathBuf>, kind: EntryKind) {
        let name = name.into();
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(&name) {
            Some(existing) if existing.locator == locator && existing.kind == kind => {}
            Some(existing) => {
                existing.locator = locator;
                existing.kind = kind;
                existing.state = LoadState::Discovered;
                existing.modified_at = None;
                existing.last_error = None;
            }
            None => {
                entries.insert(name, Entry::discovered(locator, kind));
            }
        }
    }

    /// Remove an entry and sever every edge referencing it. No-op if the
    /// name is absent.
    pub fn unregister(&self, name: &str) {
        let mut entries = self.entries.write().unwrap();
        let Some(removed) = entries.remove(name) else {
            return;
        };
        for dep in &removed.dependencies {
            if let Some(entry) = entries.get_mut(dep) {
                entry.dependents.remove(name);
            }
        }
        for dependent in &removed.dependents {
            if let Some(entry) = entries.get_mut(dependent) {
                entry.dependencies.remove(name);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().unwrap().contains_key(name)
    }

    /// Snapshot of the entry for `name`.
    pub fn get(&self, name: &str) -> Result<Entry> {
        self.entries
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ModloadError::NotFound(name.to_string()))
    }

    pub fn mark_loading(&self, name: &str) -> Result<()> {
        self.transition(name, |entry| {
            entry.state = LoadState::Loading;
        })
    }

    pub fn mark_loaded(&self, name: &str, modified_at: SystemTime) -> Result<()> {
        self.transition(name, |entry| {
            entry.state = LoadState::Loaded;
            entry.modified_at = Some(modified_at);
            entry.last_error = None;
        })
    }

    pub fn mark_unloaded(&self, name: &str) -> Result<()> {
        self.transition(name, |entry| {
            entry.state = LoadState::Unloaded;
        })
    }

    pub fn mark_failed(&self, name: &str, error: impl Into<String>) -> Result<()> {
        let error = error.into();
        self.transition(name, move |entry| {
            entry.state = LoadState::Failed;
            entry.last_error = Some(error);
        })
    }

    /// Record that `from` requires `to`, maintaining the inverse edge.
    /// Idempotent; fails if either name is absent.
    pub fn add_dependency(&self, from: &str, to: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        if !entries.contains_key(from) {
            return Err(ModloadError::NotFound(from.to_string()));
        }
        if !entries.contains_key(to) {
            return Err(ModloadError::NotFound(to.to_string()));
        }
        if let Some(entry) = entries.get_mut(from) {
            entry.dependencies.insert(to.to_string());
        }
        if let Some(entry) = entries.get_mut(to) {
            entry.dependents.insert(from.to_string());
        }
        Ok(())
    }

    /// Breadth-first transitive closure over `dependents`. The seed name is
    /// never part of the result, even when it is reachable through a cycle;
    /// the visited set keeps cyclic graphs from looping.
    pub fn dependents_closure(&self, name: &str) -> BTreeSet<String> {
        let entries = self.entries.read().unwrap();
        let mut closure = BTreeSet::new();
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        visited.insert(name);
        let mut queue: VecDeque<&str> = VecDeque::new();
        if let Some(entry) = entries.get(name) {
            queue.extend(entry.dependents.iter().map(String::as_str));
        }
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            closure.insert(current.to_string());
            if let Some(entry) = entries.get(current) {
                queue.extend(entry.dependents.iter().map(String::as_str));
            }
        }
        closure
    }

    /// Depth-first postorder over `dependents`, seeded at `name`: every
    /// entry appears before anything it depends on, with `name` itself
    /// last. This is the unload order for a reload of `name`; reloading
    /// walks it in reverse. Cycle-safe.
    pub fn reload_order(&self, name: &str) -> Vec<String> {
        let entries = self.entries.read().unwrap();
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut order: Vec<String> = Vec::new();
        // Iterative DFS; a frame is revisited once its dependents are done.
        let mut stack: Vec<(&str, bool)> = vec![(name, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current.to_string());
                continue;
            }
            if !visited.insert(current) {
                continue;
            }
            stack.push((current, true));
            if let Some(entry) = entries.get(current) {
                for dependent in &entry.dependents {
                    if !visited.contains(dependent.as_str()) {
                        stack.push((dependent.as_str(), false));
                    }
                }
            }
        }
        order
    }

    /// Snapshot of all registered names. Stable once returned; concurrent
    /// mutation affects later calls only.
    pub fn all_names(&self) -> Vec<String> {
        self.entries.read().unwrap().keys().cloned().collect()
    }

    /// Reverse lookup from a backing resource to its symbolic name.
    pub fn name_for_locator(&self, locator: &Path) -> Option<String> {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .find(|(_, entry)| entry.locator.as_deref() == Some(locator))
            .map(|(name, _)| name.clone())
    }

    /// True when `name` is a strict dotted prefix of some registered name.
    pub fn is_ancestor(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap();
        let prefix = format!("{name}.");
        entries.keys().any(|registered| registered.starts_with(&prefix))
    }

    fn transition(&self, name: &str, apply: impl FnOnce(&mut Entry)) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| ModloadError::InvalidState {
                name: name.to_string(),
                reason: "entry is not registered".to_string(),
            })?;
        apply(entry);
        Ok(())
    }
}

/// Dependency declarations made during materialization land here.
impl DependencySink for ResolutionRegistry {
    fn declare(&self, from: &str, to: &str) -> std::result::Result<(), BoxError> {
        self.add_dependency(from, to).map_err(BoxError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(registry: &ResolutionRegistry, name: &str) {
        registry.register(name, Some(PathBuf::from(format!("/{name}.unit"))), EntryKind::Leaf);
    }

    #[test]
    fn register_get_roundtrip() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "App.User");

        let entry = registry.get("App.User").unwrap();
        assert_eq!(entry.state, LoadState::Discovered);
        assert_eq!(entry.kind, EntryKind::Leaf);
        assert!(entry.modified_at.is_none());

        assert!(matches!(
            registry.get("App.Missing"),
            Err(ModloadError::NotFound(_))
        ));
    }

    #[test]
    fn transitions_require_registration() {
        let registry = ResolutionRegistry::new();
        assert!(matches!(
            registry.mark_loaded("Ghost", SystemTime::now()),
            Err(ModloadError::InvalidState { .. })
        ));

        leaf(&registry, "A");
        registry.mark_loading("A").unwrap();
        registry.mark_loaded("A", SystemTime::now()).unwrap();
        let entry = registry.get("A").unwrap();
        assert_eq!(entry.state, LoadState::Loaded);
        assert!(entry.modified_at.is_some());

        registry.mark_unloaded("A").unwrap();
        assert_eq!(registry.get("A").unwrap().state, LoadState::Unloaded);
    }

    #[test]
    fn failed_entries_keep_their_error() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "A");
        registry.mark_failed("A", "boom").unwrap();
        let entry = registry.get("A").unwrap();
        assert_eq!(entry.state, LoadState::Failed);
        assert_eq!(entry.last_error.as_deref(), Some("boom"));

        // A successful load clears the recorded failure.
        registry.mark_loaded("A", SystemTime::now()).unwrap();
        assert!(registry.get("A").unwrap().last_error.is_none());
    }

    #[test]
    fn dependency_edges_are_symmetric() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "A");
        leaf(&registry, "B");
        registry.add_dependency("A", "B").unwrap();
        registry.add_dependency("A", "B").unwrap(); // idempotent

        let a = registry.get("A").unwrap();
        let b = registry.get("B").unwrap();
        assert!(a.dependencies.contains("B"));
        assert_eq!(a.dependencies.len(), 1);
        assert!(b.dependents.contains("A"));

        assert!(matches!(
            registry.add_dependency("A", "Missing"),
            Err(ModloadError::NotFound(_))
        ));
    }

    #[test]
    fn unregister_severs_edges_and_does_not_resurrect() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "A");
        leaf(&registry, "B");
        registry.add_dependency("A", "B").unwrap();

        registry.unregister("B");
        assert!(!registry.contains("B"));
        assert!(!registry.get("A").unwrap().dependencies.contains("B"));

        // Re-registering B later must not bring the old edge back.
        leaf(&registry, "B");
        assert!(registry.get("B").unwrap().dependents.is_empty());
        assert!(!registry.get("A").unwrap().dependencies.contains("B"));

        // Unregistering an unknown name is a no-op.
        registry.unregister("Never.Registered");
    }

    #[test]
    fn reregistering_unchanged_entry_is_a_noop() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "A");
        leaf(&registry, "B");
        registry.add_dependency("A", "B").unwrap();
        registry.mark_loaded("A", SystemTime::now()).unwrap();

        // Same locator and kind: state and edges survive.
        leaf(&registry, "A");
        let a = registry.get("A").unwrap();
        assert_eq!(a.state, LoadState::Loaded);
        assert!(a.dependencies.contains("B"));

        // Different locator: fields reset, edges still untouched.
        registry.register("A", Some(PathBuf::from("/elsewhere.unit")), EntryKind::Leaf);
        let a = registry.get("A").unwrap();
        assert_eq!(a.state, LoadState::Discovered);
        assert!(a.dependencies.contains("B"));
    }

    #[test]
    fn closure_walks_dependents_transitively() {
        let registry = ResolutionRegistry::new();
        for name in ["A", "B", "C", "D"] {
            leaf(&registry, name);
        }
        // A depends on B depends on C; D is unrelated.
        registry.add_dependency("A", "B").unwrap();
        registry.add_dependency("B", "C").unwrap();

        let closure = registry.dependents_closure("C");
        assert_eq!(
            closure,
            BTreeSet::from(["A".to_string(), "B".to_string()])
        );
        assert!(registry.dependents_closure("A").is_empty());
    }

    #[test]
    fn closure_tolerates_cycles_and_excludes_the_seed() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "A");
        leaf(&registry, "B");
        registry.add_dependency("A", "B").unwrap();
        registry.add_dependency("B", "A").unwrap();

        let closure = registry.dependents_closure("A");
        assert_eq!(closure, BTreeSet::from(["B".to_string()]));
    }

    #[test]
    fn reload_order_is_dependents_first() {
        let registry = ResolutionRegistry::new();
        for name in ["A", "B", "C"] {
            leaf(&registry, name);
        }
        registry.add_dependency("A", "B").unwrap();
        registry.add_dependency("B", "C").unwrap();

        let order = registry.reload_order("C");
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn reload_order_terminates_on_cycles() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "A");
        leaf(&registry, "B");
        registry.add_dependency("A", "B").unwrap();
        registry.add_dependency("B", "A").unwrap();

        let order = registry.reload_order("A");
        assert_eq!(order, vec!["B", "A"]);
    }

    #[test]
    fn reverse_lookup_by_locator() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "App.User");
        assert_eq!(
            registry.name_for_locator(Path::new("/App.User.unit")),
            Some("App.User".to_string())
        );
        assert_eq!(registry.name_for_locator(Path::new("/other.unit")), None);
    }

    #[test]
    fn ancestor_detection_is_strict_prefix() {
        let registry = ResolutionRegistry::new();
        leaf(&registry, "App.Models.User");
        assert!(registry.is_ancestor("App"));
        assert!(registry.is_ancestor("App.Models"));
        assert!(!registry.is_ancestor("App.Models.User"));
        assert!(!registry.is_ancestor("App.Mod"));
    }
}
