//! Unit model: the materialized result of executing a backing resource.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Whether a registry entry may have children under the dotted name joining
/// rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A single file-backed code unit.
    Leaf,
    /// A grouping entry whose children are named `<name>.<child>`. May be
    /// backed by a marker resource or purely virtual.
    Container,
}

/// An opaque unit context: a mapping from exported symbol name to value.
///
/// The engine never inspects the shape of exported values beyond treating
/// them as an opaque mapping; what a "value" means is entirely up to the
/// [`Materializer`](crate::Materializer) that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Symbolic name this unit was materialized under.
    pub name: String,
    /// Exported symbols.
    pub exports: HashMap<String, serde_json::Value>,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exports: HashMap::new(),
        }
    }

    pub fn with_exports(
        name: impl Into<String>,
        exports: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            exports,
        }
    }

    /// Look up an exported symbol.
    pub fn export(&self, symbol: &str) -> Option<&serde_json::Value> {
        self.exports.get(symbol)
    }
}

/// A resolved descriptor returned from a name lookup.
#[derive(Debug, Clone)]
pub struct UnitDescriptor {
    pub name: String,
    pub kind: EntryKind,
    /// Backing resource, absent for virtual containers.
    pub locator: Option<PathBuf>,
    /// The materialized unit. Absent for containers synthesized on the fly
    /// that were never materialized.
    pub unit: Option<Arc<Unit>>,
}

impl UnitDescriptor {
    /// Descriptor for a virtual container with no backing resource.
    pub fn virtual_container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Container,
            locator: None,
            unit: None,
        }
    }
}
