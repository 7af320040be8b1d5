//! Materialization boundary: executing a backing resource to produce a unit.

use crate::unit::Unit;
use std::path::{Path, PathBuf};

/// Error type crossing the host boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Receives dependency declarations made while a unit is materializing.
///
/// Dependency edges are recorded only through explicit declaration; the
/// engine performs no static analysis of unit sources.
pub trait DependencySink: Send + Sync {
    /// Record that `from` requires `to`. Both names must already be
    /// registered.
    fn declare(&self, from: &str, to: &str) -> Result<(), BoxError>;
}

/// Context handed to a materializer for a single materialization.
pub struct MaterializeContext<'a> {
    name: &'a str,
    locator: &'a Path,
    sink: &'a dyn DependencySink,
}

impl<'a> MaterializeContext<'a> {
    pub fn new(name: &'a str, locator: &'a Path, sink: &'a dyn DependencySink) -> Self {
        Self {
            name,
            locator,
            sink,
        }
    }

    /// Symbolic name being materialized.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Backing resource being executed.
    pub fn locator(&self) -> PathBuf {
        self.locator.to_path_buf()
    }

    /// Declare that the unit under materialization depends on `to`.
    ///
    /// The edge is recorded symmetrically in the registry; a later change
    /// to `to` will invalidate this unit as a transitive dependent.
    pub fn declare_dependency(&self, to: &str) -> Result<(), BoxError> {
        self.sink.declare(self.name, to)
    }
}

/// Executes a backing resource's content in a freshly prepared unit context.
///
/// Called at most once per name until the unit is invalidated; the caller
/// guarantees per-name serialization, so implementations need no internal
/// locking against concurrent materialization of the same name. The body
/// runs outside any registry lock and may declare dependencies through the
/// context.
pub trait Materializer: Send + Sync {
    fn materialize(&self, ctx: &MaterializeContext<'_>) -> Result<Unit, BoxError>;
}
