//! Shared model types and host-boundary traits for modload.
//!
//! The core engine (`modload-core`) talks to its external collaborators
//! exclusively through the abstractions defined here:
//!
//! - [`Materializer`] - executes a backing resource and produces a [`Unit`]
//! - [`UnitCache`] - the host runtime's loaded-unit cache, including the
//!   per-name load serialization the core cooperates with
//! - [`ResolverChain`] - the host runtime's ordered name-lookup path, into
//!   which the core installs its resolution hook
//! - [`ChangeEvent`] - records delivered by an external change-notification
//!   source
//!
//! Depend on this crate to implement a custom materializer or unit cache
//! without pulling in the engine itself.

pub mod cache;
pub mod change;
pub mod materialize;
pub mod resolve;
pub mod unit;

pub use cache::UnitCache;
pub use change::{ChangeEvent, ChangeKind};
pub use materialize::{BoxError, DependencySink, MaterializeContext, Materializer};
pub use resolve::{ResolutionSource, ResolverChain};
pub use unit::{EntryKind, Unit, UnitDescriptor};
