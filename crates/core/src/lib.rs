//! modload-core: convention-based lazy resolution and dependency-aware
//! hot reload for file-backed code units.
//!
//! A [`Coordinator`] scans resource roots, derives dotted symbolic names
//! from the directory convention, and installs a [`ResolutionHook`] into
//! the host's [`ResolverChain`](modload_api::ResolverChain). Units are
//! materialized lazily on first lookup; a filesystem change invalidates a
//! unit together with everything that transitively depends on it.
//!
//! ```no_run
//! use modload_core::{Coordinator, CoordinatorConfig, JsonMaterializer};
//! use modload_api::ResolverChain;
//! use std::sync::Arc;
//!
//! let config = CoordinatorConfig::new([std::path::PathBuf::from("app")]);
//! let coordinator = Coordinator::new(config, Arc::new(JsonMaterializer::new()));
//! let chain = ResolverChain::new();
//! coordinator.install(&chain);
//!
//! let descriptor = chain.resolve("App.Models.User").unwrap();
//! ```

pub mod cache;
pub mod coordinator;
pub mod error;
pub mod inflect;
pub mod logging;
pub mod materializer;
pub mod registry;
pub mod reload;
pub mod resolver;
pub mod scanner;
pub mod watch;

pub use cache::InMemoryUnitCache;
pub use coordinator::{Coordinator, CoordinatorConfig, EagerReport};
pub use error::{ModloadError, Result};
pub use inflect::NameMapper;
pub use materializer::JsonMaterializer;
pub use registry::{Entry, LoadState, ResolutionRegistry};
pub use reload::{ReloadEngine, ReloadReport};
pub use resolver::ResolutionHook;
pub use scanner::{IgnoreRules, ScanConvention, ScanReport, Scanner};
