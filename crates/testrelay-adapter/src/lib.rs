//! testrelay Adapter - Host/engine bridge
//!
//! Lets a host test platform discover and run tests owned by an external
//! engine. The engine thinks in trees of descriptors and streams of step
//! events; the host thinks in flat test cases and per-case results.
//!
//! ## Pieces
//!
//! - [`IdentityCache`]: one canonical test case per engine identifier
//! - [`CaseTranslator`]: engine descriptor to host test case
//! - [`TestExplorer`]: discovery, flattening the descriptor tree
//! - [`ExecutionLauncher`]: builds file patterns and id filters, runs, cancels
//! - [`ResultTranslator`]: engine step run to host result
//! - [`RunEventListener`]: relays step events to the host recorder
//!
//! [`TestRelayAdapter`] wires them together behind the host's discoverer and
//! executor contracts.

pub mod adapter;
pub mod cases;
pub mod discovery;
pub mod error;
pub mod identity;
pub mod launcher;
pub mod listener;
pub mod logger;
pub mod results;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{TestDiscoverer, TestExecutor, TestRelayAdapter};
pub use cases::{CachingCaseBuilder, CaseTranslator, SourceSet, TestCaseBuilder};
pub use discovery::TestExplorer;
pub use error::{RelayError, Result};
pub use identity::IdentityCache;
pub use launcher::ExecutionLauncher;
pub use listener::RunEventListener;
pub use logger::FrameworkLogger;
pub use results::{ResultTranslator, TestResultBuilder};
