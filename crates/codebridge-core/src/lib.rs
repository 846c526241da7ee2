//! Bridge core: session registry, response reconciler, and orchestrator.
//!
//! Maps chat users to remote sessions, relays chat turns to the server, and
//! reconciles the asynchronously produced assistant reply out of the session
//! history. The chat connector in front and the HTTP transport behind are
//! both pluggable; this crate only depends on the `SessionClient` trait.

pub mod error;
pub mod model;
pub mod orchestrator;
pub mod reconciler;
pub mod registry;
mod sync;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{BridgeError, Result};
pub use model::{DEFAULT_MODEL, DEFAULT_PROVIDER, ModelSelector};
pub use orchestrator::{Orchestrator, SessionListing};
pub use reconciler::{Reconciler, Reply, RetryPolicy};
pub use registry::SessionRegistry;
