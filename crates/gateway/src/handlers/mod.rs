//! Per-DON handler implementations
//!
//! - [`DummyHandler`]: first node response wins
//! - [`QuorumHandler`]: answers once enough members agree

pub mod common;
mod dummy;
mod quorum;

pub use common::HandlerConfig;
pub use dummy::{DUMMY_HANDLER_NAME, DummyHandler};
pub use quorum::{QUORUM_HANDLER_NAME, QuorumHandler, QuorumHandlerConfig};
