//! DON Gateway
//!
//! Routes user requests to per-DON handlers and correlates asynchronous node
//! responses back to the waiting caller. Provides:
//! - Request routing by DON id or JSON-RPC service name
//! - Gateway lifecycle (start/close of handlers, node connections and transport)
//! - A request correlation cache with timeout eviction and a capacity bound
//! - Built-in handlers (`dummy`, `quorum`) with per-node rate limiting
//! - In-process connection manager and user transport
//!
//! ## Architecture
//!
//! ```text
//!   User (HTTP POST)
//!         │
//!   ┌─────▼─────┐
//!   │ Transport │
//!   └─────┬─────┘
//!         │ process_request(body, auth, timeout)
//!   ┌─────▼─────┐
//!   │  Router   │── decode, route by DON id / service
//!   └─────┬─────┘
//!         │ handle_*_user_message(msg, callback)
//!   ┌─────▼─────┐      send_to_node       ┌───────────┐
//!   │  Handler  │────────────────────────►│ DON nodes │
//!   │ + cache   │◄────────────────────────│           │
//!   └───────────┘   handle_node_message   └───────────┘
//! ```
//!
//! ## Metrics
//!
//! - `gateway_request{response_code}`: one per user response
//! - `gateway_node_message{outcome}`: node responses accepted or dropped

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod factory;
pub mod gateway;
pub mod handlers;
pub mod rate_limit;
pub mod router;
pub mod transport;

// Re-export commonly used types
pub use cache::{Aggregation, RequestCache};
pub use config::{ConnectionManagerConfig, DonConfig, GatewayConfig, HttpServerConfig, NodeConfig};
pub use connection::InMemoryConnectionManager;
pub use error::{CacheError, ConfigError, GatewayError};
pub use factory::HandlerFactory;
pub use gateway::{Gateway, GatewayState};
pub use handlers::{DummyHandler, QuorumHandler};
pub use rate_limit::{NodeRateLimiter, RateLimiterConfig};
pub use router::RequestRouter;
pub use transport::LocalHttpServer;
