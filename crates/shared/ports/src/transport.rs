use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Inbound side of the user port: raw request in, raw response and HTTP status out
#[async_trait]
pub trait UserRequestHandler: Send + Sync {
    /// Process one request body. Never fails: every outcome is an encoded
    /// response plus a status code.
    async fn process_request(
        &self,
        raw_request: &[u8],
        auth: &str,
        timeout: Duration,
    ) -> (Vec<u8>, u16);
}

/// Port for the user-facing HTTP server
#[async_trait]
pub trait HttpServer: Send + Sync {
    /// Bind the callback invoked for every inbound request
    fn set_handler(&self, handler: Arc<dyn UserRequestHandler>);

    async fn start(&self) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;
}
