use crate::error::ConnectionError;
use crate::handler::Handler;
use async_trait::async_trait;
use dongate_core::JsonRpcRequest;
use std::sync::Arc;

/// Handle for sending requests to the members of one DON
#[async_trait]
pub trait DonConnection: Send + Sync {
    /// Send a request to one member node. Returns once the request is queued.
    async fn send_to_node(
        &self,
        node_address: &str,
        request: JsonRpcRequest,
    ) -> Result<(), ConnectionError>;
}

/// Port for the node-facing side of the gateway
///
/// Owns node sessions and delivers node responses to the handler registered
/// for their DON via [`Handler::handle_node_message`].
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn start(&self) -> Result<(), ConnectionError>;

    async fn close(&self) -> Result<(), ConnectionError>;

    /// Connection handle for a configured DON
    fn don_connection(&self, don_id: &str) -> Option<Arc<dyn DonConnection>>;

    /// Register the handler that receives node responses for `don_id`
    fn set_handler(&self, don_id: &str, handler: Arc<dyn Handler>) -> Result<(), ConnectionError>;
}
