use crate::error::HandlerError;
use async_trait::async_trait;
use dongate_core::{JsonRpcRequest, JsonRpcResponse, Message, UserCallbackPayload};
use tokio::sync::oneshot;

/// Write-once sink back to the task serving the user request
pub type Callback = oneshot::Sender<UserCallbackPayload>;

/// Create a single-slot callback channel
pub fn callback_channel() -> (Callback, oneshot::Receiver<UserCallbackPayload>) {
    oneshot::channel()
}

/// Port for per-DON business logic
///
/// User-message methods only report *admission* errors; the answer itself is
/// written to the callback later, from any task. A handler must write at most
/// one payload per admitted request and must guarantee that every admitted
/// request is eventually answered (directly or via a timeout).
#[async_trait]
pub trait Handler: Send + Sync {
    /// Start background work (timeouts, sweeps)
    async fn start(&self) -> Result<(), HandlerError>;

    /// Stop background work
    async fn close(&self) -> Result<(), HandlerError>;

    /// Admit a legacy signed message
    async fn handle_legacy_user_message(
        &self,
        msg: Message,
        callback: Callback,
    ) -> Result<(), HandlerError>;

    /// Admit a JSON-RPC request
    async fn handle_jsonrpc_user_message(
        &self,
        request: JsonRpcRequest,
        callback: Callback,
    ) -> Result<(), HandlerError>;

    /// Process a node response. Must not block and is called concurrently
    /// for arbitrary nodes and request ids.
    async fn handle_node_message(
        &self,
        response: JsonRpcResponse,
        node_address: &str,
    ) -> Result<(), HandlerError>;

    /// Handler name for logs
    fn name(&self) -> &str {
        "Handler"
    }
}
