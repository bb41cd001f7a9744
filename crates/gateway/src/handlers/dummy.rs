//! First-response-wins handler
//!
//! Forwards every user request to all DON members and answers the user with
//! the first node response that arrives.

use crate::cache::{Aggregation, RequestCache};
use crate::config::DonConfig;
use crate::handlers::common::{
    HandlerConfig, NodeMessageFilter, fan_out, parse_handler_config, user_payload,
};
use async_trait::async_trait;
use dongate_core::{ErrorCode, JsonRpcRequest, JsonRpcResponse, Message};
use dongate_ports::{Callback, DonConnection, Handler, HandlerError};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const DUMMY_HANDLER_NAME: &str = "dummy";

/// Wire format the user request arrived in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestFormat {
    Legacy,
    JsonRpc,
}

pub struct DummyHandler {
    don_id: String,
    members: Vec<String>,
    connection: Arc<dyn DonConnection>,
    cache: RequestCache<RequestFormat>,
    filter: NodeMessageFilter,
    running: AtomicBool,
}

impl DummyHandler {
    pub fn new(don: &DonConfig, connection: Arc<dyn DonConnection>) -> Result<Self, HandlerError> {
        let config: HandlerConfig = parse_handler_config(&don.handler_config)?;
        let members = don.member_addresses();

        Ok(Self {
            don_id: don.don_id.clone(),
            filter: NodeMessageFilter::new(&don.don_id, &members, config.node_rate_limiter.clone()),
            members,
            connection,
            cache: RequestCache::new(config.request_timeout(), config.max_pending_requests),
            running: AtomicBool::new(false),
        })
    }

    pub fn pending(&self) -> usize {
        self.cache.len()
    }

    async fn dispatch(
        &self,
        request: JsonRpcRequest,
        format: RequestFormat,
        callback: Callback,
    ) -> Result<(), HandlerError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(HandlerError::NotRunning);
        }

        self.cache.new_request(&request.id, callback, format)?;

        let sent = fan_out(self.connection.as_ref(), &self.members, &request).await;
        if sent == 0 {
            self.cache.remove(&request.id);
            return Err(HandlerError::ForwardFailed(request.id));
        }
        Ok(())
    }
}

/// Build the user answer from the first node response
fn first_response(
    key: &str,
    format: RequestFormat,
    response: &JsonRpcResponse,
) -> Result<Aggregation<RequestFormat>, HandlerError> {
    if format == RequestFormat::Legacy && !response.is_error() {
        // Legacy answers must carry the node's signed message
        let result = response.result.clone().unwrap_or_default();
        let msg: Message = serde_json::from_value(result)
            .map_err(|e| HandlerError::NodeMessageRejected(format!("invalid legacy response: {}", e)))?;
        msg.validate_shape()
            .map_err(|e| HandlerError::NodeMessageRejected(e.to_string()))?;
    }
    Ok(Aggregation::Final(user_payload(key, response)))
}

#[async_trait]
impl Handler for DummyHandler {
    async fn start(&self) -> Result<(), HandlerError> {
        self.running.store(true, Ordering::Release);
        info!("Dummy handler for DON {} started", self.don_id);
        Ok(())
    }

    async fn close(&self) -> Result<(), HandlerError> {
        self.running.store(false, Ordering::Release);
        self.cache.abort_all(ErrorCode::FatalError, "handler closed");
        info!("Dummy handler for DON {} closed", self.don_id);
        Ok(())
    }

    async fn handle_legacy_user_message(
        &self,
        msg: Message,
        callback: Callback,
    ) -> Result<(), HandlerError> {
        let params = serde_json::to_value(&msg).map_err(|e| HandlerError::Unsupported(e.to_string()))?;
        let request = JsonRpcRequest::new(msg.id(), msg.body.method.clone(), Some(params));
        self.dispatch(request, RequestFormat::Legacy, callback).await
    }

    async fn handle_jsonrpc_user_message(
        &self,
        request: JsonRpcRequest,
        callback: Callback,
    ) -> Result<(), HandlerError> {
        self.dispatch(request, RequestFormat::JsonRpc, callback).await
    }

    async fn handle_node_message(
        &self,
        response: JsonRpcResponse,
        node_address: &str,
    ) -> Result<(), HandlerError> {
        if !self.filter.admit(node_address) {
            return Ok(());
        }
        debug!("Node {} answered {}", node_address, response.id);

        let key = response.id.clone();
        self.cache
            .process_response(&key, |format: &RequestFormat| {
                first_response(&key, *format, &response)
            })
            .inspect_err(|e| warn!("Node {} response for {} rejected: {}", node_address, key, e))
    }

    fn name(&self) -> &str {
        DUMMY_HANDLER_NAME
    }
}
