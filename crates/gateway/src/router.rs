//! User request routing
//!
//! Decodes an inbound body, picks the handler by DON id (legacy messages) or
//! service name (JSON-RPC), and waits for the handler's single answer under
//! the caller's deadline. Every outcome is an encoded response plus an HTTP
//! status; nothing here returns an error to the transport.

use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use dongate_core::codec::decode_request;
use dongate_core::{ErrorCode, UserCallbackPayload, UserRequest};
use dongate_ports::{Handler, UserRequestHandler, callback_channel};
use log::{debug, warn};
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Read-only map from routing key to handler
pub struct RequestRouter {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl RequestRouter {
    /// Build the handler map. Duplicate keys are rejected.
    pub fn new(handlers: Vec<(String, Arc<dyn Handler>)>) -> Result<Self> {
        let mut map = HashMap::with_capacity(handlers.len());
        for (key, handler) in handlers {
            if map.contains_key(&key) {
                return Err(GatewayError::DuplicateDonId(key));
            }
            map.insert(key, handler);
        }
        Ok(Self { handlers: map })
    }

    pub fn handler(&self, key: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(key)
    }

    pub fn handlers(&self) -> impl Iterator<Item = (&String, &Arc<dyn Handler>)> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    async fn route(&self, raw_request: &[u8], auth: &str, timeout: Duration) -> UserCallbackPayload {
        let request = match decode_request(raw_request, auth) {
            Ok(request) => request,
            Err(e) => {
                debug!("Failed to decode user request: {}", e);
                return UserCallbackPayload::error("", ErrorCode::UserMessageParseError, &e.to_string());
            }
        };

        let key = match &request {
            UserRequest::Legacy(msg) => {
                if let Err(e) = msg.validate() {
                    debug!("Invalid legacy message {}: {}", msg.id(), e);
                    return UserCallbackPayload::error(
                        msg.id(),
                        ErrorCode::UserMessageParseError,
                        &e.to_string(),
                    );
                }
                msg.body.don_id.clone()
            }
            UserRequest::JsonRpc(req) => req.service_name().to_string(),
        };
        let id = request.id().to_string();

        let Some(handler) = self.handlers.get(&key) else {
            return UserCallbackPayload::error(
                &id,
                ErrorCode::UnsupportedDonIdError,
                &format!("unsupported DON ID or service: {}", key),
            );
        };

        let (callback, answer) = callback_channel();
        let admitted = match request {
            UserRequest::Legacy(msg) => handler.handle_legacy_user_message(msg, callback).await,
            UserRequest::JsonRpc(req) => handler.handle_jsonrpc_user_message(req, callback).await,
        };
        if let Err(e) = admitted {
            warn!("Handler {} rejected request {}: {}", handler.name(), id, e);
            return UserCallbackPayload::error(&id, ErrorCode::HandlerError, &e.to_string());
        }

        match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(payload)) => payload,
            Ok(Err(_)) => {
                warn!("Handler {} dropped request {} without answering", handler.name(), id);
                UserCallbackPayload::error(&id, ErrorCode::FatalError, "request dropped by handler")
            }
            Err(_) => {
                debug!("Request {} timed out after {:?}", id, timeout);
                UserCallbackPayload::timeout(&id)
            }
        }
    }
}

#[async_trait]
impl UserRequestHandler for RequestRouter {
    async fn process_request(
        &self,
        raw_request: &[u8],
        auth: &str,
        timeout: Duration,
    ) -> (Vec<u8>, u16) {
        let payload = self.route(raw_request, auth, timeout).await;
        counter!("gateway_request", "response_code" => payload.error_code.as_str()).increment(1);

        let status = payload.http_status();
        (payload.raw_response, status)
    }
}
