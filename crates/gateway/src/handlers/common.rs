//! Building blocks shared by the node fan-out handlers

use crate::rate_limit::{NodeRateLimiter, RateLimiterConfig};
use dongate_core::codec::encode_response;
use dongate_core::{ErrorCode, JsonRpcRequest, JsonRpcResponse, UserCallbackPayload, normalize_address};
use dongate_ports::{Callback, DonConnection, HandlerError};
use log::{debug, warn};
use metrics::counter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Settings every fan-out handler understands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Back-pressure bound on in-flight requests
    #[serde(default = "default_max_pending_requests")]
    pub max_pending_requests: usize,

    #[serde(default)]
    pub node_rate_limiter: RateLimiterConfig,
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_max_pending_requests() -> usize {
    1_000
}

impl HandlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_pending_requests: default_max_pending_requests(),
            node_rate_limiter: RateLimiterConfig::default(),
        }
    }
}

/// Decode handler config from the opaque DON config value (`null` means defaults)
pub fn parse_handler_config<T: DeserializeOwned>(value: &Value) -> Result<T, HandlerError> {
    let value = match value {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| HandlerError::InvalidConfig(e.to_string()))
}

/// Admission filter for node responses: membership plus rate limiting
pub struct NodeMessageFilter {
    don_id: String,
    members: HashSet<String>,
    limiter: NodeRateLimiter,
}

impl NodeMessageFilter {
    pub fn new(don_id: &str, members: &[String], limiter_config: RateLimiterConfig) -> Self {
        Self {
            don_id: don_id.to_string(),
            members: members.iter().map(|m| normalize_address(m)).collect(),
            limiter: NodeRateLimiter::new(limiter_config),
        }
    }

    /// Whether a response from `node_address` should be processed
    pub fn admit(&self, node_address: &str) -> bool {
        let node = normalize_address(node_address);
        if !self.members.contains(&node) {
            warn!("Dropping message from non-member {} of DON {}", node, self.don_id);
            counter!("gateway_node_message", "outcome" => "non_member").increment(1);
            return false;
        }
        if !self.limiter.allow(&node) {
            warn!("Rate limit exceeded for node {} of DON {}", node, self.don_id);
            counter!("gateway_node_message", "outcome" => "rate_limited").increment(1);
            return false;
        }
        counter!("gateway_node_message", "outcome" => "accepted").increment(1);
        true
    }
}

/// Send `request` to every member. Returns how many sends succeeded.
pub async fn fan_out(
    connection: &dyn DonConnection,
    members: &[String],
    request: &JsonRpcRequest,
) -> usize {
    let mut sent = 0;
    for member in members {
        match connection.send_to_node(member, request.clone()).await {
            Ok(()) => sent += 1,
            Err(e) => warn!("Failed to forward {} to node {}: {}", request.id, member, e),
        }
    }
    debug!("Forwarded {} to {}/{} nodes", request.id, sent, members.len());
    sent
}

/// Answer a user directly, bypassing node fan-out
pub fn answer_locally(callback: Callback, payload: UserCallbackPayload) {
    if callback.send(payload).is_err() {
        debug!("Caller went away before the local answer was written");
    }
}

/// Re-key a node response to `key` and encode it for the user.
///
/// Node errors are passed through as [`ErrorCode::HandlerError`].
pub fn user_payload(key: &str, response: &JsonRpcResponse) -> UserCallbackPayload {
    let mut response = response.clone();
    response.id = key.to_string();

    let error_code = if response.is_error() {
        ErrorCode::HandlerError
    } else {
        ErrorCode::NoError
    };
    match encode_response(&response) {
        Ok(raw) => UserCallbackPayload {
            raw_response: raw,
            error_code,
        },
        Err(e) => UserCallbackPayload::error(key, ErrorCode::NodeResponseEncodingError, &e.to_string()),
    }
}
