//! Request-aggregation handler
//!
//! Forwards JSON-RPC requests to every DON member and answers once `threshold`
//! members returned the same response. Each member gets one vote per request.
//! If every member answered and no response reached the threshold, the request
//! fails with [`ErrorCode::FatalError`].

use crate::cache::{Aggregation, RequestCache};
use crate::config::DonConfig;
use crate::handlers::common::{
    HandlerConfig, NodeMessageFilter, answer_locally, fan_out, parse_handler_config, user_payload,
};
use async_trait::async_trait;
use dongate_core::{ErrorCode, JsonRpcRequest, JsonRpcResponse, Message, UserCallbackPayload};
use dongate_ports::{Callback, DonConnection, Handler, HandlerError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const QUORUM_HANDLER_NAME: &str = "quorum";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuorumHandlerConfig {
    #[serde(flatten)]
    pub common: HandlerConfig,

    /// Accepted methods; empty accepts every method
    #[serde(default)]
    pub methods: Vec<String>,

    /// Identical responses needed to answer (defaults to `f + 1`)
    #[serde(default)]
    pub threshold: Option<usize>,
}

/// Votes collected for one request
#[derive(Debug, Clone, Default)]
struct Votes {
    /// Canonical response encoding -> number of members that sent it
    tally: HashMap<String, usize>,
    voters: HashSet<String>,
}

pub struct QuorumHandler {
    don_id: String,
    members: Vec<String>,
    methods: HashSet<String>,
    threshold: usize,
    connection: Arc<dyn DonConnection>,
    cache: RequestCache<Votes>,
    filter: NodeMessageFilter,
    running: AtomicBool,
}

impl QuorumHandler {
    pub fn new(don: &DonConfig, connection: Arc<dyn DonConnection>) -> Result<Self, HandlerError> {
        let config: QuorumHandlerConfig = parse_handler_config(&don.handler_config)?;
        let members = don.member_addresses();

        let threshold = config.threshold.unwrap_or(don.f + 1);
        if threshold == 0 || threshold > members.len() {
            return Err(HandlerError::InvalidConfig(format!(
                "threshold {} out of range for {} members",
                threshold,
                members.len()
            )));
        }

        Ok(Self {
            don_id: don.don_id.clone(),
            filter: NodeMessageFilter::new(
                &don.don_id,
                &members,
                config.common.node_rate_limiter.clone(),
            ),
            members,
            methods: config.methods.into_iter().collect(),
            threshold,
            connection,
            cache: RequestCache::new(
                config.common.request_timeout(),
                config.common.max_pending_requests,
            ),
            running: AtomicBool::new(false),
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn pending(&self) -> usize {
        self.cache.len()
    }

    /// Count one member's response
    fn tally(
        &self,
        key: &str,
        node: &str,
        response: &JsonRpcResponse,
        votes: &Votes,
    ) -> Result<Aggregation<Votes>, HandlerError> {
        if votes.voters.contains(node) {
            return Err(HandlerError::NodeMessageRejected(format!(
                "node {} already voted on {}",
                node, key
            )));
        }

        let mut canonical = response.clone();
        canonical.id = String::new();
        let ballot = serde_json::to_string(&canonical)
            .map_err(|e| HandlerError::NodeMessageRejected(e.to_string()))?;

        let mut votes = votes.clone();
        votes.voters.insert(node.to_string());
        let count = votes.tally.entry(ballot).or_insert(0);
        *count += 1;

        if *count >= self.threshold {
            debug!("Quorum of {} reached for {}", self.threshold, key);
            return Ok(Aggregation::Final(user_payload(key, response)));
        }
        if votes.voters.len() >= self.members.len() {
            warn!("No quorum for {}: every member answered", key);
            return Ok(Aggregation::Final(UserCallbackPayload::error(
                key,
                ErrorCode::FatalError,
                "node responses did not reach quorum",
            )));
        }
        Ok(Aggregation::Pending(votes))
    }
}

#[async_trait]
impl Handler for QuorumHandler {
    async fn start(&self) -> Result<(), HandlerError> {
        self.running.store(true, Ordering::Release);
        info!(
            "Quorum handler for DON {} started (threshold {}/{})",
            self.don_id,
            self.threshold,
            self.members.len()
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), HandlerError> {
        self.running.store(false, Ordering::Release);
        self.cache.abort_all(ErrorCode::FatalError, "handler closed");
        info!("Quorum handler for DON {} closed", self.don_id);
        Ok(())
    }

    async fn handle_legacy_user_message(
        &self,
        msg: Message,
        _callback: Callback,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::Unsupported(format!(
            "legacy message {} not supported by DON {}",
            msg.id(),
            self.don_id
        )))
    }

    async fn handle_jsonrpc_user_message(
        &self,
        request: JsonRpcRequest,
        callback: Callback,
    ) -> Result<(), HandlerError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(HandlerError::NotRunning);
        }

        if !self.methods.is_empty() && !self.methods.contains(&request.method) {
            answer_locally(
                callback,
                UserCallbackPayload::error(
                    &request.id,
                    ErrorCode::UnsupportedMethodError,
                    &format!("unsupported method: {}", request.method),
                ),
            );
            return Ok(());
        }
        if !request.params.as_ref().is_some_and(|p| p.is_object()) {
            answer_locally(
                callback,
                UserCallbackPayload::error(
                    &request.id,
                    ErrorCode::InvalidParamsError,
                    "params must be an object",
                ),
            );
            return Ok(());
        }

        self.cache
            .new_request(&request.id, callback, Votes::default())?;

        let sent = fan_out(self.connection.as_ref(), &self.members, &request).await;
        if sent == 0 {
            self.cache.remove(&request.id);
            return Err(HandlerError::ForwardFailed(request.id));
        }
        Ok(())
    }

    async fn handle_node_message(
        &self,
        response: JsonRpcResponse,
        node_address: &str,
    ) -> Result<(), HandlerError> {
        if !self.filter.admit(node_address) {
            return Ok(());
        }

        let node = node_address.to_lowercase();
        let key = response.id.clone();
        self.cache
            .process_response(&key, |votes: &Votes| {
                self.tally(&key, &node, &response, votes)
            })
            .inspect_err(|e| warn!("Node {} response for {} rejected: {}", node, key, e))
    }

    fn name(&self) -> &str {
        QUORUM_HANDLER_NAME
    }
}
