//! In-process connection manager
//!
//! Every DON member gets a bounded mailbox of outbound requests. A simulated
//! node takes its mailbox receiver and answers through
//! [`InMemoryConnectionManager::deliver`], which hands the response to the
//! DON's registered handler.

use crate::config::{DonConfig, GatewayConfig};
use async_trait::async_trait;
use dashmap::DashMap;
use dongate_core::codec::decode_response;
use dongate_core::{JsonRpcRequest, JsonRpcResponse, normalize_address};
use dongate_ports::{ConnectionError, ConnectionManager, DonConnection, Handler};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Outbound side of one DON
pub struct InMemoryDonConnection {
    don_id: String,
    mailboxes: HashMap<String, mpsc::Sender<JsonRpcRequest>>,
    receivers: Mutex<HashMap<String, mpsc::Receiver<JsonRpcRequest>>>,
    running: Arc<AtomicBool>,
}

impl InMemoryDonConnection {
    fn new(don: &DonConfig, capacity: usize, running: Arc<AtomicBool>) -> Self {
        let mut mailboxes = HashMap::new();
        let mut receivers = HashMap::new();
        for address in don.member_addresses() {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            mailboxes.insert(address.clone(), tx);
            receivers.insert(address, rx);
        }

        Self {
            don_id: don.don_id.clone(),
            mailboxes,
            receivers: Mutex::new(receivers),
            running,
        }
    }

    fn is_member(&self, node_address: &str) -> bool {
        self.mailboxes.contains_key(node_address)
    }
}

#[async_trait]
impl DonConnection for InMemoryDonConnection {
    async fn send_to_node(
        &self,
        node_address: &str,
        request: JsonRpcRequest,
    ) -> Result<(), ConnectionError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed);
        }

        let node = normalize_address(node_address);
        let mailbox = self
            .mailboxes
            .get(&node)
            .ok_or_else(|| ConnectionError::UnknownNode {
                don_id: self.don_id.clone(),
                node: node.clone(),
            })?;

        mailbox.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ConnectionError::MailboxFull(node),
            mpsc::error::TrySendError::Closed(_) => ConnectionError::Closed,
        })
    }
}

/// Connection manager backed by tokio channels
pub struct InMemoryConnectionManager {
    dons: HashMap<String, Arc<InMemoryDonConnection>>,
    handlers: DashMap<String, Arc<dyn Handler>>,
    running: Arc<AtomicBool>,
}

impl InMemoryConnectionManager {
    pub fn new(dons: &[DonConfig], mailbox_capacity: usize) -> Self {
        let running = Arc::new(AtomicBool::new(false));
        let dons = dons
            .iter()
            .map(|don| {
                let connection =
                    InMemoryDonConnection::new(don, mailbox_capacity, Arc::clone(&running));
                (don.don_id.clone(), Arc::new(connection))
            })
            .collect();

        Self {
            dons,
            handlers: DashMap::new(),
            running,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(&config.dons, config.connection_manager.mailbox_capacity)
    }

    /// Hand out the receiving end of a node's mailbox (once)
    pub fn take_mailbox(
        &self,
        don_id: &str,
        node_address: &str,
    ) -> Option<mpsc::Receiver<JsonRpcRequest>> {
        let don = self.dons.get(don_id)?;
        let mut receivers = don.receivers.lock();
        receivers.remove(&normalize_address(node_address))
    }

    /// Deliver a node response to the handler of `don_id`
    pub async fn deliver(
        &self,
        don_id: &str,
        node_address: &str,
        response: JsonRpcResponse,
    ) -> Result<(), ConnectionError> {
        if !self.running.load(Ordering::Acquire) {
            return Err(ConnectionError::Closed);
        }

        let don = self
            .dons
            .get(don_id)
            .ok_or_else(|| ConnectionError::UnknownDon(don_id.to_string()))?;
        let node = normalize_address(node_address);
        if !don.is_member(&node) {
            return Err(ConnectionError::UnknownNode {
                don_id: don_id.to_string(),
                node,
            });
        }

        // Clone out of the map so no shard lock is held across the await
        let handler = self
            .handlers
            .get(don_id)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| ConnectionError::NoHandler(don_id.to_string()))?;

        debug!("Delivering response {} from {} to DON {}", response.id, node, don_id);
        handler.handle_node_message(response, &node).await?;
        Ok(())
    }

    /// Decode a raw node response and deliver it
    pub async fn deliver_raw(
        &self,
        don_id: &str,
        node_address: &str,
        raw: &[u8],
    ) -> Result<(), ConnectionError> {
        let response =
            decode_response(raw).map_err(|e| ConnectionError::InvalidMessage(e.to_string()))?;
        self.deliver(don_id, node_address, response).await
    }
}

#[async_trait]
impl ConnectionManager for InMemoryConnectionManager {
    async fn start(&self) -> Result<(), ConnectionError> {
        self.running.store(true, Ordering::Release);
        info!("Connection manager started for {} DONs", self.dons.len());
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.running.store(false, Ordering::Release);
        info!("Connection manager closed");
        Ok(())
    }

    fn don_connection(&self, don_id: &str) -> Option<Arc<dyn DonConnection>> {
        self.dons
            .get(don_id)
            .map(|don| Arc::clone(don) as Arc<dyn DonConnection>)
    }

    fn set_handler(&self, don_id: &str, handler: Arc<dyn Handler>) -> Result<(), ConnectionError> {
        if !self.dons.contains_key(don_id) {
            return Err(ConnectionError::UnknownDon(don_id.to_string()));
        }
        self.handlers.insert(don_id.to_string(), handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dongate_ports::{Callback, HandlerError};
    use dongate_core::Message;
    use serde_json::json;

    const NODE_1: &str = "0x00000000000000000000000000000000000000a1";

    /// Records every node message it receives
    #[derive(Default)]
    struct RecordingHandler {
        received: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Handler for RecordingHandler {
        async fn start(&self) -> Result<(), HandlerError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), HandlerError> {
            Ok(())
        }

        async fn handle_legacy_user_message(
            &self,
            _msg: Message,
            _callback: Callback,
        ) -> Result<(), HandlerError> {
            Ok(())
        }

        async fn handle_jsonrpc_user_message(
            &self,
            _request: JsonRpcRequest,
            _callback: Callback,
        ) -> Result<(), HandlerError> {
            Ok(())
        }

        async fn handle_node_message(
            &self,
            response: JsonRpcResponse,
            node_address: &str,
        ) -> Result<(), HandlerError> {
            self.received
                .lock()
                .push((response.id, node_address.to_string()));
            Ok(())
        }
    }

    fn manager(capacity: usize) -> InMemoryConnectionManager {
        let don = DonConfig::new("don-1", "dummy").with_member("n1", NODE_1);
        InMemoryConnectionManager::new(&[don], capacity)
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let manager = manager(4);
        manager.start().await.unwrap();
        let mut mailbox = manager.take_mailbox("don-1", NODE_1).unwrap();
        assert!(manager.take_mailbox("don-1", NODE_1).is_none());

        let connection = manager.don_connection("don-1").unwrap();
        connection
            .send_to_node(NODE_1, JsonRpcRequest::new("1", "echo", None))
            .await
            .unwrap();
        assert_eq!(mailbox.recv().await.unwrap().id, "1");
    }

    #[tokio::test]
    async fn test_send_errors() {
        let manager = manager(1);
        let connection = manager.don_connection("don-1").unwrap();
        let request = JsonRpcRequest::new("1", "echo", None);

        // Not started
        assert_eq!(
            connection.send_to_node(NODE_1, request.clone()).await,
            Err(ConnectionError::Closed)
        );

        manager.start().await.unwrap();
        assert!(matches!(
            connection
                .send_to_node("0x00000000000000000000000000000000000000ff", request.clone())
                .await,
            Err(ConnectionError::UnknownNode { .. })
        ));

        connection.send_to_node(NODE_1, request.clone()).await.unwrap();
        assert!(matches!(
            connection.send_to_node(NODE_1, request).await,
            Err(ConnectionError::MailboxFull(_))
        ));
        assert!(manager.don_connection("don-2").is_none());
    }

    #[tokio::test]
    async fn test_deliver_to_handler() {
        let manager = manager(4);
        manager.start().await.unwrap();

        let response = JsonRpcResponse::success("1", json!(true));
        assert_eq!(
            manager.deliver("don-1", NODE_1, response.clone()).await,
            Err(ConnectionError::NoHandler("don-1".to_string()))
        );

        let handler = Arc::new(RecordingHandler::default());
        manager.set_handler("don-1", handler.clone()).unwrap();
        assert!(manager.set_handler("don-2", handler.clone()).is_err());

        manager
            .deliver("don-1", &NODE_1.to_uppercase().replacen("0X", "0x", 1), response)
            .await
            .unwrap();
        manager
            .deliver_raw("don-1", NODE_1, br#"{"jsonrpc":"2.0","id":"2","result":null}"#)
            .await
            .unwrap();
        assert!(matches!(
            manager.deliver_raw("don-1", NODE_1, b"{{}").await,
            Err(ConnectionError::InvalidMessage(_))
        ));

        let received = handler.received.lock().clone();
        assert_eq!(
            received,
            vec![
                ("1".to_string(), NODE_1.to_string()),
                ("2".to_string(), NODE_1.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_deliver_rejects_unknown_sender() {
        let manager = manager(4);
        manager.start().await.unwrap();
        manager
            .set_handler("don-1", Arc::new(RecordingHandler::default()))
            .unwrap();

        let response = JsonRpcResponse::success("1", json!(true));
        assert!(matches!(
            manager
                .deliver("don-1", "0x00000000000000000000000000000000000000ff", response.clone())
                .await,
            Err(ConnectionError::UnknownNode { .. })
        ));
        assert_eq!(
            manager.deliver("don-9", NODE_1, response).await,
            Err(ConnectionError::UnknownDon("don-9".to_string()))
        );
    }
}
