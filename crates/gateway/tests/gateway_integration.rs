//! Integration test: user -> transport -> router -> handler -> nodes -> user
//!
//! Simulated nodes read their mailbox from the in-memory connection manager
//! and answer through `deliver`, exactly like a node session would.

use dongate_core::codec::{decode_legacy_response, decode_response, encode_request};
use dongate_core::signing::{SecretKey, address_of};
use dongate_core::{JsonRpcRequest, JsonRpcResponse, Message};
use dongate_gateway::{
    Gateway, GatewayConfig, GatewayError, GatewayState, HandlerFactory, InMemoryConnectionManager,
    LocalHttpServer,
};
use serde_json::{Value, json};
use std::sync::Arc;

fn node_key(i: u8) -> SecretKey {
    SecretKey::from_slice(&[i + 1; 32]).unwrap()
}

fn config_json() -> String {
    let members: Vec<Value> = (0..4u8)
        .map(|i| json!({"name": format!("node-{}", i), "address": address_of(&node_key(i))}))
        .collect();
    json!({
        "user_server": {"path": "/user", "max_request_bytes": 4096, "request_timeout_ms": 2000},
        "connection_manager": {"mailbox_capacity": 64},
        "dons": [
            {
                "don_id": "functions",
                "handler_name": "dummy",
                "members": members[..1].to_vec()
            },
            {
                "don_id": "vault",
                "handler_name": "quorum",
                "handler_config": {
                    "request_timeout_ms": 1000,
                    "methods": ["vault.secrets.get"],
                    "node_rate_limiter": {"per_sender_rps": 100.0, "per_sender_burst": 100}
                },
                "members": members,
                "f": 1
            }
        ]
    })
    .to_string()
}

/// Answer every request in `node`'s mailbox with `answer(request)`
fn spawn_node<F>(
    manager: &Arc<InMemoryConnectionManager>,
    don_id: &str,
    node: u8,
    answer: F,
)
where
    F: Fn(&JsonRpcRequest) -> Option<JsonRpcResponse> + Send + 'static,
{
    let address = address_of(&node_key(node));
    let mut mailbox = manager.take_mailbox(don_id, &address).unwrap();
    let manager = Arc::clone(manager);
    let don_id = don_id.to_string();
    tokio::spawn(async move {
        while let Some(request) = mailbox.recv().await {
            if let Some(response) = answer(&request) {
                let _ = manager.deliver(&don_id, &address, response).await;
            }
        }
    });
}

struct Harness {
    gateway: Gateway,
    manager: Arc<InMemoryConnectionManager>,
    server: Arc<LocalHttpServer>,
}

async fn harness() -> Harness {
    let _ = env_logger::try_init();
    let config = GatewayConfig::from_json(&config_json()).unwrap();
    let manager = Arc::new(InMemoryConnectionManager::from_config(&config));
    let server = Arc::new(LocalHttpServer::new(config.user_server.clone()));
    let gateway = Gateway::from_config(
        &config,
        &HandlerFactory::with_defaults(),
        manager.clone(),
        server.clone(),
    )
    .unwrap();
    gateway.start().await.unwrap();
    assert_eq!(gateway.state().await, GatewayState::Running);

    Harness {
        gateway,
        manager,
        server,
    }
}

#[tokio::test]
async fn test_quorum_round_trip() {
    let h = harness().await;

    // Three honest nodes, one that disagrees
    for node in 0..4u8 {
        spawn_node(&h.manager, "vault", node, move |request| {
            let key = request.params.as_ref()?.get("key")?.clone();
            let value = if node == 3 { "forged" } else { "s3cret" };
            Some(JsonRpcResponse::success(
                request.id.clone(),
                json!({"key": key, "value": value}),
            ))
        });
    }

    let request = JsonRpcRequest::new("req-1", "vault.secrets.get", Some(json!({"key": "db"})));
    let (raw, status) = h
        .server
        .post(&encode_request(&request).unwrap(), "Bearer token")
        .await
        .unwrap();
    assert_eq!(status, 200);

    let response = decode_response(&raw).unwrap();
    assert_eq!(response.id, "req-1");
    assert_eq!(response.result, Some(json!({"key": "db", "value": "s3cret"})));

    h.gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_unsupported_method_answered_locally() {
    let h = harness().await;

    let request = JsonRpcRequest::new("req-1", "vault.secrets.delete", Some(json!({"key": "db"})));
    let (raw, status) = h
        .server
        .post(&encode_request(&request).unwrap(), "")
        .await
        .unwrap();
    assert_eq!(status, 400);
    assert_eq!(decode_response(&raw).unwrap().error.unwrap().code, -32601);
}

#[tokio::test]
async fn test_legacy_round_trip() {
    let h = harness().await;

    spawn_node(&h.manager, "functions", 0, |request| {
        let incoming: Message = serde_json::from_value(request.params.clone()?).ok()?;
        let mut reply = Message::new(incoming.id(), incoming.body.method.clone(), "functions", json!({"ok": true}));
        reply.body.receiver = incoming.body.sender.clone();
        reply.sign(&node_key(0));
        Some(JsonRpcResponse::success(
            request.id.clone(),
            serde_json::to_value(&reply).unwrap(),
        ))
    });

    let user_key = SecretKey::from_slice(&[0x99; 32]).unwrap();
    let mut msg = Message::new("fn-1", "secrets_list", "functions", json!({"page": 1}));
    msg.sign(&user_key);

    let (raw, status) = h
        .server
        .post(&serde_json::to_vec(&msg).unwrap(), "")
        .await
        .unwrap();
    assert_eq!(status, 200);

    let reply = decode_legacy_response(&raw).unwrap();
    assert_eq!(reply.id(), "fn-1");
    assert_eq!(reply.body.receiver, msg.body.sender);
    assert!(reply.validate().is_ok());
    assert_eq!(reply.extract_signer().unwrap(), address_of(&node_key(0)));
}

#[tokio::test]
async fn test_silent_nodes_time_out() {
    let h = harness().await;
    // Nodes receive the request but never answer
    for node in 0..4u8 {
        spawn_node(&h.manager, "vault", node, |_| None);
    }

    let request = JsonRpcRequest::new("req-1", "vault.secrets.get", Some(json!({"key": "db"})));
    let (raw, status) = h
        .gateway
        .process_request(
            &encode_request(&request).unwrap(),
            "",
            std::time::Duration::from_millis(10),
        )
        .await;
    assert_eq!(status, 504);
    assert_eq!(decode_response(&raw).unwrap().error.unwrap().code, -32002);
}

#[tokio::test]
async fn test_routing_errors() {
    let h = harness().await;

    let (raw, status) = h.server.post(b"{{}", "").await.unwrap();
    assert_eq!(status, 400);
    let response = decode_response(&raw).unwrap();
    assert_eq!(response.id, "");
    assert_eq!(response.error.unwrap().code, -32700);

    let request = JsonRpcRequest::new("req-2", "weather.today", Some(json!({})));
    let (raw, status) = h
        .server
        .post(&encode_request(&request).unwrap(), "")
        .await
        .unwrap();
    assert_eq!(status, 400);
    let error = decode_response(&raw).unwrap().error.unwrap();
    assert_eq!(error.code, -32004);
    assert!(error.message.contains("weather"));

    let (_, status) = h.server.post(&vec![b' '; 5000], "").await.unwrap();
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_close_is_final() {
    let h = harness().await;
    h.gateway.close().await.unwrap();

    assert!(h.server.post(b"{}", "").await.is_err());
    assert!(matches!(h.gateway.close().await, Err(GatewayError::AlreadyClosed)));
    assert!(matches!(h.gateway.start().await, Err(GatewayError::AlreadyClosed)));
}

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("dongate-config-{}.json", std::process::id()));
    std::fs::write(&path, config_json()).unwrap();

    let config = GatewayConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert!(config.validate().is_ok());
    assert_eq!(config.dons.len(), 2);
    assert_eq!(config.dons[1].members.len(), 4);
    assert_eq!(config.user_server.max_request_bytes, 4096);
    assert!(GatewayConfig::from_file("/nonexistent/dongate.json").is_err());
}
