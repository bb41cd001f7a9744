//! In-process user transport
//!
//! Stands in for the HTTP server: [`LocalHttpServer::post`] mirrors a `POST`
//! to the user port. It owns the per-request timeout and the body size limit.

use crate::config::HttpServerConfig;
use async_trait::async_trait;
use dongate_core::ErrorCode;
use dongate_core::codec::encode_error_response;
use dongate_ports::{HttpServer, TransportError, UserRequestHandler};
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct LocalHttpServer {
    config: HttpServerConfig,
    handler: RwLock<Option<Arc<dyn UserRequestHandler>>>,
    running: AtomicBool,
}

impl LocalHttpServer {
    pub fn new(config: HttpServerConfig) -> Self {
        Self {
            config,
            handler: RwLock::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Submit one request body; returns the response body and HTTP status
    pub async fn post(&self, body: &[u8], auth: &str) -> Result<(Vec<u8>, u16), TransportError> {
        if !self.is_running() {
            return Err(TransportError::NotRunning);
        }
        let handler = self
            .handler
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(TransportError::NoHandler)?;

        if body.len() > self.config.max_request_bytes {
            debug!(
                "Rejecting {} byte request (max {})",
                body.len(),
                self.config.max_request_bytes
            );
            let code = ErrorCode::UserMessageParseError;
            let raw = encode_error_response("", code, "request body too large", None);
            return Ok((raw, code.http_status()));
        }

        Ok(handler
            .process_request(body, auth, self.config.request_timeout())
            .await)
    }
}

#[async_trait]
impl HttpServer for LocalHttpServer {
    fn set_handler(&self, handler: Arc<dyn UserRequestHandler>) {
        *self.handler.write() = Some(handler);
    }

    async fn start(&self) -> Result<(), TransportError> {
        if self.handler.read().is_none() {
            return Err(TransportError::NoHandler);
        }
        self.running.store(true, Ordering::Release);
        info!("User server accepting requests on {}", self.config.path);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("User server on {} closed", self.config.path);
        }
        Ok(())
    }
}
