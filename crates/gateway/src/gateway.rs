//! Gateway lifecycle
//!
//! ```text
//! Created --start--> Started --(all components up)--> Running
//!    |                  |                                 |
//!    +------------------+-------------close---------------+--> Closed
//! ```
//!
//! Start runs handlers, then the connection manager, then the user transport,
//! and stops at the first failure. Close runs in reverse order and collects
//! every component's error.

use crate::config::GatewayConfig;
use crate::error::{CloseErrors, GatewayError, Result};
use crate::factory::HandlerFactory;
use crate::router::RequestRouter;
use dongate_ports::{
    ConnectionError, ConnectionManager, Handler, HttpServer, UserRequestHandler,
};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Created,
    /// Start was attempted; only a fully successful start reaches `Running`
    Started,
    Running,
    Closed,
}

pub struct Gateway {
    router: Arc<RequestRouter>,
    connection_manager: Arc<dyn ConnectionManager>,
    http_server: Arc<dyn HttpServer>,
    state: Mutex<GatewayState>,
}

impl Gateway {
    /// Build a gateway from prebuilt handlers keyed by DON id or service name
    pub fn new(
        handlers: Vec<(String, Arc<dyn Handler>)>,
        connection_manager: Arc<dyn ConnectionManager>,
        http_server: Arc<dyn HttpServer>,
    ) -> Result<Self> {
        let router = Arc::new(RequestRouter::new(handlers)?);
        http_server.set_handler(Arc::clone(&router) as Arc<dyn UserRequestHandler>);

        Ok(Self {
            router,
            connection_manager,
            http_server,
            state: Mutex::new(GatewayState::Created),
        })
    }

    /// Validate `config`, build one handler per DON and register each with
    /// the connection manager. Nothing is started.
    pub fn from_config(
        config: &GatewayConfig,
        factory: &HandlerFactory,
        connection_manager: Arc<dyn ConnectionManager>,
        http_server: Arc<dyn HttpServer>,
    ) -> Result<Self> {
        config.validate()?;

        let mut handlers = Vec::with_capacity(config.dons.len());
        for don in &config.dons {
            let connection = connection_manager
                .don_connection(&don.don_id)
                .ok_or_else(|| ConnectionError::UnknownDon(don.don_id.clone()))?;
            let handler = factory.create(don, connection)?;
            connection_manager.set_handler(&don.don_id, Arc::clone(&handler))?;
            handlers.push((don.don_id.clone(), handler));
        }

        Self::new(handlers, connection_manager, http_server)
    }

    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        match *state {
            GatewayState::Created => {}
            GatewayState::Running => return Ok(()),
            GatewayState::Started => return Err(GatewayError::StartFailed),
            GatewayState::Closed => return Err(GatewayError::AlreadyClosed),
        }
        *state = GatewayState::Started;

        for (key, handler) in self.router.handlers() {
            if let Err(e) = handler.start().await {
                error!("Failed to start handler for {}: {}", key, e);
                return Err(e.into());
            }
        }
        if let Err(e) = self.connection_manager.start().await {
            error!("Failed to start connection manager: {}", e);
            return Err(e.into());
        }
        if let Err(e) = self.http_server.start().await {
            error!("Failed to start user server: {}", e);
            return Err(e.into());
        }

        *state = GatewayState::Running;
        info!("Gateway running with {} handlers", self.router.len());
        Ok(())
    }

    pub async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state == GatewayState::Closed {
            return Err(GatewayError::AlreadyClosed);
        }
        *state = GatewayState::Closed;

        let mut errors = CloseErrors::default();
        if let Err(e) = self.http_server.close().await {
            errors.push("user server", e);
        }
        if let Err(e) = self.connection_manager.close().await {
            errors.push("connection manager", e);
        }
        for (key, handler) in self.router.handlers() {
            if let Err(e) = handler.close().await {
                errors.push(&format!("handler {}", key), e);
            }
        }

        if errors.is_empty() {
            info!("Gateway closed");
            Ok(())
        } else {
            error!("Gateway closed with errors: {}", errors);
            Err(GatewayError::Close(errors))
        }
    }

    pub async fn state(&self) -> GatewayState {
        *self.state.lock().await
    }

    pub fn router(&self) -> Arc<RequestRouter> {
        Arc::clone(&self.router)
    }

    /// Process one user request directly, bypassing the transport
    pub async fn process_request(
        &self,
        raw_request: &[u8],
        auth: &str,
        timeout: Duration,
    ) -> (Vec<u8>, u16) {
        self.router.process_request(raw_request, auth, timeout).await
    }
}
