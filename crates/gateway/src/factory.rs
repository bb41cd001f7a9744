//! Handler registry
//!
//! Maps a handler type name from the DON config to its constructor. Built
//! once by the composition root and passed to [`crate::Gateway::from_config`].

use crate::config::DonConfig;
use crate::error::{ConfigError, GatewayError};
use crate::handlers::{DUMMY_HANDLER_NAME, DummyHandler, QUORUM_HANDLER_NAME, QuorumHandler};
use dongate_ports::{DonConnection, Handler, HandlerError};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a handler for one DON
pub type HandlerConstructor = Box<
    dyn Fn(&DonConfig, Arc<dyn DonConnection>) -> Result<Arc<dyn Handler>, HandlerError>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct HandlerFactory {
    constructors: HashMap<String, HandlerConstructor>,
}

impl HandlerFactory {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `dummy` and `quorum` handlers
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register(DUMMY_HANDLER_NAME, |don, connection| {
            Ok(Arc::new(DummyHandler::new(don, connection)?) as Arc<dyn Handler>)
        });
        factory.register(QUORUM_HANDLER_NAME, |don, connection| {
            Ok(Arc::new(QuorumHandler::new(don, connection)?) as Arc<dyn Handler>)
        });
        factory
    }

    /// Register (or replace) the constructor for `name`
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&DonConfig, Arc<dyn DonConnection>) -> Result<Arc<dyn Handler>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(name.to_string(), Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Build the handler named by `don.handler_name`
    pub fn create(
        &self,
        don: &DonConfig,
        connection: Arc<dyn DonConnection>,
    ) -> Result<Arc<dyn Handler>, GatewayError> {
        let constructor =
            self.constructors
                .get(&don.handler_name)
                .ok_or_else(|| ConfigError::UnknownHandler {
                    don_id: don.don_id.clone(),
                    handler: don.handler_name.clone(),
                })?;
        Ok(constructor(don, connection)?)
    }
}
