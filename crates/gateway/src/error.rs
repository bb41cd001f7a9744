//! Error types for the gateway crate

use dongate_ports::{ConnectionError, HandlerError, TransportError};
use std::fmt;
use thiserror::Error;

/// Correlation cache errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Too many pending requests (max {0})")]
    Capacity(usize),

    #[error("Request already pending: {0}")]
    DuplicateKey(String),
}

impl From<CacheError> for HandlerError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Capacity(_) => HandlerError::Overloaded,
            CacheError::DuplicateKey(key) => HandlerError::DuplicateRequest(key),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Empty DON id")]
    EmptyDonId,

    #[error("Duplicate DON id: {0}")]
    DuplicateDonId(String),

    #[error("Invalid node address {address} in DON {don_id}")]
    InvalidNodeAddress { don_id: String, address: String },

    #[error("Duplicate node address {address} in DON {don_id}")]
    DuplicateNodeAddress { don_id: String, address: String },

    #[error("DON {don_id} has {members} members, too few to tolerate f={f}")]
    InsufficientMembers {
        don_id: String,
        members: usize,
        f: usize,
    },

    #[error("Unknown handler {handler} for DON {don_id}")]
    UnknownHandler { don_id: String, handler: String },
}

/// Gateway construction and lifecycle errors
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Duplicate DON id: {0}")]
    DuplicateDonId(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Connection manager error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Gateway already started and failed to start")]
    StartFailed,

    #[error("Gateway already closed")]
    AlreadyClosed,

    #[error("Failed to close gateway: {0}")]
    Close(CloseErrors),
}

/// Errors accumulated while closing every component
#[derive(Debug, Default)]
pub struct CloseErrors(pub Vec<String>);

impl CloseErrors {
    pub fn push(&mut self, component: &str, error: impl fmt::Display) {
        self.0.push(format!("{}: {}", component, error));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CloseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
