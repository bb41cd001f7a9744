//! Gateway configuration
//!
//! Loaded from JSON:
//! - user-facing HTTP server settings
//! - node connection manager settings
//! - one entry per DON: handler type, opaque handler config and members

use crate::error::ConfigError;
use dongate_core::{is_valid_address, normalize_address};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Root gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// User-facing HTTP server
    #[serde(default)]
    pub user_server: HttpServerConfig,

    /// Node connection manager
    #[serde(default)]
    pub connection_manager: ConnectionManagerConfig,

    /// DONs served by this gateway
    #[serde(default)]
    pub dons: Vec<DonConfig>,
}

impl GatewayConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check DON ids, member addresses and fault tolerance
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut don_ids = HashSet::new();
        for don in &self.dons {
            if don.don_id.is_empty() {
                return Err(ConfigError::EmptyDonId);
            }
            if !don_ids.insert(don.don_id.as_str()) {
                return Err(ConfigError::DuplicateDonId(don.don_id.clone()));
            }
            don.validate()?;
        }
        Ok(())
    }
}

/// User-facing HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_path")]
    pub path: String,

    /// Larger request bodies are rejected without reaching the router
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_max_request_bytes() -> usize {
    100_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl HttpServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_request_bytes: default_max_request_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Node connection manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionManagerConfig {
    /// Capacity of each node's outbound mailbox
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_mailbox_capacity() -> usize {
    1000
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

/// One DON served by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonConfig {
    pub don_id: String,

    /// Registered handler type (`dummy`, `quorum`, ...)
    pub handler_name: String,

    /// Handler-specific settings, decoded by the handler
    #[serde(default)]
    pub handler_config: Value,

    #[serde(default)]
    pub members: Vec<NodeConfig>,

    /// Number of faulty members tolerated
    #[serde(default)]
    pub f: usize,
}

impl DonConfig {
    pub fn new(don_id: impl Into<String>, handler_name: impl Into<String>) -> Self {
        Self {
            don_id: don_id.into(),
            handler_name: handler_name.into(),
            handler_config: Value::Null,
            members: Vec::new(),
            f: 0,
        }
    }

    pub fn with_member(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.members.push(NodeConfig {
            name: name.into(),
            address: address.into(),
        });
        self
    }

    pub fn with_handler_config(mut self, handler_config: Value) -> Self {
        self.handler_config = handler_config;
        self
    }

    pub fn with_f(mut self, f: usize) -> Self {
        self.f = f;
        self
    }

    /// Lower-cased member addresses, in configuration order
    pub fn member_addresses(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| normalize_address(&m.address))
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for member in &self.members {
            if !is_valid_address(&member.address) {
                return Err(ConfigError::InvalidNodeAddress {
                    don_id: self.don_id.clone(),
                    address: member.address.clone(),
                });
            }
            if !seen.insert(normalize_address(&member.address)) {
                return Err(ConfigError::DuplicateNodeAddress {
                    don_id: self.don_id.clone(),
                    address: member.address.clone(),
                });
            }
        }

        if self.f > 0 && self.members.len() < 3 * self.f + 1 {
            return Err(ConfigError::InsufficientMembers {
                don_id: self.don_id.clone(),
                members: self.members.len(),
                f: self.f,
            });
        }
        Ok(())
    }
}

/// DON member node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub name: String,
    pub address: String,
}
