use thiserror::Error;

/// Synchronous admission errors returned by handlers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("Invalid handler config: {0}")]
    InvalidConfig(String),

    #[error("Unsupported message: {0}")]
    Unsupported(String),

    #[error("Request already pending: {0}")]
    DuplicateRequest(String),

    #[error("Too many pending requests")]
    Overloaded,

    #[error("Failed to forward request to any node: {0}")]
    ForwardFailed(String),

    #[error("Rejected node message: {0}")]
    NodeMessageRejected(String),

    #[error("Handler not running")]
    NotRunning,
}

/// Errors from the node connection manager
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Unknown DON: {0}")]
    UnknownDon(String),

    #[error("Unknown node {node} in DON {don_id}")]
    UnknownNode { don_id: String, node: String },

    #[error("Node mailbox full: {0}")]
    MailboxFull(String),

    #[error("Connection closed")]
    Closed,

    #[error("Invalid node message: {0}")]
    InvalidMessage(String),

    #[error("No handler registered for DON {0}")]
    NoHandler(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
}

/// Errors from the user-facing HTTP transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("No request handler bound")]
    NoHandler,

    #[error("Transport not running")]
    NotRunning,

    #[error("Transport already closed")]
    Closed,
}
