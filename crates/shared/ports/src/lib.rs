//! DON Gateway Ports
//!
//! Port definitions (traits) for the DON gateway.
//! These define the boundaries between request routing and its collaborators:
//! per-DON handlers, the node connection manager and the HTTP transport.

mod connection;
mod error;
mod handler;
mod transport;

pub use connection::{ConnectionManager, DonConnection};
pub use error::{ConnectionError, HandlerError, TransportError};
pub use handler::{Callback, Handler, callback_channel};
pub use transport::{HttpServer, UserRequestHandler};

#[cfg(test)]
mod tests {
    use super::*;

    // Ensure traits are object-safe
    fn _assert_handler_object_safe(_: &dyn Handler) {}
    fn _assert_connection_manager_object_safe(_: &dyn ConnectionManager) {}
    fn _assert_don_connection_object_safe(_: &dyn DonConnection) {}
    fn _assert_http_server_object_safe(_: &dyn HttpServer) {}
    fn _assert_user_request_handler_object_safe(_: &dyn UserRequestHandler) {}
}
