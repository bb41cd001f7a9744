//! User-facing transports
//!
//! Implementations of [`dongate_ports::HttpServer`]. The gateway binds its
//! router to the server with `set_handler`.

mod local;

pub use local::LocalHttpServer;
