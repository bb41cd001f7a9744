//! Node-facing connection managers

mod in_memory;

pub use in_memory::{InMemoryConnectionManager, InMemoryDonConnection};
