//! Network Module
//!
//! HTTP listener for the relay endpoint.
//!
//! ## Architecture
//! - One thread owns a multi-threaded async runtime serving the router
//! - Storage and bot calls run on the runtime's blocking pool
//! - Graceful shutdown is signalled from outside and bounded by a deadline

mod handler;
mod server;

pub use handler::{router, RelayState};
pub use server::HttpServer;
