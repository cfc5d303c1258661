//! WebSocket transport for the pinboard server.
//!
//! The transport handles:
//! - Connection lifecycle (open, message, close)
//! - Heartbeat ping/pong
//! - Outbound frame delivery per client
//!
//! It is decoupled from the board logic via the `ConnectionHandler` trait.

pub mod server;

pub use server::{ConnectionHandler, TransportConfig, TransportError, TransportServer};
