//! Pinboard server core — room registry and action dispatcher.
//!
//! The registry tracks which participant is in which room and how to
//! reach them; the dispatcher turns inbound action frames into storage
//! writes and roommate broadcasts. Both sit behind the transport's
//! `ConnectionHandler` trait.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::BoardServer;
pub use registry::RoomRegistry;
