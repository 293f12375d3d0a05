//! WebSocket layer: upgrade handler, connection adapter, client sessions.
//!
//! The endpoint at `/ws` turns every accepted connection into a
//! [`session::ClientSession`] registered with the hub.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod session;
