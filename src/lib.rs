//! # pointer-relay
//!
//! Real-time pointer position relay over WebSocket.
//!
//! Every client reports its own pointer coordinates; the relay keeps the
//! latest position per connection and sends the full set to every
//! connected client whenever anything changes. Delivery is best effort:
//! a client that cannot keep up is disconnected rather than buffered.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)
//!     │
//!     ├── WS Handler (ws/handler)
//!     ├── ClientSession: inbound loop + outbound loop (ws/session)
//!     ├── Connection adapter: size cap, deadlines, ping/pong (ws/connection)
//!     │
//!     ├── HubHandle (domain/)
//!     └── Hub: membership set + position table, one task (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod ws;
