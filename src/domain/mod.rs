//! Domain layer: session identity, positions, and the hub.
//!
//! The [`Hub`] is the single owner of the membership set and the position
//! table. Everything else talks to it through a [`HubHandle`].

pub mod client_id;
pub mod hub;
pub mod hub_handle;
pub mod position;

pub use client_id::ClientId;
pub use hub::{Hub, Payload};
pub use hub_handle::{HubEvent, HubHandle, HubStats};
pub use position::Position;
