//! Identity of one client session.
//!
//! Every upgraded connection gets a fresh [`ClientId`] before it registers
//! with the hub. The id is the only thing that ties the session's outbound
//! queue to its entry in the position table, and it is what other clients
//! see as `clientId` in every snapshot. A client that reconnects is a new
//! session with a new id; nothing on the wire can choose or reuse one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned identifier of one client session.
///
/// Wraps a random UUID v4 and serializes as the bare UUID string. Keys both
/// the hub's membership map and its position table, so a session's
/// position is removed together with its membership.
///
/// There is no `Default` and no conversion from client input:
/// ids come from [`ClientId::new`] at connection time, and payloads that
/// carry their own `clientId` have it overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(uuid::Uuid);

#[allow(clippy::new_without_default)]
impl ClientId {
    /// Assigns an id to a newly accepted connection.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
