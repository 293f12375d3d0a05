//! Message-passing front of the hub.
//!
//! [`HubHandle`] is cheap to clone and is the only way sessions and HTTP
//! handlers reach the [`super::Hub`]. Each method enqueues one
//! [`HubEvent`]; the hub task applies them in arrival order.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use super::{ClientId, Payload, Position};
use crate::error::RelayError;

/// Event consumed by the hub task.
#[derive(Debug)]
pub enum HubEvent {
    /// Add a session to the membership set.
    Register {
        /// Server-assigned session identifier.
        client_id: ClientId,
        /// Sending half of the session's bounded outbound queue.
        outbound: mpsc::Sender<Payload>,
    },
    /// Remove a session and its position. No-op for non-members.
    Deregister {
        /// Session to remove.
        client_id: ClientId,
    },
    /// Replace the latest position of a session.
    UpdatePosition {
        /// Session that sent the position.
        client_id: ClientId,
        /// Decoded position.
        position: Position,
    },
    /// Queue a payload on every member.
    Broadcast {
        /// Serialized message.
        payload: Payload,
    },
    /// Read membership and position counts.
    Stats {
        /// Channel receiving the counts.
        reply: oneshot::Sender<HubStats>,
    },
}

/// Counts reported by the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Number of registered sessions.
    pub sessions: usize,
    /// Number of sessions that have sent a position.
    pub positions: usize,
}

/// Cloneable handle to the hub task.
#[derive(Debug, Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    pub(super) fn new(events: mpsc::Sender<HubEvent>) -> Self {
        Self { events }
    }

    /// Registers a session with its outbound queue.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubStopped`] if the hub task has exited.
    pub async fn register(
        &self,
        client_id: ClientId,
        outbound: mpsc::Sender<Payload>,
    ) -> Result<(), RelayError> {
        self.send(HubEvent::Register {
            client_id,
            outbound,
        })
        .await
    }

    /// Deregisters a session. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubStopped`] if the hub task has exited.
    pub async fn deregister(&self, client_id: ClientId) -> Result<(), RelayError> {
        self.send(HubEvent::Deregister { client_id }).await
    }

    /// Submits the latest position of a session.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubStopped`] if the hub task has exited.
    pub async fn update_position(
        &self,
        client_id: ClientId,
        position: Position,
    ) -> Result<(), RelayError> {
        self.send(HubEvent::UpdatePosition {
            client_id,
            position,
        })
        .await
    }

    /// Queues `payload` on every registered session.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubStopped`] if the hub task has exited.
    pub async fn broadcast(&self, payload: Payload) -> Result<(), RelayError> {
        self.send(HubEvent::Broadcast { payload }).await
    }

    /// Returns the current membership and position counts.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::HubStopped`] if the hub task has exited.
    pub async fn stats(&self) -> Result<HubStats, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(HubEvent::Stats { reply }).await?;
        rx.await.map_err(|_| RelayError::HubStopped)
    }

    /// Returns `true` once the hub task has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    async fn send(&self, event: HubEvent) -> Result<(), RelayError> {
        self.events
            .send(event)
            .await
            .map_err(|_| RelayError::HubStopped)
    }
}
