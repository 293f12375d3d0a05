//! Single-writer dispatcher for membership and positions.
//!
//! [`Hub`] owns the set of registered sessions and the latest position of
//! each one. It runs as one task consuming [`HubEvent`]s from a queue, so
//! registration, deregistration, updates and broadcasts are applied strictly
//! one at a time and every broadcast sees a settled snapshot.
//!
//! # Backpressure
//!
//! Each session has a bounded outbound queue. Broadcast uses `try_send`;
//! a member whose queue is full is evicted on the spot: its sender is
//! dropped (closing the queue) and its position entry is removed in the
//! same pass. A slow consumer never stalls delivery to others.

use std::collections::HashMap;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::hub_handle::{HubEvent, HubHandle, HubStats};
use super::{ClientId, Position};

/// Serialized message queued for a session's outbound loop.
pub type Payload = Utf8Bytes;

/// Dispatcher state machine.
///
/// Not shared: it is moved into the task started by [`Hub::spawn`] and only
/// reachable through [`HubHandle`]. The synchronous methods are public so
/// the state machine can be driven directly.
#[derive(Debug, Default)]
pub struct Hub {
    members: HashMap<ClientId, mpsc::Sender<Payload>>,
    positions: HashMap<ClientId, Position>,
}

impl Hub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the hub task and returns a handle to it.
    ///
    /// The task runs until every [`HubHandle`] has been dropped.
    #[must_use]
    pub fn spawn(event_capacity: usize) -> HubHandle {
        let (tx, rx) = mpsc::channel(event_capacity.max(1));
        tokio::spawn(Self::new().run(rx));
        HubHandle::new(tx)
    }

    /// Processes events until the queue is closed.
    pub async fn run(mut self, mut events: mpsc::Receiver<HubEvent>) {
        tracing::debug!("hub started");
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::debug!(sessions = self.members.len(), "hub stopped");
    }

    /// Applies a single event.
    pub fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register {
                client_id,
                outbound,
            } => self.register(client_id, outbound),
            HubEvent::Deregister { client_id } => {
                self.deregister(client_id);
            }
            HubEvent::UpdatePosition {
                client_id,
                position,
            } => {
                self.update_position(client_id, position);
            }
            HubEvent::Broadcast { payload } => {
                self.broadcast(&payload);
            }
            HubEvent::Stats { reply } => {
                // Requester may have given up waiting.
                let _ = reply.send(self.stats());
            }
        }
    }

    /// Adds a session and sends the current snapshot to everyone,
    /// the newcomer included.
    pub fn register(&mut self, client_id: ClientId, outbound: mpsc::Sender<Payload>) {
        if self.members.insert(client_id, outbound).is_some() {
            tracing::warn!(%client_id, "session registered twice, replacing outbound queue");
        }
        tracing::info!(%client_id, sessions = self.members.len(), "session registered");
        self.broadcast_all_positions();
    }

    /// Removes a session and its position, closing its outbound queue.
    ///
    /// Returns `false` (and does nothing) if the session is not a member.
    pub fn deregister(&mut self, client_id: ClientId) -> bool {
        if self.members.remove(&client_id).is_none() {
            return false;
        }
        self.positions.remove(&client_id);
        tracing::info!(%client_id, sessions = self.members.len(), "session deregistered");
        self.broadcast_all_positions();
        true
    }

    /// Replaces the position of a member and broadcasts the new snapshot.
    ///
    /// The `client_id` inside `position` is overwritten with `client_id`.
    /// Updates for sessions that are not members (already evicted) are
    /// dropped and `false` is returned: inserting them would leave a
    /// position with no member behind, and nothing would ever remove it.
    pub fn update_position(&mut self, client_id: ClientId, mut position: Position) -> bool {
        if !self.members.contains_key(&client_id) {
            tracing::debug!(%client_id, "dropping position from unregistered session");
            return false;
        }
        position.client_id = client_id;
        self.positions.insert(client_id, position);
        self.broadcast_all_positions();
        true
    }

    /// Queues `payload` on every member without waiting.
    ///
    /// Members whose queue is full or already closed are evicted; their ids
    /// are returned.
    pub fn broadcast(&mut self, payload: &Payload) -> Vec<ClientId> {
        let mut evicted = Vec::new();
        self.members
            .retain(|client_id, outbound| match outbound.try_send(payload.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(%client_id, "outbound queue full, evicting slow session");
                    evicted.push(*client_id);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%client_id, "outbound loop gone, evicting session");
                    evicted.push(*client_id);
                    false
                }
            });
        for client_id in &evicted {
            self.positions.remove(client_id);
        }
        evicted
    }

    /// Serializes every known position and broadcasts the result.
    ///
    /// A serialization failure is logged and the pass is skipped.
    pub fn broadcast_all_positions(&mut self) {
        let snapshot = self.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                self.broadcast(&Payload::from(json));
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize positions, skipping broadcast");
            }
        }
    }

    /// Returns a copy of every known position, in no particular order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    /// Returns `true` if the session is currently registered.
    #[must_use]
    pub fn is_member(&self, client_id: ClientId) -> bool {
        self.members.contains_key(&client_id)
    }

    /// Returns the latest position of a session, if it has sent one.
    #[must_use]
    pub fn position(&self, client_id: ClientId) -> Option<&Position> {
        self.positions.get(&client_id)
    }

    /// Returns membership and position counts.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            sessions: self.members.len(),
            positions: self.positions.len(),
        }
    }
}
