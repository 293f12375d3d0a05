//! Latest known pointer position of a session.

use serde::{Deserialize, Serialize};

use super::ClientId;

/// Pointer coordinates of one session, as broadcast to every client.
///
/// Serialized as `{"clientId": "...", "x": 1.0, "y": 2.0, "color": "#fff"}`.
/// A new update from the same session replaces the previous value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Session that owns this position. Always assigned by the server.
    #[serde(rename = "clientId")]
    pub client_id: ClientId,
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// Display color chosen by the client.
    pub color: String,
}

impl Position {
    /// Creates a position owned by `client_id`.
    #[must_use]
    pub fn new(client_id: ClientId, x: f64, y: f64, color: impl Into<String>) -> Self {
        Self {
            client_id,
            x,
            y,
            color: color.into(),
        }
    }
}
