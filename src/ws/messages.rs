//! Wire messages exchanged over the WebSocket.
//!
//! Client → server: `{"x": 1, "y": 2, "color": "#fff"}`.
//! Server → client: a JSON array of [`Position`] snapshots.

use serde::Deserialize;

use crate::domain::{ClientId, Position};
use crate::error::RelayError;

/// Position update sent by a client.
///
/// Any identifier field in the message is ignored; the server assigns the
/// owner when converting into a [`Position`]. `color` is optional because
/// simple clients only report coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PositionUpdate {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
    /// Display color, empty when not provided.
    #[serde(default)]
    pub color: String,
}

impl PositionUpdate {
    /// Decodes a client message.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Serialization`] if `text` is not a JSON object
    /// with numeric `x` and `y`.
    pub fn decode(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Converts into a [`Position`] owned by `client_id`.
    #[must_use]
    pub fn into_position(self, client_id: ClientId) -> Position {
        Position::new(client_id, self.x, self.y, self.color)
    }
}
