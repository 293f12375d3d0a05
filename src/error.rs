//! Relay error types with HTTP status code mapping.
//!
//! [`RelayError`] is the central error type for the relay. Per-connection
//! variants end a session; the HTTP-facing ones map to a structured JSON
//! error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 3001,
///     "message": "hub stopped",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Relay error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                 |
/// |-----------|-----------------|-----------------------------|
/// | 1000–1999 | Configuration   | 500 Internal Server Error   |
/// | 2000–2999 | Connection      | 400 Bad Request / 408 / 500 |
/// | 3000–3999 | Server          | 500 / 503                   |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying WebSocket transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    /// No pong arrived within the read-idle window.
    #[error("read idle for longer than {0:?}")]
    ReadTimeout(std::time::Duration),

    /// A frame could not be written within the write deadline.
    #[error("write did not complete within {0:?}")]
    WriteTimeout(std::time::Duration),

    /// Inbound message exceeded the configured size cap.
    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    MessageTooLarge {
        /// Received size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The hub task is no longer running.
    #[error("hub stopped")]
    HubStopped,
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Config(_) => 1001,
            Self::Transport(_) => 2001,
            Self::ReadTimeout(_) => 2002,
            Self::WriteTimeout(_) => 2003,
            Self::MessageTooLarge { .. } => 2004,
            Self::Closed => 2005,
            Self::Serialization(_) => 2006,
            Self::HubStopped => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MessageTooLarge { .. } | Self::Serialization(_) => StatusCode::BAD_REQUEST,
            Self::ReadTimeout(_) | Self::WriteTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::HubStopped => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Transport(_) | Self::Closed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` for the ways a connection normally ends (peer close,
    /// idle timeout) as opposed to unexpected transport failures.
    #[must_use]
    pub const fn is_expected_disconnect(&self) -> bool {
        matches!(self, Self::Closed | Self::ReadTimeout(_))
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
