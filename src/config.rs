//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable numeric values
//! fall back to the defaults below.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::RelayError;

/// Default bind address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:4000";
/// Default seconds between server pings.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 54;
/// Default read-idle window in seconds, refreshed by every pong.
pub const DEFAULT_PONG_WAIT_SECS: u64 = 60;
/// Default write deadline in seconds.
pub const DEFAULT_WRITE_WAIT_SECS: u64 = 10;
/// Default inbound payload cap in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;
/// Default outbound queue capacity per session.
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;
/// Default capacity of the hub's event queue.
pub const DEFAULT_HUB_EVENT_CAPACITY: usize = 1024;
/// Upper bound for every session timing value (one day).
pub const MAX_SESSION_TIMEOUT: Duration = Duration::from_secs(86_400);

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:4000`).
    pub listen_addr: SocketAddr,

    /// Capacity of the hub's event queue.
    pub hub_event_capacity: usize,

    /// Per-session timing and size limits.
    pub session: SessionLimits,
}

/// Limits applied to every client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Period of the liveness probe sent by the outbound loop.
    pub ping_interval: Duration,
    /// How long a read may stay idle before a pong must have arrived.
    pub pong_wait: Duration,
    /// Deadline for writing a single frame.
    pub write_wait: Duration,
    /// Maximum size of an inbound message in bytes.
    pub max_message_size: usize,
    /// Capacity of the outbound queue.
    pub send_queue_capacity: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            pong_wait: Duration::from_secs(DEFAULT_PONG_WAIT_SECS),
            write_wait: Duration::from_secs(DEFAULT_WRITE_WAIT_SECS),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

impl SessionLimits {
    /// Checks the relations between the limits.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if the ping interval is not shorter
    /// than the pong wait, if a timing value exceeds
    /// [`MAX_SESSION_TIMEOUT`], or if a size or capacity is zero.
    pub fn validate(&self) -> Result<(), RelayError> {
        for (name, value) in [
            ("ping interval", self.ping_interval),
            ("pong wait", self.pong_wait),
            ("write wait", self.write_wait),
        ] {
            if value > MAX_SESSION_TIMEOUT {
                return Err(RelayError::Config(format!(
                    "{name} ({value:?}) exceeds maximum of {MAX_SESSION_TIMEOUT:?}"
                )));
            }
        }
        if self.ping_interval >= self.pong_wait {
            return Err(RelayError::Config(format!(
                "ping interval ({:?}) must be shorter than pong wait ({:?})",
                self.ping_interval, self.pong_wait
            )));
        }
        if self.ping_interval.is_zero() || self.write_wait.is_zero() {
            return Err(RelayError::Config(
                "ping interval and write wait must be non-zero".to_string(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(RelayError::Config(
                "max message size must be non-zero".to_string(),
            ));
        }
        if self.send_queue_capacity == 0 {
            return Err(RelayError::Config(
                "send queue capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if `LISTEN_ADDR` is set but cannot be
    /// parsed as a [`SocketAddr`], or if the session limits are inconsistent.
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .map_err(|e| RelayError::Config(format!("invalid LISTEN_ADDR: {e}")))?;

        let session = SessionLimits {
            ping_interval: Duration::from_secs(parse_env(
                "WS_PING_INTERVAL_SECS",
                DEFAULT_PING_INTERVAL_SECS,
            )),
            pong_wait: Duration::from_secs(parse_env("WS_PONG_WAIT_SECS", DEFAULT_PONG_WAIT_SECS)),
            write_wait: Duration::from_secs(parse_env(
                "WS_WRITE_WAIT_SECS",
                DEFAULT_WRITE_WAIT_SECS,
            )),
            max_message_size: parse_env("WS_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE),
            send_queue_capacity: parse_env("WS_SEND_QUEUE_CAPACITY", DEFAULT_SEND_QUEUE_CAPACITY),
        };
        session.validate()?;

        let hub_event_capacity =
            parse_env("HUB_EVENT_CAPACITY", DEFAULT_HUB_EVENT_CAPACITY).max(1);

        Ok(Self {
            listen_addr,
            hub_event_capacity,
            session,
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SessionLimits::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_reference_values() {
        let limits = SessionLimits::default();
        assert_eq!(limits.ping_interval, Duration::from_secs(54));
        assert_eq!(limits.pong_wait, Duration::from_secs(60));
        assert_eq!(limits.write_wait, Duration::from_secs(10));
        assert_eq!(limits.max_message_size, 512);
        assert_eq!(limits.send_queue_capacity, 256);
    }

    #[test]
    fn ping_must_be_shorter_than_pong_wait() {
        let limits = SessionLimits {
            ping_interval: Duration::from_secs(60),
            ..SessionLimits::default()
        };
        let Err(RelayError::Config(msg)) = limits.validate() else {
            panic!("expected config error");
        };
        assert!(msg.contains("ping interval"));
    }

    #[test]
    fn huge_timeouts_are_rejected() {
        let limits = SessionLimits {
            pong_wait: Duration::from_secs(u64::MAX),
            ..SessionLimits::default()
        };
        let Err(RelayError::Config(msg)) = limits.validate() else {
            panic!("expected config error");
        };
        assert!(msg.contains("pong wait"));

        let limits = SessionLimits {
            write_wait: MAX_SESSION_TIMEOUT + Duration::from_secs(1),
            ..SessionLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn timeouts_at_the_bound_are_accepted() {
        let limits = SessionLimits {
            ping_interval: MAX_SESSION_TIMEOUT - Duration::from_secs(1),
            pong_wait: MAX_SESSION_TIMEOUT,
            write_wait: MAX_SESSION_TIMEOUT,
            ..SessionLimits::default()
        };
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let limits = SessionLimits {
            send_queue_capacity: 0,
            ..SessionLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn zero_message_size_is_rejected() {
        let limits = SessionLimits {
            max_message_size: 0,
            ..SessionLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u64 = parse_env("POINTER_RELAY_TEST_SURELY_UNSET_KEY", 7);
        assert_eq!(value, 7);
    }
}
