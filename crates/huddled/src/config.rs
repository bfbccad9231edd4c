//! Daemon configuration.
//!
//! Configuration is loaded from environment variables, falling back to
//! defaults for anything unset. Values that are set but unparsable are
//! rejected rather than silently replaced.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Default WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:7070";

/// Default maximum number of live connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;

/// Default maximum members per room.
pub const DEFAULT_MAX_ROOM_SIZE: usize = 16;

/// Default maximum inbound frame size (64 KiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 65_536;

/// Default interval between keepalive pings.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 20;

/// Default time to wait for a reply to a keepalive ping.
pub const DEFAULT_PONG_TIMEOUT_SECS: u64 = 20;

/// Capacity limits enforced by the coordinator actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorLimits {
    pub max_connections: usize,
    pub max_room_size: usize,
}

impl Default for CoordinatorLimits {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_room_size: DEFAULT_MAX_ROOM_SIZE,
        }
    }
}

/// Signaling server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to (HUDDLE_BIND).
    pub bind_address: SocketAddr,

    /// Coordinator capacity limits
    /// (HUDDLE_MAX_CONNECTIONS, HUDDLE_MAX_ROOM_SIZE).
    pub limits: CoordinatorLimits,

    /// Largest accepted text frame in bytes (HUDDLE_MAX_MESSAGE_BYTES).
    pub max_message_bytes: usize,

    /// Interval between keepalive pings (HUDDLE_PING_INTERVAL_SECS).
    pub ping_interval: Duration,

    /// How long a ping may go unanswered before the transport is
    /// considered dead (HUDDLE_PONG_TIMEOUT_SECS).
    pub pong_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 7070)),
            limits: CoordinatorLimits::default(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            pong_timeout: Duration::from_secs(DEFAULT_PONG_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_raw = vars
            .get("HUDDLE_BIND")
            .map(String::as_str)
            .unwrap_or(DEFAULT_BIND_ADDRESS);
        let bind_address = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue {
                name: "HUDDLE_BIND",
                value: bind_raw.to_string(),
                reason: e.to_string(),
            })?;

        let max_connections =
            parse_positive(vars, "HUDDLE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let max_room_size = parse_positive(vars, "HUDDLE_MAX_ROOM_SIZE", DEFAULT_MAX_ROOM_SIZE)?;
        let max_message_bytes =
            parse_positive(vars, "HUDDLE_MAX_MESSAGE_BYTES", DEFAULT_MAX_MESSAGE_BYTES)?;
        let ping_interval_secs =
            parse_positive(vars, "HUDDLE_PING_INTERVAL_SECS", DEFAULT_PING_INTERVAL_SECS as usize)?;
        let pong_timeout_secs =
            parse_positive(vars, "HUDDLE_PONG_TIMEOUT_SECS", DEFAULT_PONG_TIMEOUT_SECS as usize)?;

        Ok(Self {
            bind_address,
            limits: CoordinatorLimits {
                max_connections,
                max_room_size,
            },
            max_message_bytes,
            ping_interval: Duration::from_secs(ping_interval_secs as u64),
            pong_timeout: Duration::from_secs(pong_timeout_secs as u64),
        })
    }
}

/// Parses a strictly positive integer, using `default` when unset.
fn parse_positive(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(default);
    };

    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            name,
            value: raw.clone(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidValue {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
