//! Connection lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of the single backend connection.
///
/// Transitions are driven by the backend; the session core only observes and
/// republishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created but `connect` has not been called.
    Initialized,
    /// A connection attempt is in progress.
    Connecting,
    /// Connected and authenticated.
    Connected,
    /// Transiently disconnected; reconnection may succeed.
    Disconnected,
    /// Reconnection attempts were exhausted; the caller must reconnect.
    Suspended,
    /// Terminal failure (for example rejected credentials).
    Failed,
}

impl ConnectionState {
    /// Returns the state as a lowercase string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Suspended => "suspended",
            Self::Failed => "failed",
        }
    }

    /// Whether the connection is usable.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Whether no automatic recovery will follow this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A republished connection state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStateChange {
    /// State before the transition.
    pub previous: ConnectionState,
    /// State after the transition.
    pub current: ConnectionState,
    /// Optional human-readable reason.
    pub reason: Option<String>,
}
