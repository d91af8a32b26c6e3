//! Channel session status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the active channel session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    /// Not attached.
    Detached,
    /// Attach requested, not yet confirmed.
    Attaching,
    /// Attached at the backend.
    Attached,
    /// Being torn down.
    Releasing,
}

impl ChannelStatus {
    /// Returns the status as a lowercase string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detached => "detached",
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Releasing => "releasing",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the active channel session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSession {
    /// Opaque channel name supplied by the caller.
    pub name: String,
    /// Current lifecycle status.
    pub status: ChannelStatus,
    /// Whether the attach/subscribe/presence sequence completed.
    pub ready: bool,
}
