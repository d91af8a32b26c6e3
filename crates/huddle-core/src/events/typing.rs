//! Raw typing snapshot.

use serde::{Deserialize, Serialize};

/// Authoritative set of clients typing in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTypingEvent {
    /// Every client id currently typing.
    pub currently_typing: Vec<String>,
}
