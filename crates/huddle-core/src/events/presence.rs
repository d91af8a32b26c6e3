//! Raw presence event.

use serde::{Deserialize, Serialize};

use crate::types::presence::PresenceAction;

/// A presence transition as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPresenceEvent {
    /// What happened.
    pub action: PresenceAction,
    /// Client id of the member.
    pub client_id: String,
    /// Presence data attached by the member.
    pub data: Option<serde_json::Value>,
    /// Backend timestamp in milliseconds since the epoch.
    pub timestamp_millis: i64,
}
