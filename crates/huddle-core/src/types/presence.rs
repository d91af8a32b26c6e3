//! Presence member types.

use serde::{Deserialize, Serialize};

/// Presence event type reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceAction {
    /// Member entered the channel.
    Enter,
    /// Member was already present when the listener attached.
    Present,
    /// Member updated its presence data.
    Update,
    /// Member left the channel.
    Leave,
}

impl PresenceAction {
    /// Whether a member with this last event belongs in the live set.
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Leave)
    }
}

/// A member of the channel's presence set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMember {
    /// Client id of the member.
    pub client_id: String,
    /// Most recent presence event for this member.
    pub last_event: PresenceAction,
    /// Optional presence data attached by the member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Delivered to presence handlers after the live set changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    /// The member whose event triggered the change.
    pub member: PresenceMember,
    /// Sorted client ids currently present after applying the event.
    pub members: Vec<String>,
}
