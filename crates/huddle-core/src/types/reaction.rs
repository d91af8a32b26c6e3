//! Room- and message-scoped reactions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An ephemeral reaction sent to the whole room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomReaction {
    /// Reaction name (for example an emoji).
    pub name: String,
    /// Client id that sent the reaction.
    pub user_id: String,
    /// Backend timestamp in milliseconds since the epoch.
    pub created_at_millis: i64,
}

/// Count of clients that applied one reaction to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCount {
    /// Total number of applications.
    pub total: u32,
    /// Client ids that applied the reaction.
    pub client_ids: Vec<String>,
}

/// Aggregated reaction summary for one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReaction {
    /// Identity of the message the reactions belong to.
    pub message_identity: String,
    /// Reaction that changed, when the backend reports it.
    pub reaction_name: Option<String>,
    /// Reaction name to counts.
    pub summary: BTreeMap<String, ReactionCount>,
}
