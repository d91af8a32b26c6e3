//! Raw reaction events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::reaction::ReactionCount;

/// A room reaction as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRoomReaction {
    /// Reaction name.
    pub name: String,
    /// Client id that sent the reaction.
    pub client_id: String,
    /// Backend timestamp in milliseconds since the epoch.
    pub timestamp_millis: i64,
}

/// A message reaction summary update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessageReaction {
    /// Identity (logical id or serial) of the target message.
    pub message_identity: String,
    /// The reaction that changed, if reported.
    pub reaction_name: Option<String>,
    /// Reaction name to counts after the change.
    pub summary: BTreeMap<String, ReactionCount>,
}
