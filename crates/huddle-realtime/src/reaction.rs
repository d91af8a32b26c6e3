//! Room and message reactions.
//!
//! Reactions are best effort. Every operation reports success as a `bool`
//! and never fails the caller.

use std::sync::Arc;

use tracing::{debug, warn};

use huddle_core::traits::RealtimeBackend;
use huddle_core::types::ChannelStatus;

use crate::channel::ActiveChannel;

/// Sends reactions on the active channel.
#[derive(Debug, Clone)]
pub struct ReactionManager {
    backend: Arc<dyn RealtimeBackend>,
}

impl ReactionManager {
    pub fn new(backend: Arc<dyn RealtimeBackend>) -> Self {
        Self { backend }
    }

    /// Sends an ephemeral reaction to the whole room.
    pub async fn send_room_reaction(&self, channel: Option<&ActiveChannel>, name: &str) -> bool {
        let Some(channel) = self.attached(channel) else {
            return false;
        };
        match self.backend.send_room_reaction(channel, name).await {
            Ok(()) => {
                debug!(channel = %channel, reaction = %name, "Room reaction sent");
                true
            }
            Err(e) => {
                warn!(channel = %channel, reaction = %name, error = %e, "Room reaction failed");
                false
            }
        }
    }

    /// Adds this client's `name` reaction to the message with `identity`.
    pub async fn send_message_reaction(
        &self,
        channel: Option<&ActiveChannel>,
        identity: &str,
        name: &str,
    ) -> bool {
        let Some(channel) = self.attached(channel) else {
            return false;
        };
        match self
            .backend
            .send_message_reaction(channel, identity, name)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(channel = %channel, message_identity = %identity, reaction = %name, error = %e, "Message reaction failed");
                false
            }
        }
    }

    /// Removes this client's `name` reaction from the message with `identity`.
    pub async fn delete_message_reaction(
        &self,
        channel: Option<&ActiveChannel>,
        identity: &str,
        name: &str,
    ) -> bool {
        let Some(channel) = self.attached(channel) else {
            return false;
        };
        match self
            .backend
            .delete_message_reaction(channel, identity, name)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(channel = %channel, message_identity = %identity, reaction = %name, error = %e, "Removing message reaction failed");
                false
            }
        }
    }

    fn attached<'a>(&self, channel: Option<&'a ActiveChannel>) -> Option<&'a str> {
        let channel = channel?;
        if self.backend.channel_status(channel.name()) != ChannelStatus::Attached {
            debug!(channel = %channel.name(), "Reaction skipped, channel not attached");
            return None;
        }
        Some(channel.name())
    }
}
