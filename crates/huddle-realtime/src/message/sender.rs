//! Outbound message publishing.

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use huddle_core::config::RealtimeConfig;
use huddle_core::error::AppError;
use huddle_core::result::AppResult;
use huddle_core::traits::RealtimeBackend;
use huddle_core::types::{ChannelStatus, MessageMetadata};

use crate::channel::ActiveChannel;

use super::builder::{self, SenderProfile};
use super::validator;

/// Publishes messages to the active channel.
///
/// Size and metadata checks fail with an error before any network call.
/// Delivery problems do not: they are logged and reported as `Ok(false)`.
#[derive(Debug)]
pub struct Sender {
    backend: Arc<dyn RealtimeBackend>,
    config: RealtimeConfig,
    profile: RwLock<Option<SenderProfile>>,
}

impl Sender {
    pub fn new(backend: Arc<dyn RealtimeBackend>, config: RealtimeConfig) -> Self {
        Self {
            backend,
            config,
            profile: RwLock::new(None),
        }
    }

    /// Sets the identity stamped into outbound messages.
    pub fn set_profile(&self, profile: SenderProfile) {
        *self.profile.write().unwrap_or_else(|e| e.into_inner()) = Some(profile);
    }

    pub fn profile(&self) -> Option<SenderProfile> {
        self.profile
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Publishes `content` to `channel`.
    ///
    /// Returns `Ok(true)` once the backend accepted the message. A
    /// rate-limited publish is retried exactly once after the configured
    /// delay.
    pub async fn send(
        &self,
        channel: &ActiveChannel,
        content: &str,
        metadata: Option<MessageMetadata>,
    ) -> AppResult<bool> {
        let profile = self
            .profile()
            .ok_or_else(|| AppError::not_ready("No sender profile; connect first"))?;

        let metadata = metadata.unwrap_or_default();
        validator::validate_metadata(&metadata, self.config.max_metadata_entries)?;

        let payload = builder::build_payload(&profile, content, metadata);
        let size = validator::validate_payload_size(&payload, self.config.max_payload_bytes)?;

        let name = channel.name();
        if !self.ensure_attached(name).await {
            return Ok(false);
        }

        match self.backend.publish(name, &payload).await {
            Ok(()) => {
                debug!(channel = %name, message_id = %payload.id, size, "Message sent");
                Ok(true)
            }
            Err(e) if e.is_rate_limited() => {
                let delay = self.config.rate_limit_retry();
                warn!(
                    channel = %name,
                    message_id = %payload.id,
                    retry_in_ms = delay.as_millis() as u64,
                    "Publish rate limited, retrying once"
                );
                tokio::time::sleep(delay).await;

                match self.backend.publish(name, &payload).await {
                    Ok(()) => {
                        debug!(channel = %name, message_id = %payload.id, size, "Message sent on retry");
                        Ok(true)
                    }
                    Err(e) => {
                        warn!(channel = %name, message_id = %payload.id, error = %e, "Retry failed, message dropped");
                        Ok(false)
                    }
                }
            }
            Err(e) => {
                warn!(channel = %name, message_id = %payload.id, error = %e, "Publish failed");
                Ok(false)
            }
        }
    }

    /// Re-attaches once if the backend no longer reports the channel attached.
    async fn ensure_attached(&self, channel: &str) -> bool {
        if self.backend.channel_status(channel) == ChannelStatus::Attached {
            return true;
        }

        warn!(channel = %channel, "Channel not attached, re-attaching before send");
        match self.backend.attach(channel).await {
            Ok(()) => true,
            Err(e) => {
                warn!(channel = %channel, error = %e, "Re-attach failed, message not sent");
                false
            }
        }
    }
}
