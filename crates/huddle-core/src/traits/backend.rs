//! Realtime backend trait for pluggable pub/sub transports.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, watch};

use crate::error::{AppError, ErrorKind};
use crate::events::{ChannelEvent, RawMessage, StreamKind};
use crate::traits::auth::TokenProvider;
use crate::types::channel::ChannelStatus;
use crate::types::connection::ConnectionState;
use crate::types::message::OutboundPayload;
use crate::types::presence::PresenceMember;

/// An error reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backend error {code}: {message}")]
pub struct BackendError {
    /// Backend error code.
    pub code: u32,
    /// Human-readable message.
    pub message: String,
}

impl BackendError {
    /// Code the backend uses when a request is rejected by its rate limit.
    pub const RATE_LIMITED: u32 = 42910;
    /// Code used when a channel operation requires an attached channel.
    pub const CHANNEL_NOT_ATTACHED: u32 = 90001;
    /// Code used when the connection is not usable.
    pub const CONNECTION_UNAVAILABLE: u32 = 80003;
    /// Code used when credentials were rejected.
    pub const UNAUTHORIZED: u32 = 40101;
    /// Generic internal failure.
    pub const INTERNAL: u32 = 50000;

    /// Creates a new backend error.
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates a rate-limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(Self::RATE_LIMITED, message)
    }

    /// Whether this error signals the backend's rate limit.
    pub fn is_rate_limited(&self) -> bool {
        self.code == Self::RATE_LIMITED
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        let kind = match err.code {
            BackendError::RATE_LIMITED => ErrorKind::RateLimit,
            BackendError::UNAUTHORIZED => ErrorKind::Authentication,
            BackendError::CONNECTION_UNAVAILABLE => ErrorKind::Connection,
            _ => ErrorKind::Backend,
        };
        let message = err.to_string();
        AppError::with_source(kind, message, err)
    }
}

/// Parameters for a single history page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Maximum number of messages to return.
    pub limit: usize,
    /// Return newest messages first.
    pub newest_first: bool,
}

impl HistoryQuery {
    /// A newest-first page of at most `limit` messages.
    pub fn newest(limit: usize) -> Self {
        Self {
            limit,
            newest_first: true,
        }
    }
}

/// Trait for realtime pub/sub backends.
///
/// One instance represents one client connection. Channel names are opaque
/// routing keys. Stream subscriptions are `broadcast` receivers; dropping a
/// receiver is how a listener detaches from the stream.
#[async_trait]
pub trait RealtimeBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Open the connection for `client_id`. The backend keeps `tokens` to
    /// re-fetch credentials on expiry. Returns once the attempt has started;
    /// progress is reported through [`connection_state`](Self::connection_state).
    async fn connect(
        &self,
        client_id: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<(), BackendError>;

    /// Watch the connection state.
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;

    /// Close the connection.
    async fn close(&self);

    /// Attach a channel by name.
    async fn attach(&self, channel: &str) -> Result<(), BackendError>;

    /// Detach a channel by name.
    async fn detach(&self, channel: &str) -> Result<(), BackendError>;

    /// Current attach status of a channel at the backend.
    fn channel_status(&self, channel: &str) -> ChannelStatus;

    /// Listen to one event stream of an attached channel.
    async fn subscribe(
        &self,
        channel: &str,
        stream: StreamKind,
    ) -> Result<broadcast::Receiver<ChannelEvent>, BackendError>;

    /// Publish a chat message.
    async fn publish(&self, channel: &str, payload: &OutboundPayload) -> Result<(), BackendError>;

    /// Enter the channel's presence set.
    async fn presence_enter(
        &self,
        channel: &str,
        data: Option<serde_json::Value>,
    ) -> Result<(), BackendError>;

    /// Leave the channel's presence set.
    async fn presence_leave(&self, channel: &str) -> Result<(), BackendError>;

    /// Members currently present on the channel.
    async fn presence_members(&self, channel: &str) -> Result<Vec<PresenceMember>, BackendError>;

    /// Signal that this client started or stopped typing.
    async fn send_typing(&self, channel: &str, is_typing: bool) -> Result<(), BackendError>;

    /// Fetch one page of message history.
    async fn history(
        &self,
        channel: &str,
        query: HistoryQuery,
    ) -> Result<Vec<RawMessage>, BackendError>;

    /// Send a room-level reaction.
    async fn send_room_reaction(&self, channel: &str, name: &str) -> Result<(), BackendError>;

    /// Add a reaction to a message.
    async fn send_message_reaction(
        &self,
        channel: &str,
        message_identity: &str,
        name: &str,
    ) -> Result<(), BackendError>;

    /// Remove a reaction from a message.
    async fn delete_message_reaction(
        &self,
        channel: &str,
        message_identity: &str,
        name: &str,
    ) -> Result<(), BackendError>;
}
