//! Session facade tying the connection, channel and message components
//! together for one client.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use huddle_core::config::RealtimeConfig;
use huddle_core::error::AppError;
use huddle_core::result::AppResult;
use huddle_core::traits::{RealtimeBackend, TokenProvider};
use huddle_core::types::{
    ChannelSession, ConnectionState, ConnectionStateChange, Message, MessageMetadata,
    PresenceMember,
};

use crate::channel::{
    ChannelSessionManager, HandlerSlot, SessionEvents, SubscriptionMultiplexer, SwitchOutcome,
};
use crate::connection::ConnectionManager;
use crate::history::HistoryFetcher;
use crate::message::{MessageDeduplicator, Sender, SenderProfile};
use crate::presence::{PresenceSet, TypingSet};
use crate::reaction::ReactionManager;

/// A single client's realtime chat session.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use huddle_core::config::RealtimeConfig;
/// # use huddle_core::traits::StaticTokenProvider;
/// # use huddle_realtime::bridge::{MemoryBackend, MemoryHub};
/// # use huddle_realtime::ChatSession;
/// # async fn demo() -> huddle_core::AppResult<()> {
/// let backend = Arc::new(MemoryBackend::new(MemoryHub::new()));
/// let session = ChatSession::new(
///     backend,
///     Arc::new(StaticTokenProvider::new("token")),
///     RealtimeConfig::default(),
/// );
/// session.connect("alice").await?;
/// session.switch_to("general").await?;
/// session.send("hello", None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChatSession {
    backend: Arc<dyn RealtimeBackend>,
    connection: ConnectionManager,
    channels: ChannelSessionManager,
    sender: Sender,
    history: HistoryFetcher,
    reactions: ReactionManager,
    handlers: Arc<HandlerSlot>,
    presence: Arc<PresenceSet>,
    typing: Arc<TypingSet>,
}

impl ChatSession {
    /// Creates a disconnected session.
    pub fn new(
        backend: Arc<dyn RealtimeBackend>,
        tokens: Arc<dyn TokenProvider>,
        config: RealtimeConfig,
    ) -> Self {
        let handlers = Arc::new(HandlerSlot::new());
        let dedup = Arc::new(MessageDeduplicator::new());
        let presence = Arc::new(PresenceSet::new());
        let typing = Arc::new(TypingSet::new());

        let connection = ConnectionManager::new(backend.clone(), tokens, config.clone());
        let multiplexer = SubscriptionMultiplexer::new(
            backend.clone(),
            handlers.clone(),
            dedup.clone(),
            presence.clone(),
            typing.clone(),
        );
        let channels = ChannelSessionManager::new(
            backend.clone(),
            connection.subscribe_state(),
            multiplexer,
            dedup,
            presence.clone(),
            typing.clone(),
            config.clone(),
        );

        Self {
            sender: Sender::new(backend.clone(), config),
            history: HistoryFetcher::new(backend.clone()),
            reactions: ReactionManager::new(backend.clone()),
            backend,
            connection,
            channels,
            handlers,
            presence,
            typing,
        }
    }

    /// Sets the display name and avatar stamped into sent messages.
    ///
    /// The profile's user id must match the id later passed to
    /// [`connect`](Self::connect); otherwise a plain profile for the
    /// connecting user replaces it.
    pub fn with_profile(self, profile: SenderProfile) -> Self {
        self.sender.set_profile(profile);
        self
    }

    /// Connects as `user_id` and waits until the connection is usable.
    pub async fn connect(&self, user_id: &str) -> AppResult<()> {
        self.connection.connect(user_id).await?;

        if self
            .sender
            .profile()
            .is_none_or(|profile| profile.user_id != user_id)
        {
            self.sender.set_profile(SenderProfile::new(user_id));
        }
        Ok(())
    }

    /// Makes `name` the active channel. See
    /// [`ChannelSessionManager::switch_to`].
    pub fn switch_to<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Future<Output = AppResult<SwitchOutcome>> + Send + 'a {
        self.channels.switch_to(name)
    }

    /// Sends a message to the active channel.
    ///
    /// Fails with a not-ready error before the channel is ready. Delivery
    /// failures yield `Ok(false)`.
    pub async fn send(&self, content: &str, metadata: Option<MessageMetadata>) -> AppResult<bool> {
        let channel = self.channels.active()?;
        self.sender.send(&channel, content, metadata).await
    }

    /// Signals that this client started or stopped typing.
    pub async fn send_typing(&self, is_typing: bool) -> AppResult<()> {
        let channel = self.channels.active()?;
        self.backend
            .send_typing(channel.name(), is_typing)
            .await
            .map_err(AppError::from)
    }

    /// Up to `limit` past messages of the active channel, newest first.
    pub async fn fetch_history(&self, limit: usize) -> AppResult<Vec<Message>> {
        let channel = self.channels.active().ok();
        self.history.fetch(channel.as_ref(), limit).await
    }

    pub async fn send_room_reaction(&self, name: &str) -> bool {
        let channel = self.channels.active().ok();
        self.reactions.send_room_reaction(channel.as_ref(), name).await
    }

    pub async fn send_message_reaction(&self, identity: &str, name: &str) -> bool {
        let channel = self.channels.active().ok();
        self.reactions
            .send_message_reaction(channel.as_ref(), identity, name)
            .await
    }

    pub async fn delete_message_reaction(&self, identity: &str, name: &str) -> bool {
        let channel = self.channels.active().ok();
        self.reactions
            .delete_message_reaction(channel.as_ref(), identity, name)
            .await
    }

    /// Client ids present on the active channel, sorted.
    pub fn presence_members(&self) -> Vec<String> {
        self.presence.client_ids()
    }

    /// Present members with their presence data.
    pub fn presence_details(&self) -> Vec<PresenceMember> {
        self.presence.members()
    }

    /// Client ids currently typing on the active channel.
    pub fn typing_members(&self) -> HashSet<String> {
        self.typing.snapshot()
    }

    pub fn current_channel(&self) -> Option<ChannelSession> {
        self.channels.current()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Replaces the event handlers. Takes effect for the next event on
    /// every stream without re-subscribing.
    pub fn set_handlers(&self, handlers: Arc<dyn SessionEvents>) {
        self.handlers.set(handlers);
    }

    pub fn on_connection_state_change(
        &self,
        handler: impl Fn(&ConnectionStateChange) + Send + Sync + 'static,
    ) {
        self.connection.on_state_change(handler);
    }

    /// Releases the active channel and closes the connection.
    pub async fn close(&self) {
        if let Err(e) = self.channels.release().await {
            warn!(error = %e, "Releasing channel on close failed");
        }
        self.connection.close().await;
        info!(client_id = ?self.connection.client_id(), "Session closed");
    }
}
