//! Subscription multiplexer: fans the four channel streams out to handlers.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use huddle_core::error::AppError;
use huddle_core::events::{ChannelEvent, StreamKind};
use huddle_core::result::AppResult;
use huddle_core::traits::RealtimeBackend;
use huddle_core::types::{PresenceChange, SubscriptionId};

use crate::message::dedup::MessageDeduplicator;
use crate::message::normalize;
use crate::presence::{PresenceSet, TypingSet};

use super::handlers::HandlerSlot;

/// Attaches one listener per stream and forwards normalized events.
#[derive(Debug, Clone)]
pub struct SubscriptionMultiplexer {
    backend: Arc<dyn RealtimeBackend>,
    handlers: Arc<HandlerSlot>,
    dedup: Arc<MessageDeduplicator>,
    presence: Arc<PresenceSet>,
    typing: Arc<TypingSet>,
}

impl SubscriptionMultiplexer {
    /// Creates a multiplexer sharing state with the session.
    pub fn new(
        backend: Arc<dyn RealtimeBackend>,
        handlers: Arc<HandlerSlot>,
        dedup: Arc<MessageDeduplicator>,
        presence: Arc<PresenceSet>,
        typing: Arc<TypingSet>,
    ) -> Self {
        Self {
            backend,
            handlers,
            dedup,
            presence,
            typing,
        }
    }

    /// Subscribes all four streams of `channel`.
    ///
    /// Either every stream is subscribed or none is: if the backend rejects
    /// any stream, the receivers already obtained are dropped and no
    /// listener task is started.
    pub async fn subscribe_all(&self, channel: &str) -> AppResult<SubscriptionHandle> {
        let results = join_all(
            StreamKind::ALL
                .iter()
                .map(|kind| self.backend.subscribe(channel, *kind)),
        )
        .await;

        let mut receivers = Vec::with_capacity(results.len());
        for (kind, result) in StreamKind::ALL.iter().zip(results) {
            let rx = result.map_err(|e| {
                AppError::channel_switch(format!(
                    "Failed to subscribe {} stream on '{channel}': {e}",
                    kind.as_str()
                ))
            })?;
            receivers.push((*kind, rx));
        }

        let id = SubscriptionId::new();
        let cancel = CancellationToken::new();
        let listener = Arc::new(StreamListener {
            channel: channel.to_string(),
            handlers: self.handlers.clone(),
            dedup: self.dedup.clone(),
            presence: self.presence.clone(),
            typing: self.typing.clone(),
        });

        let tasks = receivers
            .into_iter()
            .map(|(kind, rx)| tokio::spawn(listener.clone().run(kind, rx, cancel.child_token())))
            .collect();

        debug!(channel = %channel, subscription_id = %id, "Subscribed all channel streams");

        Ok(SubscriptionHandle {
            id,
            channel: channel.to_string(),
            cancel,
            tasks: Mutex::new(tasks),
        })
    }
}

/// Owns the listener tasks of one `subscribe_all` call.
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    channel: String,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    /// Subscription id.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Channel the streams belong to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Whether the listeners are still running.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Stops every listener. Safe to call any number of times; returns
    /// `true` only for the call that actually unsubscribed.
    pub fn unsubscribe_all(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            task.abort();
        }

        debug!(channel = %self.channel, subscription_id = %self.id, "Unsubscribed all channel streams");
        true
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

/// Per-subscription state shared by the four listener tasks.
struct StreamListener {
    channel: String,
    handlers: Arc<HandlerSlot>,
    dedup: Arc<MessageDeduplicator>,
    presence: Arc<PresenceSet>,
    typing: Arc<TypingSet>,
}

impl StreamListener {
    async fn run(
        self: Arc<Self>,
        kind: StreamKind,
        mut rx: broadcast::Receiver<ChannelEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(event) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        self.dispatch(event, &cancel);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            channel = %self.channel,
                            stream = kind.as_str(),
                            skipped,
                            "Listener lagged, events dropped"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        trace!(channel = %self.channel, stream = kind.as_str(), "Listener stopped");
    }

    /// Applies one event to the shared session state and forwards it.
    ///
    /// Nothing is recorded once `cancel` fired, so a release that already
    /// cleared dedup and presence state is not repopulated.
    fn dispatch(&self, event: ChannelEvent, cancel: &CancellationToken) {
        let handlers = self.handlers.get();

        match event {
            ChannelEvent::Message(raw) => {
                let message = normalize::normalize_message(&raw);
                if cancel.is_cancelled() {
                    return;
                }
                if let Some(identity) = message.identity() {
                    if !self.dedup.check_and_mark(&self.channel, identity) {
                        trace!(channel = %self.channel, identity, "Duplicate message dropped");
                        return;
                    }
                }
                handlers.on_message(&self.channel, &message);
            }
            ChannelEvent::Presence(raw) => {
                let member = normalize::normalize_presence(&raw);
                if cancel.is_cancelled() {
                    return;
                }
                self.presence.apply(member.clone());
                let change = PresenceChange {
                    member,
                    members: self.presence.client_ids(),
                };
                handlers.on_presence_change(&self.channel, &change);
            }
            ChannelEvent::Typing(raw) => {
                let typing = normalize::normalize_typing(&raw);
                if cancel.is_cancelled() {
                    return;
                }
                self.typing.replace(typing.clone());
                handlers.on_typing_change(&self.channel, &typing);
            }
            ChannelEvent::RoomReaction(raw) => {
                handlers.on_room_reaction(&self.channel, &normalize::normalize_room_reaction(&raw));
            }
            ChannelEvent::MessageReaction(raw) => {
                handlers.on_message_reaction(
                    &self.channel,
                    &normalize::normalize_message_reaction(&raw),
                );
            }
        }
    }
}
