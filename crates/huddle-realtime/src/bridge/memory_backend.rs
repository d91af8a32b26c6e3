//! [`RealtimeBackend`] implementation on top of a [`MemoryHub`].
//!
//! One `MemoryBackend` is one client connection. Besides serving the demo
//! binary, it exposes fault injection and call counters so the session core
//! can be exercised without a network.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use huddle_core::events::{ChannelEvent, RawMessage, StreamKind};
use huddle_core::traits::{BackendError, HistoryQuery, RealtimeBackend, TokenProvider};
use huddle_core::types::{ChannelStatus, ConnectionState, OutboundPayload, PresenceMember};

use super::memory_hub::MemoryHub;

/// Injected failures. All knobs are one-shot counters or per-channel flags.
#[derive(Debug, Default)]
pub struct Faults {
    /// Next N publishes fail with the rate-limit code.
    rate_limited_publishes: AtomicU32,
    /// Next N publishes fail with a generic error.
    failed_publishes: AtomicU32,
    /// Next N connects fail.
    failed_connects: AtomicU32,
    /// Connect leaves the state at `connecting`.
    hold_connect: AtomicBool,
    /// Connect ends in `failed`.
    reject_connect: AtomicBool,
    /// Channels whose attach fails.
    attach_failures: Mutex<HashSet<String>>,
    /// Channels whose presence enter fails.
    presence_failures: Mutex<HashSet<String>>,
    /// Next N reaction calls fail.
    failed_reactions: AtomicU32,
    /// Detach sleeps this long before completing.
    detach_delay_ms: AtomicU64,
}

impl Faults {
    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn contains(set: &Mutex<HashSet<String>>, channel: &str) -> bool {
        set.lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(channel)
    }

    /// Make the next `n` publishes fail with the rate-limit code.
    pub fn rate_limit_publishes(&self, n: u32) {
        self.rate_limited_publishes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` publishes fail with a generic error.
    pub fn fail_publishes(&self, n: u32) {
        self.failed_publishes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` connects fail.
    pub fn fail_connects(&self, n: u32) {
        self.failed_connects.store(n, Ordering::SeqCst);
    }

    /// Keep connect stuck in `connecting`.
    pub fn hold_connect(&self, hold: bool) {
        self.hold_connect.store(hold, Ordering::SeqCst);
    }

    /// Make connect end in the terminal `failed` state.
    pub fn reject_connect(&self, reject: bool) {
        self.reject_connect.store(reject, Ordering::SeqCst);
    }

    /// Make attach fail for `channel`.
    pub fn fail_attach(&self, channel: &str) {
        self.attach_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel.to_string());
    }

    /// Make presence enter fail for `channel`.
    pub fn fail_presence_enter(&self, channel: &str) {
        self.presence_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel.to_string());
    }

    /// Make the next `n` reaction calls fail.
    pub fn fail_reactions(&self, n: u32) {
        self.failed_reactions.store(n, Ordering::SeqCst);
    }

    /// Make every detach take `delay` to complete.
    pub fn delay_detach(&self, delay: Duration) {
        self.detach_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

/// Per-backend call counters.
#[derive(Debug, Default)]
struct Counters {
    connects: AtomicU64,
    publishes: AtomicU64,
    reactions: AtomicU64,
    /// Channel → attach calls
    attaches: DashMap<String, u64>,
}

/// One client's connection to a [`MemoryHub`].
#[derive(Debug)]
pub struct MemoryBackend {
    hub: MemoryHub,
    client_id: Mutex<Option<String>>,
    tokens: Mutex<Option<Arc<dyn TokenProvider>>>,
    state_tx: watch::Sender<ConnectionState>,
    channels: DashMap<String, ChannelStatus>,
    faults: Faults,
    counters: Counters,
}

impl MemoryBackend {
    /// Create a backend on `hub` in the `initialized` state.
    pub fn new(hub: MemoryHub) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Initialized);
        Self {
            hub,
            client_id: Mutex::new(None),
            tokens: Mutex::new(None),
            state_tx,
            channels: DashMap::new(),
            faults: Faults::default(),
            counters: Counters::default(),
        }
    }

    /// Fault injection knobs.
    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// The hub this backend talks to.
    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }

    /// Force a connection state, as the transport would on network changes.
    pub fn simulate_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Expire the current token: the backend re-fetches one from the provider
    /// it was given at connect, and fails the connection if that is refused.
    pub async fn simulate_token_expiry(&self) {
        let provider = self.tokens.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let Ok(client_id) = self.client_id() else {
            return;
        };
        let Some(provider) = provider else {
            return;
        };
        match provider.fetch_token(&client_id).await {
            Ok(_) => debug!(client_id = %client_id, "Token renewed"),
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Token renewal refused");
                self.state_tx.send_replace(ConnectionState::Failed);
            }
        }
    }

    /// Mark a channel detached without a detach call, as after a server-side detach.
    pub fn simulate_channel_detached(&self, channel: &str) {
        self.channels
            .insert(channel.to_string(), ChannelStatus::Detached);
    }

    /// Connect calls made, successful or not.
    pub fn connect_calls(&self) -> u64 {
        self.counters.connects.load(Ordering::SeqCst)
    }

    /// Publish attempts that reached the backend, successful or not.
    pub fn publish_calls(&self) -> u64 {
        self.counters.publishes.load(Ordering::SeqCst)
    }

    /// Reaction calls that reached the backend, successful or not.
    pub fn reaction_calls(&self) -> u64 {
        self.counters.reactions.load(Ordering::SeqCst)
    }

    /// Attach calls for `channel`.
    pub fn attach_calls(&self, channel: &str) -> u64 {
        self.counters
            .attaches
            .get(channel)
            .map(|r| *r.value())
            .unwrap_or(0)
    }

    /// Channels currently attached.
    pub fn attached_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .iter()
            .filter(|r| *r.value() == ChannelStatus::Attached)
            .map(|r| r.key().clone())
            .collect();
        names.sort();
        names
    }

    fn client_id(&self) -> Result<String, BackendError> {
        self.client_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| {
                BackendError::new(BackendError::CONNECTION_UNAVAILABLE, "Not connected")
            })
    }

    fn require_connected(&self) -> Result<String, BackendError> {
        if !self.state_tx.borrow().is_connected() {
            return Err(BackendError::new(
                BackendError::CONNECTION_UNAVAILABLE,
                format!("Connection is {}", *self.state_tx.borrow()),
            ));
        }
        self.client_id()
    }

    fn require_attached(&self, channel: &str) -> Result<String, BackendError> {
        let client_id = self.require_connected()?;
        if self.channel_status(channel) != ChannelStatus::Attached {
            return Err(BackendError::new(
                BackendError::CHANNEL_NOT_ATTACHED,
                format!("Channel '{channel}' is not attached"),
            ));
        }
        Ok(client_id)
    }

    fn reaction_call(&self, channel: &str) -> Result<String, BackendError> {
        self.counters.reactions.fetch_add(1, Ordering::SeqCst);
        let client_id = self.require_attached(channel)?;
        if Faults::take(&self.faults.failed_reactions) {
            return Err(BackendError::new(BackendError::INTERNAL, "Injected reaction failure"));
        }
        Ok(client_id)
    }
}

#[async_trait]
impl RealtimeBackend for MemoryBackend {
    async fn connect(
        &self,
        client_id: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<(), BackendError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Connecting);

        if Faults::take(&self.faults.failed_connects) {
            self.state_tx.send_replace(ConnectionState::Disconnected);
            return Err(BackendError::new(
                BackendError::CONNECTION_UNAVAILABLE,
                "Injected connect failure",
            ));
        }

        if let Err(e) = tokens.fetch_token(client_id).await {
            self.state_tx.send_replace(ConnectionState::Failed);
            return Err(BackendError::new(BackendError::UNAUTHORIZED, e.message));
        }

        *self.client_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(client_id.to_string());
        *self.tokens.lock().unwrap_or_else(|e| e.into_inner()) = Some(tokens);

        if self.faults.reject_connect.load(Ordering::SeqCst) {
            self.state_tx.send_replace(ConnectionState::Failed);
        } else if !self.faults.hold_connect.load(Ordering::SeqCst) {
            self.state_tx.send_replace(ConnectionState::Connected);
            info!(client_id = %client_id, "Memory backend connected");
        }
        Ok(())
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    async fn close(&self) {
        let attached: Vec<String> = self.channels.iter().map(|r| r.key().clone()).collect();
        if let Ok(client_id) = self.client_id() {
            for channel in &attached {
                self.hub.presence_leave(channel, &client_id);
                self.hub.set_typing(channel, &client_id, false);
            }
        }
        self.channels.clear();
        self.state_tx.send_replace(ConnectionState::Disconnected);
        debug!("Memory backend closed");
    }

    async fn attach(&self, channel: &str) -> Result<(), BackendError> {
        *self
            .counters
            .attaches
            .entry(channel.to_string())
            .or_insert(0) += 1;
        self.require_connected()?;

        if Faults::contains(&self.faults.attach_failures, channel) {
            self.channels
                .insert(channel.to_string(), ChannelStatus::Detached);
            return Err(BackendError::new(
                BackendError::INTERNAL,
                format!("Injected attach failure for '{channel}'"),
            ));
        }

        self.channels
            .insert(channel.to_string(), ChannelStatus::Attached);
        Ok(())
    }

    async fn detach(&self, channel: &str) -> Result<(), BackendError> {
        let delay = self.faults.detach_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if let Ok(client_id) = self.client_id() {
            self.hub.presence_leave(channel, &client_id);
            self.hub.set_typing(channel, &client_id, false);
        }
        self.channels.remove(channel);
        Ok(())
    }

    fn channel_status(&self, channel: &str) -> ChannelStatus {
        self.channels
            .get(channel)
            .map(|r| *r.value())
            .unwrap_or(ChannelStatus::Detached)
    }

    async fn subscribe(
        &self,
        channel: &str,
        stream: StreamKind,
    ) -> Result<broadcast::Receiver<ChannelEvent>, BackendError> {
        self.require_attached(channel)?;
        Ok(self.hub.subscribe(channel, stream))
    }

    async fn publish(&self, channel: &str, payload: &OutboundPayload) -> Result<(), BackendError> {
        self.counters.publishes.fetch_add(1, Ordering::SeqCst);
        let client_id = self.require_attached(channel)?;

        if Faults::take(&self.faults.rate_limited_publishes) {
            return Err(BackendError::rate_limited("Rate limit exceeded; request rejected"));
        }
        if Faults::take(&self.faults.failed_publishes) {
            return Err(BackendError::new(BackendError::INTERNAL, "Injected publish failure"));
        }

        let data = serde_json::to_value(payload)
            .map_err(|e| BackendError::new(BackendError::INTERNAL, e.to_string()))?;
        self.hub.publish(channel, &client_id, data);
        Ok(())
    }

    async fn presence_enter(
        &self,
        channel: &str,
        data: Option<serde_json::Value>,
    ) -> Result<(), BackendError> {
        let client_id = self.require_attached(channel)?;
        if Faults::contains(&self.faults.presence_failures, channel) {
            return Err(BackendError::new(
                BackendError::INTERNAL,
                format!("Injected presence failure for '{channel}'"),
            ));
        }
        self.hub.presence_enter(channel, &client_id, data);
        Ok(())
    }

    async fn presence_leave(&self, channel: &str) -> Result<(), BackendError> {
        let client_id = self.require_connected()?;
        self.hub.presence_leave(channel, &client_id);
        Ok(())
    }

    async fn presence_members(&self, channel: &str) -> Result<Vec<PresenceMember>, BackendError> {
        self.require_attached(channel)?;
        Ok(self.hub.presence_members(channel))
    }

    async fn send_typing(&self, channel: &str, is_typing: bool) -> Result<(), BackendError> {
        let client_id = self.require_attached(channel)?;
        self.hub.set_typing(channel, &client_id, is_typing);
        Ok(())
    }

    async fn history(
        &self,
        channel: &str,
        query: HistoryQuery,
    ) -> Result<Vec<RawMessage>, BackendError> {
        self.require_connected()?;
        let mut messages = self.hub.history(channel);
        if query.newest_first {
            messages.reverse();
        }
        messages.truncate(query.limit);
        Ok(messages)
    }

    async fn send_room_reaction(&self, channel: &str, name: &str) -> Result<(), BackendError> {
        let client_id = self.reaction_call(channel)?;
        self.hub.room_reaction(channel, &client_id, name);
        Ok(())
    }

    async fn send_message_reaction(
        &self,
        channel: &str,
        message_identity: &str,
        name: &str,
    ) -> Result<(), BackendError> {
        let client_id = self.reaction_call(channel)?;
        self.hub
            .message_reaction(channel, &client_id, message_identity, name, true);
        Ok(())
    }

    async fn delete_message_reaction(
        &self,
        channel: &str,
        message_identity: &str,
        name: &str,
    ) -> Result<(), BackendError> {
        let client_id = self.reaction_call(channel)?;
        self.hub
            .message_reaction(channel, &client_id, message_identity, name, false);
        Ok(())
    }
}
