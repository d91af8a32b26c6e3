//! Active channel state machine.
//!
//! At most one channel is active per session. A switch releases the previous
//! channel completely (streams, presence, attachment, dedup state) before the
//! next one is attached, and the session is only reported ready once the new
//! channel is attached, subscribed and entered.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle_core::config::RealtimeConfig;
use huddle_core::error::{AppError, ErrorKind};
use huddle_core::result::AppResult;
use huddle_core::traits::RealtimeBackend;
use huddle_core::types::{ChannelSession, ChannelStatus, ConnectionState};

use crate::message::dedup::MessageDeduplicator;
use crate::message::validator;
use crate::presence::{PresenceSet, TypingSet};

use super::multiplexer::{SubscriptionHandle, SubscriptionMultiplexer};

/// Result of a successful `switch_to` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The channel is attached, subscribed and ready.
    Ready,
    /// The channel was already active and ready; nothing was done.
    AlreadyActive,
    /// A newer switch was issued before this one finished.
    Superseded,
}

/// Reference to the ready channel, handed to senders and fetchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveChannel {
    name: String,
}

impl ActiveChannel {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The channel currently owned by the session.
struct AttachedChannel {
    name: String,
    subscription: SubscriptionHandle,
}

/// Owns the session's single active channel.
pub struct ChannelSessionManager {
    backend: Arc<dyn RealtimeBackend>,
    connection: watch::Receiver<ConnectionState>,
    multiplexer: SubscriptionMultiplexer,
    dedup: Arc<MessageDeduplicator>,
    presence: Arc<PresenceSet>,
    typing: Arc<TypingSet>,
    config: RealtimeConfig,
    /// Set once the first switch has been issued; later switches are debounced.
    has_switched: AtomicBool,
    /// Token of the most recently issued switch.
    pending: Mutex<Option<CancellationToken>>,
    /// Serializes switches and releases.
    attached: tokio::sync::Mutex<Option<AttachedChannel>>,
    snapshot: RwLock<Option<ChannelSession>>,
}

impl std::fmt::Debug for ChannelSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSessionManager")
            .field("current", &self.current())
            .finish()
    }
}

impl ChannelSessionManager {
    /// Creates a manager with no active channel.
    pub fn new(
        backend: Arc<dyn RealtimeBackend>,
        connection: watch::Receiver<ConnectionState>,
        multiplexer: SubscriptionMultiplexer,
        dedup: Arc<MessageDeduplicator>,
        presence: Arc<PresenceSet>,
        typing: Arc<TypingSet>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            backend,
            connection,
            multiplexer,
            dedup,
            presence,
            typing,
            config,
            has_switched: AtomicBool::new(false),
            pending: Mutex::new(None),
            attached: tokio::sync::Mutex::new(None),
            snapshot: RwLock::new(None),
        }
    }

    /// Makes `name` the active channel.
    ///
    /// The switch is registered when this method is called, not when the
    /// returned future is first polled, so the most recent call always wins
    /// regardless of how the futures are scheduled. Every switch after the
    /// first waits for the debounce delay; a newer call during that window
    /// or during the attach sequence resolves this one as
    /// [`SwitchOutcome::Superseded`].
    pub fn switch_to<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Future<Output = AppResult<SwitchOutcome>> + Send + 'a {
        let registered = validator::validate_channel_name(name, self.config.max_channel_name_bytes)
            .map(|()| self.register_switch());

        async move {
            let (token, debounce) = registered?;
            self.ensure_connected()?;

            if self
                .current()
                .is_some_and(|session| session.name == name && session.ready)
            {
                debug!(channel = %name, "Channel already active");
                return Ok(SwitchOutcome::AlreadyActive);
            }

            if debounce {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(channel = %name, "Switch superseded during debounce");
                        return Ok(SwitchOutcome::Superseded);
                    }
                    _ = tokio::time::sleep(self.config.switch_debounce()) => {}
                }
            }

            let mut attached = self.attached.lock().await;
            if token.is_cancelled() {
                debug!(channel = %name, "Switch superseded before attach");
                return Ok(SwitchOutcome::Superseded);
            }

            if let Some(previous) = attached.take() {
                if previous.name == name && self.current().is_some_and(|s| s.ready) {
                    *attached = Some(previous);
                    return Ok(SwitchOutcome::AlreadyActive);
                }
                self.release_channel(previous).await;
                if token.is_cancelled() {
                    debug!(channel = %name, "Switch superseded while releasing previous channel");
                    self.set_snapshot(None);
                    return Ok(SwitchOutcome::Superseded);
                }
            }

            self.set_snapshot(Some(ChannelSession {
                name: name.to_string(),
                status: ChannelStatus::Attaching,
                ready: false,
            }));

            match self.establish(name, &token).await {
                Ok(Some(subscription)) => {
                    *attached = Some(AttachedChannel {
                        name: name.to_string(),
                        subscription,
                    });
                    self.set_snapshot(Some(ChannelSession {
                        name: name.to_string(),
                        status: ChannelStatus::Attached,
                        ready: true,
                    }));
                    info!(channel = %name, members = self.presence.len(), "Channel ready");
                    Ok(SwitchOutcome::Ready)
                }
                Ok(None) => {
                    self.set_snapshot(None);
                    debug!(channel = %name, "Switch superseded, attach rolled back");
                    Ok(SwitchOutcome::Superseded)
                }
                Err(e) => {
                    self.set_snapshot(Some(ChannelSession {
                        name: name.to_string(),
                        status: ChannelStatus::Detached,
                        ready: false,
                    }));
                    warn!(channel = %name, error = %e, "Channel switch failed");
                    Err(e)
                }
            }
        }
    }

    /// Snapshot of the active channel session, ready or not.
    pub fn current(&self) -> Option<ChannelSession> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The ready channel, or a not-ready error.
    pub fn active(&self) -> AppResult<ActiveChannel> {
        match self.current() {
            Some(session) if session.ready => Ok(ActiveChannel::new(session.name)),
            Some(session) => Err(AppError::not_ready(format!(
                "Channel '{}' is {}",
                session.name, session.status
            ))),
            None => Err(AppError::not_ready("No active channel")),
        }
    }

    /// Cancels any in-flight switch and releases the active channel.
    pub async fn release(&self) -> AppResult<()> {
        if let Some(token) = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
        }

        let mut attached = self.attached.lock().await;
        if let Some(previous) = attached.take() {
            self.release_channel(previous).await;
        }
        self.set_snapshot(None);
        Ok(())
    }

    fn register_switch(&self) -> (CancellationToken, bool) {
        let token = CancellationToken::new();
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        let debounce = self.has_switched.swap(true, Ordering::SeqCst);
        (token, debounce)
    }

    fn ensure_connected(&self) -> AppResult<()> {
        let state = *self.connection.borrow();
        if state.is_connected() {
            Ok(())
        } else {
            Err(AppError::not_ready(format!(
                "Cannot switch channels while connection is {state}"
            )))
        }
    }

    /// Attach, subscribe, enter presence and load members.
    ///
    /// Returns `Ok(None)` when `token` was cancelled part way; anything
    /// already set up is rolled back first.
    async fn establish(
        &self,
        name: &str,
        token: &CancellationToken,
    ) -> AppResult<Option<SubscriptionHandle>> {
        if token.is_cancelled() {
            return Ok(None);
        }

        self.backend.attach(name).await.map_err(|e| {
            AppError::with_source(ErrorKind::ChannelSwitch, format!("Failed to attach '{name}'"), e)
        })?;
        if token.is_cancelled() {
            self.rollback(name, None).await;
            return Ok(None);
        }

        let subscription = match self.multiplexer.subscribe_all(name).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.rollback(name, None).await;
                return Err(e);
            }
        };
        if token.is_cancelled() {
            self.rollback(name, Some(subscription)).await;
            return Ok(None);
        }

        if let Err(e) = self.backend.presence_enter(name, None).await {
            self.rollback(name, Some(subscription)).await;
            return Err(AppError::channel_switch(format!(
                "Failed to enter presence on '{name}': {e}"
            )));
        }
        if token.is_cancelled() {
            self.rollback(name, Some(subscription)).await;
            return Ok(None);
        }

        match self.backend.presence_members(name).await {
            Ok(members) => self.presence.reset(members),
            Err(e) => {
                self.rollback(name, Some(subscription)).await;
                return Err(AppError::channel_switch(format!(
                    "Failed to load presence members on '{name}': {e}"
                )));
            }
        }

        Ok(Some(subscription))
    }

    async fn rollback(&self, name: &str, subscription: Option<SubscriptionHandle>) {
        if let Some(subscription) = subscription {
            subscription.unsubscribe_all();
            if let Err(e) = self.backend.presence_leave(name).await {
                debug!(channel = %name, error = %e, "Presence leave during rollback failed");
            }
        }
        if let Err(e) = self.backend.detach(name).await {
            warn!(channel = %name, error = %e, "Detach during rollback failed");
        }
        self.clear_channel_state(name);
    }

    async fn release_channel(&self, channel: AttachedChannel) {
        self.set_snapshot(Some(ChannelSession {
            name: channel.name.clone(),
            status: ChannelStatus::Releasing,
            ready: false,
        }));

        channel.subscription.unsubscribe_all();
        if let Err(e) = self.backend.presence_leave(&channel.name).await {
            debug!(channel = %channel.name, error = %e, "Presence leave failed");
        }
        if let Err(e) = self.backend.detach(&channel.name).await {
            warn!(channel = %channel.name, error = %e, "Detach failed");
        }
        self.clear_channel_state(&channel.name);
        self.set_snapshot(None);

        info!(channel = %channel.name, "Channel released");
    }

    fn clear_channel_state(&self, name: &str) {
        self.dedup.clear(name);
        self.presence.clear();
        self.typing.clear();
    }

    fn set_snapshot(&self, session: Option<ChannelSession>) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = session;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use huddle_core::traits::StaticTokenProvider;

    use crate::bridge::{MemoryBackend, MemoryHub};
    use crate::channel::handlers::HandlerSlot;

    struct Fixture {
        hub: MemoryHub,
        backend: Arc<MemoryBackend>,
        manager: Arc<ChannelSessionManager>,
        dedup: Arc<MessageDeduplicator>,
    }

    async fn fixture(connect: bool) -> Fixture {
        let hub = MemoryHub::new();
        let backend = Arc::new(MemoryBackend::new(hub.clone()));
        if connect {
            backend
                .connect("alice", Arc::new(StaticTokenProvider::new("t")))
                .await
                .unwrap();
        }

        let dedup = Arc::new(MessageDeduplicator::new());
        let presence = Arc::new(PresenceSet::new());
        let typing = Arc::new(TypingSet::new());
        let multiplexer = SubscriptionMultiplexer::new(
            backend.clone(),
            Arc::new(HandlerSlot::new()),
            dedup.clone(),
            presence.clone(),
            typing.clone(),
        );
        let manager = Arc::new(ChannelSessionManager::new(
            backend.clone(),
            backend.connection_state(),
            multiplexer,
            dedup.clone(),
            presence,
            typing,
            RealtimeConfig::default(),
        ));
        Fixture {
            hub,
            backend,
            manager,
            dedup,
        }
    }

    #[tokio::test]
    async fn test_switch_makes_channel_ready() {
        let f = fixture(true).await;
        assert!(f.manager.active().unwrap_err().is(ErrorKind::NotReady));

        let outcome = f.manager.switch_to("general").await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Ready);
        assert_eq!(f.manager.active().unwrap().name(), "general");
        assert_eq!(f.backend.attached_channels(), vec!["general"]);
        assert_eq!(f.hub.presence_members("general").len(), 1);

        let again = f.manager.switch_to("general").await.unwrap();
        assert_eq!(again, SwitchOutcome::AlreadyActive);
        assert_eq!(f.backend.attach_calls("general"), 1);
    }

    #[tokio::test]
    async fn test_switch_before_connect_is_not_ready() {
        let f = fixture(false).await;
        let err = f.manager.switch_to("general").await.unwrap_err();
        assert!(err.is(ErrorKind::NotReady));
        assert_eq!(f.backend.attach_calls("general"), 0);
    }

    #[tokio::test]
    async fn test_invalid_channel_name() {
        let f = fixture(true).await;
        let err = f.manager.switch_to("   ").await.unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_releases_previous_channel() {
        let f = fixture(true).await;
        f.manager.switch_to("room-a").await.unwrap();
        f.dedup.mark_seen("room-a", "m1");

        let outcome = f.manager.switch_to("room-b").await.unwrap();
        assert_eq!(outcome, SwitchOutcome::Ready);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(f.backend.attached_channels(), vec!["room-b"]);
        assert!(f.hub.presence_members("room-a").is_empty());
        assert_eq!(f.hub.receiver_count("room-a"), 0);
        assert!(f.dedup.is_empty("room-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_switch_wins() {
        let f = fixture(true).await;
        f.manager.switch_to("lobby").await.unwrap();

        let (a, b, c) = tokio::join!(
            f.manager.switch_to("room-a"),
            f.manager.switch_to("room-b"),
            f.manager.switch_to("room-c"),
        );
        assert_eq!(a.unwrap(), SwitchOutcome::Superseded);
        assert_eq!(b.unwrap(), SwitchOutcome::Superseded);
        assert_eq!(c.unwrap(), SwitchOutcome::Ready);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(f.backend.attached_channels(), vec!["room-c"]);
        assert_eq!(f.backend.attach_calls("room-a"), 0);
        assert_eq!(f.backend.attach_calls("room-b"), 0);
        assert_eq!(f.hub.receiver_count("lobby"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_superseded_during_release_never_attaches() {
        let f = fixture(true).await;
        f.manager.switch_to("lobby").await.unwrap();
        f.backend.faults().delay_detach(Duration::from_millis(200));

        // room-b debounces until 100ms, then holds the switch lock while
        // lobby detaches until 300ms; room-c lands at 150ms
        let (b, c) = tokio::join!(f.manager.switch_to("room-b"), async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            f.manager.switch_to("room-c").await
        });
        assert_eq!(b.unwrap(), SwitchOutcome::Superseded);
        assert_eq!(c.unwrap(), SwitchOutcome::Ready);

        assert_eq!(f.backend.attach_calls("room-b"), 0);
        assert_eq!(f.backend.attached_channels(), vec!["room-c"]);
        assert_eq!(f.manager.active().unwrap().name(), "room-c");
    }

    #[tokio::test]
    async fn test_attach_failure_leaves_session_not_ready() {
        let f = fixture(true).await;
        f.backend.faults().fail_attach("broken");

        let err = f.manager.switch_to("broken").await.unwrap_err();
        assert!(err.is(ErrorKind::ChannelSwitch));
        let session = f.manager.current().unwrap();
        assert!(!session.ready);
        assert!(f.manager.active().is_err());
        assert_eq!(f.backend.attach_calls("broken"), 1);
    }

    #[tokio::test]
    async fn test_presence_failure_rolls_back_subscription() {
        let f = fixture(true).await;
        f.backend.faults().fail_presence_enter("quiet");

        let err = f.manager.switch_to("quiet").await.unwrap_err();
        assert!(err.is(ErrorKind::ChannelSwitch));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(f.backend.attached_channels().is_empty());
        assert_eq!(f.hub.receiver_count("quiet"), 0);
    }

    #[tokio::test]
    async fn test_release_clears_active_channel() {
        let f = fixture(true).await;
        f.manager.switch_to("general").await.unwrap();
        f.manager.release().await.unwrap();
        assert!(f.manager.current().is_none());
        assert!(f.backend.attached_channels().is_empty());
    }
}
