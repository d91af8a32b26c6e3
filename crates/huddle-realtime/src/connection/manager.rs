//! Owns the single backend connection and republishes
//! its state.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle_core::config::RealtimeConfig;
use huddle_core::error::{AppError, ErrorKind};
use huddle_core::result::AppResult;
use huddle_core::traits::{RealtimeBackend, TokenProvider};
use huddle_core::types::{ConnectionState, ConnectionStateChange};

use super::supervisor;

/// Callback invoked on every republished state transition.
pub type StateChangeHandler = Arc<dyn Fn(&ConnectionStateChange) + Send + Sync>;

/// State shared between the manager and its supervisor task.
pub(crate) struct Shared {
    pub(crate) backend: Arc<dyn RealtimeBackend>,
    pub(crate) tokens: Arc<dyn TokenProvider>,
    pub(crate) config: RealtimeConfig,
    state_tx: watch::Sender<ConnectionState>,
    handlers: Mutex<Vec<StateChangeHandler>>,
    client_id: Mutex<Option<String>>,
}

impl Shared {
    /// Republish a state; handlers run only when the state actually changed.
    pub(crate) fn publish(&self, state: ConnectionState, reason: Option<String>) {
        let previous = self.state_tx.send_replace(state);
        if previous == state {
            return;
        }

        info!(previous = %previous, current = %state, reason = ?reason, "Connection state changed");

        let change = ConnectionStateChange {
            previous,
            current: state,
            reason,
        };
        let handlers = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for handler in handlers {
            handler(&change);
        }
    }

    pub(crate) fn client_id(&self) -> Option<String> {
        self.client_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

struct Supervisor {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Manages the lifecycle of the session's backend connection.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<Supervisor>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("client_id", &self.shared.client_id())
            .finish()
    }
}

impl ConnectionManager {
    /// Creates a manager in the `initialized` state.
    pub fn new(
        backend: Arc<dyn RealtimeBackend>,
        tokens: Arc<dyn TokenProvider>,
        config: RealtimeConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Initialized);
        Self {
            shared: Arc::new(Shared {
                backend,
                tokens,
                config,
                state_tx,
                handlers: Mutex::new(Vec::new()),
                client_id: Mutex::new(None),
            }),
            supervisor: Mutex::new(None),
        }
    }

    /// Connects as `user_id` and waits for the `connected` state.
    ///
    /// A token is fetched first so that a refusing provider fails with an
    /// authentication error before the backend is contacted. Fails with a
    /// connection error if the configured timeout elapses or the
    /// backend reports `failed` or `suspended` first.
    pub async fn connect(&self, user_id: &str) -> AppResult<()> {
        if user_id.trim().is_empty() {
            return Err(AppError::validation("User id must not be empty"));
        }

        if let Some(existing) = self.shared.client_id() {
            if existing != user_id {
                return Err(AppError::validation(format!(
                    "Session is already bound to '{existing}'"
                )));
            }
            if self.state().is_connected() {
                debug!(client_id = %user_id, "Already connected");
                return Ok(());
            }
        }

        *self
            .shared
            .client_id
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(user_id.to_string());

        let token = self.shared.tokens.fetch_token(user_id).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Authentication,
                format!("Token provider refused '{user_id}'"),
                e,
            )
        })?;
        if token.is_expired_at(Utc::now()) {
            return Err(AppError::authentication("Token provider returned an expired token"));
        }

        self.ensure_supervisor();
        // a retry must not settle on the failed or suspended state of the last attempt
        self.shared.publish(ConnectionState::Connecting, None);
        let mut state_rx = self.shared.state_tx.subscribe();

        info!(client_id = %user_id, "Connecting to realtime backend");
        self.shared
            .backend
            .connect(user_id, self.shared.tokens.clone())
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Connection, format!("Connect failed: {e}"), e)
            })?;

        let timeout = self.shared.config.connect_timeout();
        let outcome = tokio::time::timeout(
            timeout,
            state_rx.wait_for(|s| {
                matches!(
                    s,
                    ConnectionState::Connected | ConnectionState::Failed | ConnectionState::Suspended
                )
            }),
        )
        .await
        .map(|r| r.map(|state| *state));

        match outcome {
            Ok(Ok(ConnectionState::Connected)) => Ok(()),
            Ok(Ok(state)) => Err(AppError::connection(format!(
                "Connection ended in state '{state}'"
            ))),
            Ok(Err(_)) => Err(AppError::connection("Connection state channel closed")),
            Err(_) => {
                warn!(client_id = %user_id, timeout_secs = timeout.as_secs(), "Connect timed out");
                Err(AppError::connection(format!(
                    "Timed out after {}s waiting for connection",
                    timeout.as_secs()
                )))
            }
        }
    }

    /// Registers a state change handler.
    pub fn on_state_change(&self, handler: impl Fn(&ConnectionStateChange) + Send + Sync + 'static) {
        self.shared
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(handler));
    }

    /// Watch the republished connection state.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Current republished state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Client id the session connected as.
    pub fn client_id(&self) -> Option<String> {
        self.shared.client_id()
    }

    /// Fails with a not-ready error unless connected.
    pub fn ensure_connected(&self) -> AppResult<()> {
        let state = self.state();
        if state.is_connected() {
            Ok(())
        } else {
            Err(AppError::not_ready(format!("Connection is {state}")))
        }
    }

    /// Stops supervision and closes the backend connection.
    pub async fn close(&self) {
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(supervisor) = supervisor {
            supervisor.cancel.cancel();
            supervisor.task.abort();
        }

        self.shared.backend.close().await;
        self.shared
            .publish(ConnectionState::Disconnected, Some("closed".to_string()));
        info!("Connection closed");
    }

    fn ensure_supervisor(&self) {
        let mut slot = self.supervisor.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|s| !s.task.is_finished()) {
            return;
        }

        let cancel = CancellationToken::new();
        let backend_rx = self.shared.backend.connection_state();
        let task = tokio::spawn(supervisor::run(
            self.shared.clone(),
            backend_rx,
            cancel.child_token(),
        ));
        *slot = Some(Supervisor { cancel, task });
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(supervisor) = self
            .supervisor
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            supervisor.cancel.cancel();
            supervisor.task.abort();
        }
    }
}
