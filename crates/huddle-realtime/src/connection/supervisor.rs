//! Supervisor task: republishes backend connection states and reconnects
//! with bounded backoff after a transient disconnect.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use huddle_core::types::ConnectionState;

use super::manager::Shared;

/// How a reconnection round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The backend reported `connected` again.
    Recovered,
    /// The backend reported the terminal `failed` state.
    Failed,
    /// Every attempt failed; the connection is suspended.
    Exhausted,
    /// The supervisor was stopped mid-round.
    Cancelled,
}

/// Run until `cancel` fires or the backend drops its state channel.
pub(crate) async fn run(
    shared: Arc<Shared>,
    mut backend_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    let mut was_connected = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = backend_rx.changed() => {
                if changed.is_err() {
                    debug!("Backend state channel closed");
                    break;
                }

                let state = *backend_rx.borrow_and_update();
                shared.publish(state, None);

                match state {
                    ConnectionState::Connected => was_connected = true,
                    ConnectionState::Disconnected if was_connected => {
                        let outcome = reconnect(&shared, &cancel).await;
                        // intermediate states of the round are not republished
                        let latest = *backend_rx.borrow_and_update();
                        match outcome {
                            ReconnectOutcome::Recovered => shared.publish(latest, None),
                            ReconnectOutcome::Failed => {
                                shared.publish(ConnectionState::Failed, None);
                                was_connected = false;
                            }
                            ReconnectOutcome::Exhausted => {
                                shared.publish(
                                    ConnectionState::Suspended,
                                    Some("reconnection attempts exhausted".to_string()),
                                );
                                was_connected = false;
                            }
                            ReconnectOutcome::Cancelled => break,
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    debug!("Connection supervisor stopped");
}

/// Attempt to reconnect up to `reconnect.max_attempts` times.
pub(crate) async fn reconnect(shared: &Shared, cancel: &CancellationToken) -> ReconnectOutcome {
    let Some(client_id) = shared.client_id() else {
        return ReconnectOutcome::Exhausted;
    };
    let policy = &shared.config.reconnect;

    for attempt in 1..=policy.max_attempts {
        let delay = policy.backoff_for(attempt);
        tokio::select! {
            _ = cancel.cancelled() => return ReconnectOutcome::Cancelled,
            _ = time::sleep(delay) => {}
        }

        let mut state_rx = shared.backend.connection_state();
        match *state_rx.borrow_and_update() {
            ConnectionState::Connected => return ReconnectOutcome::Recovered,
            ConnectionState::Failed => return ReconnectOutcome::Failed,
            _ => {}
        }

        info!(
            client_id = %client_id,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting"
        );

        if let Err(e) = shared
            .backend
            .connect(&client_id, shared.tokens.clone())
            .await
        {
            warn!(client_id = %client_id, attempt, error = %e, "Reconnect attempt failed");
            continue;
        }

        let settled = time::timeout(
            shared.config.connect_timeout(),
            state_rx.wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed)),
        )
        .await
        .map(|r| r.map(|state| *state));

        match settled {
            Ok(Ok(ConnectionState::Connected)) => return ReconnectOutcome::Recovered,
            Ok(Ok(_)) => return ReconnectOutcome::Failed,
            Ok(Err(_)) => return ReconnectOutcome::Cancelled,
            Err(_) => {
                warn!(client_id = %client_id, attempt, "Reconnect attempt timed out");
            }
        }
    }

    warn!(client_id = %client_id, "Reconnection attempts exhausted");
    ReconnectOutcome::Exhausted
}
