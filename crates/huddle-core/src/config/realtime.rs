//! Realtime session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Hard payload limit enforced by the transport.
pub const TRANSPORT_MAX_PAYLOAD_BYTES: usize = 65_536;

/// Realtime session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Upper bound for `connect` to observe the `connected` state, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Delay applied to every channel switch after the first, in milliseconds.
    #[serde(default = "default_switch_debounce")]
    pub switch_debounce_ms: u64,
    /// Local outbound payload threshold in bytes.
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: usize,
    /// Wait before the single retry of a rate-limited send, in milliseconds.
    #[serde(default = "default_rate_limit_retry")]
    pub rate_limit_retry_ms: u64,
    /// Maximum number of entries in a message's extra metadata map.
    #[serde(default = "default_max_metadata_entries")]
    pub max_metadata_entries: usize,
    /// Maximum length of a channel name in bytes.
    #[serde(default = "default_max_channel_name")]
    pub max_channel_name_bytes: usize,
    /// Reconnection policy for transient disconnects.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Bounded exponential backoff for reconnecting after a transient disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Attempts before the connection is reported as suspended.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay in milliseconds.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Ceiling for the backoff delay in milliseconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl RealtimeConfig {
    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Switch debounce as a [`Duration`].
    pub fn switch_debounce(&self) -> Duration {
        Duration::from_millis(self.switch_debounce_ms)
    }

    /// Rate-limit retry delay as a [`Duration`].
    pub fn rate_limit_retry(&self) -> Duration {
        Duration::from_millis(self.rate_limit_retry_ms)
    }

    /// Checks cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_payload_bytes == 0 || self.max_payload_bytes > TRANSPORT_MAX_PAYLOAD_BYTES {
            return Err(AppError::configuration(format!(
                "max_payload_bytes must be between 1 and {TRANSPORT_MAX_PAYLOAD_BYTES}"
            )));
        }
        if self.reconnect.initial_backoff_ms > self.reconnect.max_backoff_ms {
            return Err(AppError::configuration(
                "reconnect.initial_backoff_ms must not exceed reconnect.max_backoff_ms",
            ));
        }
        Ok(())
    }
}

impl ReconnectConfig {
    /// Backoff before reconnect attempt `attempt` (1-based), doubling and capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: default_connect_timeout(),
            switch_debounce_ms: default_switch_debounce(),
            max_payload_bytes: default_max_payload(),
            rate_limit_retry_ms: default_rate_limit_retry(),
            max_metadata_entries: default_max_metadata_entries(),
            max_channel_name_bytes: default_max_channel_name(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_switch_debounce() -> u64 {
    100
}

fn default_max_payload() -> usize {
    60_000
}

fn default_rate_limit_retry() -> u64 {
    1000
}

fn default_max_metadata_entries() -> usize {
    32
}

fn default_max_channel_name() -> usize {
    256
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    8000
}
