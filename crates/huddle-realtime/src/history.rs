//! Message history retrieval for the active channel.

use std::cmp::Reverse;
use std::sync::Arc;

use tracing::debug;

use huddle_core::error::{AppError, ErrorKind};
use huddle_core::result::AppResult;
use huddle_core::traits::{HistoryQuery, RealtimeBackend};
use huddle_core::types::Message;

use crate::channel::ActiveChannel;
use crate::message::normalize;

/// Fetches and normalizes past messages.
#[derive(Debug, Clone)]
pub struct HistoryFetcher {
    backend: Arc<dyn RealtimeBackend>,
}

impl HistoryFetcher {
    pub fn new(backend: Arc<dyn RealtimeBackend>) -> Self {
        Self { backend }
    }

    /// Up to `limit` messages of `channel`, newest first.
    ///
    /// Returns an empty list without a backend call when there is no active
    /// channel or `limit` is zero.
    pub async fn fetch(&self, channel: Option<&ActiveChannel>, limit: usize) -> AppResult<Vec<Message>> {
        let Some(channel) = channel else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let raw = self
            .backend
            .history(channel.name(), HistoryQuery::newest(limit))
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Backend,
                    format!("Failed to fetch history for '{}'", channel.name()),
                    e,
                )
            })?;

        let mut messages: Vec<Message> = raw.iter().map(normalize::normalize_message).collect();
        // stable: equal timestamps keep the backend's newest-first order
        messages.sort_by_key(|m| Reverse(m.timestamp_millis));
        messages.truncate(limit);

        debug!(channel = %channel.name(), count = messages.len(), limit, "History fetched");
        Ok(messages)
    }
}
