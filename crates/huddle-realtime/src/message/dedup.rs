//! Per-channel deduplication of delivered messages.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Tracks message identities already delivered on each channel.
///
/// Identity is the message's logical id, else its transport serial. The set
/// for a channel lives until [`clear`](Self::clear) is called on switch-away,
/// so memory is bounded by one channel's lifetime.
#[derive(Debug, Default)]
pub struct MessageDeduplicator {
    /// Channel name → identities seen on it.
    seen: Mutex<HashMap<String, HashSet<String>>>,
}

impl MessageDeduplicator {
    /// Create an empty deduplicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `identity` was already marked on `channel`.
    pub fn seen(&self, channel: &str, identity: &str) -> bool {
        let map = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        map.get(channel).is_some_and(|set| set.contains(identity))
    }

    /// Record `identity` as delivered on `channel`.
    pub fn mark_seen(&self, channel: &str, identity: &str) {
        let mut map = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(channel.to_string())
            .or_default()
            .insert(identity.to_string());
    }

    /// Check and mark in one step.
    ///
    /// Returns `true` if the message should be delivered, `false` if it's a duplicate.
    pub fn check_and_mark(&self, channel: &str, identity: &str) -> bool {
        let mut map = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        match map.get_mut(channel) {
            Some(set) => set.insert(identity.to_string()),
            None => {
                map.insert(channel.to_string(), HashSet::from([identity.to_string()]));
                true
            }
        }
    }

    /// Forget every identity seen on `channel`.
    pub fn clear(&self, channel: &str) {
        let mut map = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(channel);
    }

    /// Number of identities tracked for `channel`.
    pub fn len(&self, channel: &str) -> usize {
        let map = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        map.get(channel).map(HashSet::len).unwrap_or(0)
    }

    /// Whether nothing is tracked for `channel`.
    pub fn is_empty(&self, channel: &str) -> bool {
        self.len(channel) == 0
    }
}
