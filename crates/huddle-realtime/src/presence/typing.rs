//! Typing set, replaced wholesale on every typing snapshot.

use std::collections::HashSet;
use std::sync::Mutex;

/// Clients currently typing on the active channel.
#[derive(Debug, Default)]
pub struct TypingSet {
    current: Mutex<HashSet<String>>,
}

impl TypingSet {
    /// Create an empty typing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set with an authoritative snapshot.
    pub fn replace(&self, snapshot: HashSet<String>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = snapshot;
    }

    /// Clear the set.
    pub fn clear(&self) {
        self.replace(HashSet::new());
    }

    /// Copy of the current set.
    pub fn snapshot(&self) -> HashSet<String> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
