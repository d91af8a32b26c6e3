//! Caller-supplied event handlers.
//!
//! Handlers are registered on the session and swapped with
//! [`HandlerSlot::set`] at any time. Listener tasks read the current handlers
//! for every event, so replacing them never requires re-subscribing.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use huddle_core::types::{Message, MessageReaction, PresenceChange, RoomReaction};

/// Receives normalized events from the active channel.
///
/// Every method has an empty default so implementors only override what they
/// need. Methods run on listener tasks and must not block.
pub trait SessionEvents: Send + Sync + 'static {
    /// A new (non-duplicate) message arrived.
    fn on_message(&self, _channel: &str, _message: &Message) {}

    /// The presence set changed or a member updated its data.
    fn on_presence_change(&self, _channel: &str, _change: &PresenceChange) {}

    /// The set of typing clients was replaced.
    fn on_typing_change(&self, _channel: &str, _typing: &HashSet<String>) {}

    /// A room reaction arrived.
    fn on_room_reaction(&self, _channel: &str, _reaction: &RoomReaction) {}

    /// A message reaction summary changed.
    fn on_message_reaction(&self, _channel: &str, _reaction: &MessageReaction) {}
}

/// Handlers that ignore every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl SessionEvents for NoopEvents {}

/// Holds the currently registered handlers.
pub struct HandlerSlot {
    current: RwLock<Arc<dyn SessionEvents>>,
}

impl HandlerSlot {
    /// Slot holding [`NoopEvents`].
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(NoopEvents)),
        }
    }

    /// Replace the registered handlers.
    pub fn set(&self, handlers: Arc<dyn SessionEvents>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = handlers;
    }

    /// The handlers registered right now.
    pub fn get(&self) -> Arc<dyn SessionEvents> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for HandlerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSlot").finish()
    }
}
