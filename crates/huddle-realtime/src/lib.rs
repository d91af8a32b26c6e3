//! # huddle-realtime
//!
//! Client-side realtime session core for Huddle chat. Provides:
//!
//! - Connection management with timeout, state republishing and bounded reconnection
//! - A single active channel per session with debounced, cancellable switching
//! - Per-channel message deduplication and four-stream subscription fan-out
//! - Message sending with size checks and a single rate-limit retry
//! - History, reactions, presence and typing
//! - An in-process backend for demos and tests

pub mod bridge;
pub mod channel;
pub mod connection;
pub mod history;
pub mod message;
pub mod presence;
pub mod reaction;
pub mod session;

pub use channel::{ActiveChannel, ChannelSessionManager, SessionEvents, SwitchOutcome};
pub use connection::ConnectionManager;
pub use history::HistoryFetcher;
pub use message::{MessageDeduplicator, Sender, SenderProfile};
pub use reaction::ReactionManager;
pub use session::ChatSession;
