//! Live presence and typing state for the active channel.

pub mod tracker;
pub mod typing;

pub use tracker::PresenceSet;
pub use typing::TypingSet;
