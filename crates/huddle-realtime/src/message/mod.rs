//! Message handling: normalization, validation, deduplication, and sending.

pub mod builder;
pub mod dedup;
pub mod normalize;
pub mod sender;
pub mod validator;

pub use builder::SenderProfile;
pub use dedup::MessageDeduplicator;
pub use sender::Sender;
