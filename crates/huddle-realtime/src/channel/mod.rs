//! Active channel lifecycle and stream fan-out.

pub mod handlers;
pub mod multiplexer;
pub mod session;

pub use handlers::{HandlerSlot, NoopEvents, SessionEvents};
pub use multiplexer::{SubscriptionHandle, SubscriptionMultiplexer};
pub use session::{ActiveChannel, ChannelSessionManager, SwitchOutcome};
