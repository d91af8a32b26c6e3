//! Core traits defined in `huddle-core` and implemented by backend crates.

pub mod auth;
pub mod backend;

pub use auth::{AuthToken, StaticTokenProvider, TokenProvider};
pub use backend::{BackendError, HistoryQuery, RealtimeBackend};
