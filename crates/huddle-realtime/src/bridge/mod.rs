//! Backend bridges. Only the in-process hub ships with the core; network
//! transports implement [`RealtimeBackend`](huddle_core::traits::RealtimeBackend)
//! in their own crates.

pub mod memory_backend;
pub mod memory_hub;

pub use memory_backend::{Faults, MemoryBackend};
pub use memory_hub::MemoryHub;
