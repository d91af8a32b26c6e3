//! Backend connection lifecycle: connect, state republishing and reconnection.

pub mod manager;
pub mod supervisor;

pub use manager::{ConnectionManager, StateChangeHandler};
