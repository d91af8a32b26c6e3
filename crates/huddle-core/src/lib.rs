//! # huddle-core
//!
//! Core crate for Huddle. Contains the realtime backend and token provider
//! traits, configuration schemas, typed identifiers, message / presence /
//! reaction types, raw backend channel events, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Huddle crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
