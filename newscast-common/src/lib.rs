//! Shared types for the newscast services
//!
//! Holds the common error type, configuration loading and the broadcast
//! event bus used for the announce-style fan-out path.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
