//! Mursil Core Library
//!
//! Core types, configuration, and the identity generator for the Mursil
//! event gateway.

pub mod config;
pub mod error;
pub mod identity;
pub mod types;

pub use config::MursilConfig;
pub use error::{Error, Result};
pub use identity::{identity, IdentityMode};

/// Mursil version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default length of a hash-prefix identity
pub const DEFAULT_IDENTITY_LENGTH: usize = 8;

/// Event label applied to records that carry no native event type
pub const MANUAL_EVENT: &str = "manual";
