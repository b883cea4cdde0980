//! Dispatch engine for Mursil
//!
//! Fans normalized scan requests out to downstream scheduler targets
//! with bounded concurrency, per-pair retry, and failure isolation.

pub mod adapters;
pub mod dispatcher;
pub mod target;

pub use dispatcher::{DispatchOutcome, DispatchStatus, Dispatcher};
pub use target::{TriggerError, TriggerTarget};
