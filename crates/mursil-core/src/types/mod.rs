//! Core types for Mursil

pub mod event;

pub use event::{normalize, NormalizedBatch, RawRecord, ScanRequest};
