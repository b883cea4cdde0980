//! Ingress gateway for Mursil
//!
//! The externally reachable boundary: receives S3-compatible
//! notification batches, gates them on the shared secret, normalizes
//! them, hands them to the dispatcher, and answers with a summary.

pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;

pub use metrics::MetricsRecorder;
pub use server::{AppState, GatewayServer};
