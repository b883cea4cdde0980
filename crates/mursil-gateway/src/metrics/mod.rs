//! Prometheus metrics for Mursil
//!
//! Exposes metrics at `/metrics` in Prometheus format.

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use mursil_dispatch::{DispatchOutcome, DispatchStatus};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Metric names
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "mursil_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "mursil_http_request_duration_seconds";

    // Ingest metrics
    pub const INGEST_RECORDS_RECEIVED_TOTAL: &str = "mursil_ingest_records_received_total";
    pub const INGEST_RECORDS_ACCEPTED_TOTAL: &str = "mursil_ingest_records_accepted_total";
    pub const INGEST_RECORDS_DROPPED_TOTAL: &str = "mursil_ingest_records_dropped_total";
    pub const INGEST_UNAUTHORIZED_TOTAL: &str = "mursil_ingest_unauthorized_total";

    // Dispatch metrics
    pub const DISPATCH_OUTCOMES_TOTAL: &str = "mursil_dispatch_outcomes_total";
    pub const DISPATCH_ATTEMPTS_TOTAL: &str = "mursil_dispatch_attempts_total";
    pub const DISPATCH_BATCH_DURATION_SECONDS: &str = "mursil_dispatch_batch_duration_seconds";

    // System metrics
    pub const UPTIME_SECONDS: &str = "mursil_uptime_seconds";
    pub const INFO: &str = "mursil_info";
}

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Initialize the metrics system
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        // A recorder may already be installed when several servers run
        // in one process (tests); the first one wins.
        let _ = metrics::set_global_recorder(recorder);

        gauge!(names::INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

        Self {
            handle,
            start_time: Instant::now(),
        }
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());
        self.handle.render()
    }

    /// Record one normalized ingest batch
    pub fn record_batch(&self, received: usize, accepted: usize, dropped: usize) {
        counter!(names::INGEST_RECORDS_RECEIVED_TOTAL).increment(received as u64);
        counter!(names::INGEST_RECORDS_ACCEPTED_TOTAL).increment(accepted as u64);
        counter!(names::INGEST_RECORDS_DROPPED_TOTAL).increment(dropped as u64);
    }

    /// Record a rejected ingress call
    pub fn record_unauthorized(&self) {
        counter!(names::INGEST_UNAUTHORIZED_TOTAL).increment(1);
    }

    /// Record one dispatch outcome
    pub fn record_outcome(&self, outcome: &DispatchOutcome) {
        let status = match outcome.status {
            DispatchStatus::Succeeded => "succeeded",
            DispatchStatus::Failed => "failed",
            DispatchStatus::Skipped => "skipped",
        };

        counter!(
            names::DISPATCH_OUTCOMES_TOTAL,
            "target" => outcome.target.clone(),
            "status" => status
        )
        .increment(1);

        counter!(
            names::DISPATCH_ATTEMPTS_TOTAL,
            "target" => outcome.target.clone()
        )
        .increment(outcome.attempts as u64);
    }

    /// Record total dispatch time for one batch
    pub fn record_batch_duration(&self, duration_secs: f64) {
        histogram!(names::DISPATCH_BATCH_DURATION_SECONDS).record(duration_secs);
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        counter!(
            names::HTTP_REQUESTS_TOTAL,
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            names::HTTP_REQUEST_DURATION_SECONDS,
            "path" => path.to_string()
        )
        .record(duration_secs);
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Axum middleware for recording HTTP metrics
pub async fn metrics_middleware(
    State(metrics): State<Arc<MetricsRecorder>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    metrics.record_http_request(&method, &path, status, duration);

    debug!(
        method = %method,
        path = %path,
        status = %status,
        duration_ms = %(duration * 1000.0),
        "Request completed"
    );

    response
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(metrics): State<Arc<MetricsRecorder>>) -> impl IntoResponse {
    let output = metrics.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}
