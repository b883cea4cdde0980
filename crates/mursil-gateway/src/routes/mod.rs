//! Ingress route handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mursil_core::types::normalize;
use mursil_dispatch::DispatchOutcome;

use crate::middleware::authenticate;
use crate::server::AppState;

/// Summary returned for every accepted ingest call, even when every
/// downstream dispatch failed.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    /// Records present in the envelope
    pub received: usize,
    /// Records that became scan requests
    pub accepted: usize,
    /// Records dropped during normalization
    pub dropped: usize,
    pub outcomes: Vec<DispatchOutcome>,
}

fn error_response(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({"ok": false, "error": code}))).into_response()
}

/// GET /health - liveness probe, no auth
pub async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}

/// POST /events - ingest one S3 notification batch
///
/// Auth gate, then normalize, then dispatch. Per-target failures are
/// reported in the summary, never as a non-success response; only auth
/// and payload-structure failures reject the call.
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !authenticate(presented, state.config.auth.shared_secret.as_deref()) {
        state.metrics.record_unauthorized();
        warn!(request_id = %request_id, "rejected unauthenticated ingest call");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(request_id = %request_id, error = %e, "unparseable ingest body");
            return error_response(StatusCode::BAD_REQUEST, "malformed_payload");
        }
    };

    let batch = normalize(&payload, &state.config.identity);
    let accepted = batch.requests.len();
    info!(
        request_id = %request_id,
        received = batch.received,
        accepted,
        dropped = batch.dropped,
        "normalized notification batch"
    );
    state
        .metrics
        .record_batch(batch.received, accepted, batch.dropped);

    let mut response = IngestResponse {
        ok: true,
        received: batch.received,
        accepted,
        dropped: batch.dropped,
        outcomes: Vec::new(),
    };

    if batch.requests.is_empty() {
        return (StatusCode::OK, Json(response)).into_response();
    }

    let start = Instant::now();
    match state.dispatcher.dispatch(&batch.requests).await {
        Ok(outcomes) => {
            for outcome in &outcomes {
                state.metrics.record_outcome(outcome);
            }
            state
                .metrics
                .record_batch_duration(start.elapsed().as_secs_f64());
            response.outcomes = outcomes;
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            // Only invariant violations reach here; per-pair failures
            // come back as outcomes.
            error!(request_id = %request_id, error = %err, "dispatch aborted");
            let status = StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, err.code())
        }
    }
}
