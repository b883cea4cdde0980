//! Gateway server

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use mursil_core::{config::MursilConfig, Result};
use mursil_dispatch::{adapters, Dispatcher};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::info;

use crate::metrics::{metrics_handler, metrics_middleware, MetricsRecorder};
use crate::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MursilConfig>,
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Arc<MetricsRecorder>,
}

impl FromRef<AppState> for Arc<MetricsRecorder> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Build the gateway router for the given state
pub fn router(state: AppState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        // Liveness probe and metrics (no auth required)
        .route("/health", get(routes::health))
        .route("/metrics", get(metrics_handler))
        // Notification ingest; /minio is the path MinIO is pointed at
        .route("/events", post(routes::ingest))
        .route("/minio", post(routes::ingest))
        .layer(middleware::from_fn_with_state(metrics, metrics_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .with_state(state)
}

/// Ingress gateway server
pub struct GatewayServer {
    config: MursilConfig,
}

impl GatewayServer {
    pub fn new(config: MursilConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        self.config.validate()?;

        let metrics = Arc::new(MetricsRecorder::new());
        info!("Prometheus metrics initialized");

        let targets = adapters::build_targets(&self.config.targets);
        let dispatcher = Arc::new(Dispatcher::new(self.config.dispatch.clone(), targets)?);
        info!(targets = ?dispatcher.target_names(), "dispatch targets configured");

        let state = AppState {
            config: Arc::new(self.config.clone()),
            dispatcher,
            metrics,
        };

        let app = router(state);
        let addr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        );
        let listener = TcpListener::bind(&addr).await?;

        info!("Mursil gateway listening on http://{}", addr);
        info!("Event ingest at http://{}/events", addr);
        info!("Prometheus metrics at http://{}/metrics", addr);
        if self.config.auth.shared_secret.is_none() {
            info!("No shared secret configured, ingest runs in open mode");
        }

        axum::serve(listener, app).await?;
        Ok(())
    }
}
