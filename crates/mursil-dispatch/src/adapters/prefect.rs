//! Prefect deployment-trigger adapter
//!
//! Resolves a deployment (by literal id, or by flow + deployment name
//! through `GET /deployments/name/{flow}/{name}`), then creates a flow
//! run via `POST /deployments/{id}/create_flow_run`. The run is named
//! after the request identity, which is what makes a repeated trigger
//! for the same object recognizable on the Prefect side. Prefect does
//! not reject duplicate run names, so this is weak idempotency: the
//! receiving flow must treat same-named runs as the same unit of work.

use async_trait::async_trait;
use mursil_core::config::PrefectConfig;
use mursil_core::types::ScanRequest;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::target::{TriggerError, TriggerParameters, TriggerTarget};

pub struct PrefectTarget {
    config: PrefectConfig,
    api_url: String,
}

#[derive(Serialize)]
struct FlowRunBody<'a> {
    name: &'a str,
    parameters: TriggerParameters<'a>,
}

#[derive(Deserialize)]
struct DeploymentResponse {
    id: String,
}

impl PrefectTarget {
    pub fn new(config: PrefectConfig) -> Self {
        let api_url = config.api_url.trim_end_matches('/').to_string();
        Self { config, api_url }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Resolve the deployment id for trigger calls.
    ///
    /// An unknown deployment name is a configuration problem, not a
    /// transient one; it surfaces as `Misconfigured` so the dispatcher
    /// skips instead of retrying.
    async fn resolve_deployment(&self, client: &Client) -> Result<String, TriggerError> {
        if let Some(ref id) = self.config.deployment_id {
            return Ok(id.clone());
        }

        let (flow, name) = match (&self.config.flow_name, &self.config.deployment_name) {
            (Some(flow), Some(name)) => (flow, name),
            _ => {
                return Err(TriggerError::Misconfigured(
                    "prefect target needs deployment_id or flow_name + deployment_name".into(),
                ))
            }
        };

        let url = format!("{}/deployments/name/{}/{}", self.api_url, flow, name);
        let response = self
            .authorize(client.get(&url))
            .send()
            .await
            .map_err(TriggerError::from_transport)?;

        match response.status() {
            status if status.is_success() => {
                let deployment: DeploymentResponse = response
                    .json()
                    .await
                    .map_err(|e| TriggerError::Rejected(format!("bad deployment response: {}", e)))?;
                debug!(deployment_id = %deployment.id, flow, name, "resolved prefect deployment");
                Ok(deployment.id)
            }
            StatusCode::NOT_FOUND => Err(TriggerError::Misconfigured(format!(
                "unknown prefect deployment {}/{}",
                flow, name
            ))),
            status => Err(TriggerError::Rejected(format!(
                "deployment lookup failed with status {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl TriggerTarget for PrefectTarget {
    fn name(&self) -> &str {
        "prefect"
    }

    async fn trigger(&self, client: &Client, request: &ScanRequest) -> Result<(), TriggerError> {
        let deployment_id = self.resolve_deployment(client).await?;

        let url = format!("{}/deployments/{}/create_flow_run", self.api_url, deployment_id);
        let body = FlowRunBody {
            name: &request.identity,
            parameters: TriggerParameters::from(request),
        };

        let response = self
            .authorize(client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(TriggerError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            debug!(
                identity = %request.identity,
                bucket = %request.bucket,
                key = %request.key,
                "created prefect flow run"
            );
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(TriggerError::Rejected(format!(
                "create_flow_run returned {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )))
        }
    }
}
