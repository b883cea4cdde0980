//! Airflow DAG-run adapter
//!
//! Creates a DAG run via the stable REST API
//! (`POST /api/v1/dags/{dag_id}/dagRuns`, basic auth). The DAG run id
//! is derived from the request identity, and a 409 (run id already
//! exists) counts as success: a duplicate trigger for the same object
//! collapses into a no-op on the Airflow side.

use async_trait::async_trait;
use mursil_core::config::AirflowConfig;
use mursil_core::types::ScanRequest;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::target::{TriggerError, TriggerParameters, TriggerTarget};

pub struct AirflowTarget {
    config: AirflowConfig,
    base_url: String,
}

#[derive(Serialize)]
struct DagRunBody<'a> {
    dag_run_id: String,
    conf: TriggerParameters<'a>,
}

impl AirflowTarget {
    pub fn new(config: AirflowConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self { config, base_url }
    }

    fn run_id(request: &ScanRequest) -> String {
        format!("scan-{}", request.identity)
    }
}

#[async_trait]
impl TriggerTarget for AirflowTarget {
    fn name(&self) -> &str {
        "airflow"
    }

    async fn trigger(&self, client: &Client, request: &ScanRequest) -> Result<(), TriggerError> {
        let url = format!("{}/api/v1/dags/{}/dagRuns", self.base_url, self.config.dag_id);
        let body = DagRunBody {
            dag_run_id: Self::run_id(request),
            conf: TriggerParameters::from(request),
        };

        let response = client
            .post(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await
            .map_err(TriggerError::from_transport)?;

        match response.status() {
            status if status.is_success() => {
                debug!(
                    identity = %request.identity,
                    dag_id = %self.config.dag_id,
                    "created airflow dag run"
                );
                Ok(())
            }
            // Run id already exists: the idempotent no-op we want
            StatusCode::CONFLICT => {
                debug!(
                    identity = %request.identity,
                    dag_id = %self.config.dag_id,
                    "dag run already exists, treating as delivered"
                );
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(TriggerError::Misconfigured(format!(
                "unknown airflow DAG {}",
                self.config.dag_id
            ))),
            status => {
                let detail = response.text().await.unwrap_or_default();
                Err(TriggerError::Rejected(format!(
                    "dagRuns returned {}: {}",
                    status,
                    detail.chars().take(200).collect::<String>()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mursil_core::config::IdentityConfig;

    fn request() -> ScanRequest {
        ScanRequest::from_parts(
            Some("incoming".into()),
            Some("a/b.csv".into()),
            Some("ObjectCreated:Put".into()),
            None,
            &IdentityConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_run_id_carries_identity() {
        assert_eq!(AirflowTarget::run_id(&request()), "scan-1c31892c");
    }

    #[test]
    fn test_dag_run_body_shape() {
        let request = request();
        let body = DagRunBody {
            dag_run_id: AirflowTarget::run_id(&request),
            conf: TriggerParameters::from(&request),
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["dag_run_id"], "scan-1c31892c");
        assert_eq!(json["conf"]["bucket"], "incoming");
        assert_eq!(json["conf"]["key"], "a/b.csv");
        assert!(json["conf"].get("etag").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let target = AirflowTarget::new(AirflowConfig {
            base_url: "http://airflow:8080/".to_string(),
            ..Default::default()
        });
        assert_eq!(target.base_url, "http://airflow:8080");
    }
}
