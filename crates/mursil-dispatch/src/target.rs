//! Trigger target contract
//!
//! A target adapter shapes a [`ScanRequest`] into one scheduler's
//! trigger call. Adapters must carry the request identity into the
//! call (run name, DAG run id) so the receiving scheduler can collapse
//! repeated triggers for the same object into a no-op.

use async_trait::async_trait;
use mursil_core::types::ScanRequest;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

/// One failed trigger call, classified for the dispatcher
#[derive(Error, Debug)]
pub enum TriggerError {
    /// Transport-level failure: connect error, timeout, DNS
    #[error("target unreachable: {0}")]
    Unreachable(String),

    /// The target answered with a non-success status
    #[error("target rejected trigger: {0}")]
    Rejected(String),

    /// Lookup/resolution failed; retrying cannot help
    #[error("target misconfigured: {0}")]
    Misconfigured(String),
}

impl TriggerError {
    /// Misconfiguration is a skip, not a retry
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TriggerError::Misconfigured(_))
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        TriggerError::Unreachable(err.to_string())
    }
}

/// A configured downstream scheduler endpoint
#[async_trait]
pub trait TriggerTarget: Send + Sync {
    /// Stable target name used in outcomes, logs, and metrics
    fn name(&self) -> &str;

    /// Perform one trigger call for one request
    async fn trigger(&self, client: &Client, request: &ScanRequest) -> Result<(), TriggerError>;
}

/// Scan parameters carried in every trigger payload
#[derive(Debug, Serialize)]
pub struct TriggerParameters<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<&'a str>,
}

impl<'a> From<&'a ScanRequest> for TriggerParameters<'a> {
    fn from(request: &'a ScanRequest) -> Self {
        Self {
            bucket: &request.bucket,
            key: &request.key,
            event: &request.event,
            etag: request.etag.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mursil_core::config::IdentityConfig;

    #[test]
    fn test_trigger_parameters_shape() {
        let request = ScanRequest::from_parts(
            Some("incoming".into()),
            Some("a/b.csv".into()),
            Some("ObjectCreated:Put".into()),
            Some("abc123".into()),
            &IdentityConfig::default(),
        )
        .unwrap();

        let json = serde_json::to_value(TriggerParameters::from(&request)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "bucket": "incoming",
                "key": "a/b.csv",
                "event": "ObjectCreated:Put",
                "etag": "abc123",
            })
        );
    }

    #[test]
    fn test_trigger_parameters_omit_missing_etag() {
        let request = ScanRequest::from_parts(
            Some("incoming".into()),
            Some("a/b.csv".into()),
            None,
            None,
            &IdentityConfig::default(),
        )
        .unwrap();

        let json = serde_json::to_value(TriggerParameters::from(&request)).unwrap();
        assert!(json.get("etag").is_none());
        assert_eq!(json["event"], "manual");
    }

    #[test]
    fn test_misconfigured_not_retryable() {
        assert!(TriggerError::Unreachable("timeout".into()).is_retryable());
        assert!(TriggerError::Rejected("500".into()).is_retryable());
        assert!(!TriggerError::Misconfigured("unknown deployment".into()).is_retryable());
    }
}
