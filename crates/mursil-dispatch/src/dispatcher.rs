//! Dispatcher
//!
//! Fans each scan request out to every configured target, retrying
//! transient failures and isolating every (request, target) pair: one
//! pair failing never suppresses or alters any other pair.
//!
//! The dispatcher keeps no state across calls. Deduplication of
//! repeated triggers is delegated to the identity carried in each
//! payload and enforced by the receiving scheduler.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use mursil_core::config::DispatchConfig;
use mursil_core::types::ScanRequest;
use mursil_core::{Error, Result};
use reqwest::Client;
use serde::Serialize;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::target::{TriggerError, TriggerTarget};

/// Terminal state of one (request, target) dispatch attempt sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Immutable per-(request, target) result
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub target: String,
    pub identity: String,
    pub status: DispatchStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Dispatch engine over an immutable target set
pub struct Dispatcher {
    client: Client,
    config: DispatchConfig,
    targets: Vec<Arc<dyn TriggerTarget>>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig, targets: Vec<Arc<dyn TriggerTarget>>) -> Result<Self> {
        if targets.is_empty() {
            return Err(Error::NoTargets);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            targets,
        })
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name()).collect()
    }

    /// Dispatch every request to every target.
    ///
    /// Returns one outcome per (request, target) pair; completion
    /// order across the worker pool is unspecified, so callers index
    /// outcomes by their `target` and `identity` fields.
    pub async fn dispatch(&self, requests: &[ScanRequest]) -> Result<Vec<DispatchOutcome>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            requests = requests.len(),
            targets = self.targets.len(),
            "dispatching batch"
        );

        let deadline = Instant::now() + self.config.batch_deadline();

        let pairs: Vec<(ScanRequest, Arc<dyn TriggerTarget>)> = requests
            .iter()
            .flat_map(|request| {
                self.targets
                    .iter()
                    .map(move |target| (request.clone(), Arc::clone(target)))
            })
            .collect();

        let futures: Vec<_> = pairs
            .into_iter()
            .map(|(request, target)| self.dispatch_pair(request, target, deadline).boxed())
            .collect();

        let outcomes = stream::iter(futures)
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(outcomes)
    }

    async fn dispatch_pair(
        &self,
        request: ScanRequest,
        target: Arc<dyn TriggerTarget>,
        deadline: Instant,
    ) -> DispatchOutcome {
        let mut attempts = 0u32;

        loop {
            match timeout_at(deadline, target.trigger(&self.client, &request)).await {
                Err(_) => {
                    warn!(
                        target = target.name(),
                        identity = %request.identity,
                        attempts,
                        "batch deadline hit before delivery"
                    );
                    return self.outcome(
                        &target,
                        &request,
                        DispatchStatus::Skipped,
                        attempts,
                        Some("batch deadline exceeded".to_string()),
                    );
                }
                Ok(Ok(())) => {
                    attempts += 1;
                    debug!(
                        target = target.name(),
                        identity = %request.identity,
                        attempts,
                        "trigger delivered"
                    );
                    return self.outcome(&target, &request, DispatchStatus::Succeeded, attempts, None);
                }
                Ok(Err(TriggerError::Misconfigured(detail))) => {
                    // Configuration problem, not a transient one.
                    // Logged distinctly so operators can tell it apart
                    // from downstream flakiness.
                    warn!(
                        target = target.name(),
                        identity = %request.identity,
                        detail = %detail,
                        "target misconfigured, skipping"
                    );
                    return self.outcome(&target, &request, DispatchStatus::Skipped, 0, Some(detail));
                }
                Ok(Err(err)) => {
                    attempts += 1;
                    let detail = err.to_string();
                    warn!(
                        target = target.name(),
                        identity = %request.identity,
                        attempt = attempts,
                        error = %detail,
                        "trigger attempt failed"
                    );

                    if attempts >= self.config.max_attempts {
                        error!(
                            target = target.name(),
                            identity = %request.identity,
                            attempts,
                            "giving up on trigger delivery"
                        );
                        return self.outcome(
                            &target,
                            &request,
                            DispatchStatus::Failed,
                            attempts,
                            Some(detail),
                        );
                    }

                    let delay = self.config.backoff.delay(attempts);
                    if !delay.is_zero() && timeout_at(deadline, sleep(delay)).await.is_err() {
                        return self.outcome(
                            &target,
                            &request,
                            DispatchStatus::Skipped,
                            attempts,
                            Some("batch deadline exceeded".to_string()),
                        );
                    }
                }
            }
        }
    }

    fn outcome(
        &self,
        target: &Arc<dyn TriggerTarget>,
        request: &ScanRequest,
        status: DispatchStatus,
        attempts: u32,
        last_error: Option<String>,
    ) -> DispatchOutcome {
        DispatchOutcome {
            target: target.name().to_string(),
            identity: request.identity.clone(),
            status,
            attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mursil_core::config::{BackoffKind, BackoffPolicy, IdentityConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    enum Behavior {
        Succeed,
        Fail,
        FailFirst(u32),
        Misconfigured,
        Hang,
    }

    struct MockTarget {
        name: &'static str,
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl MockTarget {
        fn new(name: &'static str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name,
                behavior,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl TriggerTarget for MockTarget {
        fn name(&self) -> &str {
            self.name
        }

        async fn trigger(
            &self,
            _client: &Client,
            _request: &ScanRequest,
        ) -> std::result::Result<(), TriggerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::Fail => Err(TriggerError::Rejected("boom".into())),
                Behavior::FailFirst(n) if call <= n => Err(TriggerError::Unreachable("flaky".into())),
                Behavior::FailFirst(_) => Ok(()),
                Behavior::Misconfigured => Err(TriggerError::Misconfigured("unknown deployment".into())),
                Behavior::Hang => {
                    sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }
    }

    fn test_config(max_attempts: u32) -> DispatchConfig {
        DispatchConfig {
            max_attempts,
            backoff: BackoffPolicy {
                kind: BackoffKind::None,
                base_delay_ms: 0,
            },
            ..Default::default()
        }
    }

    fn requests(keys: &[&str]) -> Vec<ScanRequest> {
        keys.iter()
            .map(|key| {
                ScanRequest::from_parts(
                    Some("incoming".into()),
                    Some((*key).to_string()),
                    Some("ObjectCreated:Put".into()),
                    None,
                    &IdentityConfig::default(),
                )
                .unwrap()
            })
            .collect()
    }

    fn outcomes_for<'a>(
        outcomes: &'a [DispatchOutcome],
        target: &str,
    ) -> Vec<&'a DispatchOutcome> {
        outcomes.iter().filter(|o| o.target == target).collect()
    }

    #[tokio::test]
    async fn test_no_targets_is_invariant_violation() {
        let result = Dispatcher::new(test_config(2), Vec::new());
        assert!(matches!(result, Err(Error::NoTargets)));
    }

    #[tokio::test]
    async fn test_empty_batch_yields_no_outcomes() {
        let dispatcher =
            Dispatcher::new(test_config(2), vec![MockTarget::new("ok", Behavior::Succeed)]).unwrap();
        let outcomes = dispatcher.dispatch(&[]).await.unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_failure_isolation_across_targets_and_requests() {
        let bad = MockTarget::new("bad", Behavior::Fail);
        let good = MockTarget::new("good", Behavior::Succeed);
        let dispatcher =
            Dispatcher::new(test_config(1), vec![bad.clone(), good.clone()]).unwrap();

        let outcomes = dispatcher
            .dispatch(&requests(&["a.csv", "b.csv"]))
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 4);

        let failed = outcomes_for(&outcomes, "bad");
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().all(|o| o.status == DispatchStatus::Failed));
        assert!(failed.iter().all(|o| o.last_error.is_some()));

        let succeeded = outcomes_for(&outcomes, "good");
        assert_eq!(succeeded.len(), 2);
        assert!(succeeded.iter().all(|o| o.status == DispatchStatus::Succeeded));
        assert!(succeeded.iter().all(|o| o.attempts == 1));
    }

    #[tokio::test]
    async fn test_retry_bound_exact() {
        let target = MockTarget::new("flaky", Behavior::Fail);
        let dispatcher = Dispatcher::new(test_config(3), vec![target.clone()]).unwrap();

        let outcomes = dispatcher.dispatch(&requests(&["a.csv"])).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, DispatchStatus::Failed);
        assert_eq!(outcomes[0].attempts, 3);
        // No further calls after the third attempt
        assert_eq!(target.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_recovers_after_transient_failure() {
        let target = MockTarget::new("flaky", Behavior::FailFirst(1));
        let dispatcher = Dispatcher::new(test_config(3), vec![target.clone()]).unwrap();

        let outcomes = dispatcher.dispatch(&requests(&["a.csv"])).await.unwrap();
        assert_eq!(outcomes[0].status, DispatchStatus::Succeeded);
        assert_eq!(outcomes[0].attempts, 2);
        assert_eq!(target.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_misconfigured_target_skipped_without_retry() {
        let target = MockTarget::new("broken", Behavior::Misconfigured);
        let dispatcher = Dispatcher::new(test_config(3), vec![target.clone()]).unwrap();

        let outcomes = dispatcher.dispatch(&requests(&["a.csv"])).await.unwrap();
        assert_eq!(outcomes[0].status, DispatchStatus::Skipped);
        assert_eq!(outcomes[0].attempts, 0);
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
        assert!(outcomes[0]
            .last_error
            .as_deref()
            .unwrap()
            .contains("unknown deployment"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_deadline_skips_in_flight_pairs() {
        let hang = MockTarget::new("slow", Behavior::Hang);
        let config = DispatchConfig {
            batch_deadline_secs: 1,
            ..test_config(2)
        };
        let dispatcher = Dispatcher::new(config, vec![hang]).unwrap();

        let outcomes = dispatcher.dispatch(&requests(&["a.csv"])).await.unwrap();
        assert_eq!(outcomes[0].status, DispatchStatus::Skipped);
        assert_eq!(
            outcomes[0].last_error.as_deref(),
            Some("batch deadline exceeded")
        );
    }

    #[tokio::test]
    async fn test_outcomes_indexable_by_pair() {
        let a = MockTarget::new("a", Behavior::Succeed);
        let b = MockTarget::new("b", Behavior::Succeed);
        let dispatcher = Dispatcher::new(test_config(1), vec![a, b]).unwrap();

        let reqs = requests(&["x.csv", "y.csv"]);
        let outcomes = dispatcher.dispatch(&reqs).await.unwrap();

        // Completion order is unspecified; every (identity, target)
        // pair must be present exactly once.
        for request in &reqs {
            for target in ["a", "b"] {
                let count = outcomes
                    .iter()
                    .filter(|o| o.identity == request.identity && o.target == target)
                    .count();
                assert_eq!(count, 1);
            }
        }
    }
}
