//! Target adapters
//!
//! One adapter per scheduler type. Adapters own the wire shape of
//! their trigger call; the dispatcher stays target-agnostic.

pub mod airflow;
pub mod prefect;

use std::sync::Arc;

use mursil_core::config::TargetsConfig;

use crate::target::TriggerTarget;
pub use airflow::AirflowTarget;
pub use prefect::PrefectTarget;

/// Build the configured target set. Targets are immutable for the
/// process lifetime and shared across dispatch workers.
pub fn build_targets(config: &TargetsConfig) -> Vec<Arc<dyn TriggerTarget>> {
    let mut targets: Vec<Arc<dyn TriggerTarget>> = Vec::new();

    if let Some(ref prefect) = config.prefect {
        targets.push(Arc::new(PrefectTarget::new(prefect.clone())));
    }
    if let Some(ref airflow) = config.airflow {
        targets.push(Arc::new(AirflowTarget::new(airflow.clone())));
    }

    targets
}
