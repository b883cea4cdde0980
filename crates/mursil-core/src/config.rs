//! Configuration for Mursil
//!
//! Built once at startup (file, environment, CLI overrides) and shared
//! read-only for the process lifetime. No component reads ambient
//! process state after this point.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::identity::IdentityMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MursilConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub targets: TargetsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MursilConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InvalidConfig(format!("failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MURSIL_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("MURSIL_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(secret) = std::env::var("MURSIL_SHARED_SECRET") {
            config.auth.shared_secret = Some(secret);
        }
        if let Ok(mode) = std::env::var("MURSIL_IDENTITY_MODE") {
            if let Ok(m) = mode.parse() {
                config.identity.mode = m;
            }
        }
        if let Ok(len) = std::env::var("MURSIL_IDENTITY_LENGTH") {
            if let Ok(l) = len.parse() {
                config.identity.length = l;
            }
        }
        if let Ok(timeout) = std::env::var("MURSIL_DISPATCH_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                config.dispatch.timeout_secs = t;
            }
        }
        if let Ok(attempts) = std::env::var("MURSIL_DISPATCH_MAX_ATTEMPTS") {
            if let Ok(a) = attempts.parse() {
                config.dispatch.max_attempts = a;
            }
        }
        if let Ok(limit) = std::env::var("MURSIL_DISPATCH_CONCURRENCY") {
            if let Ok(c) = limit.parse() {
                config.dispatch.concurrency = c;
            }
        }
        if let Ok(level) = std::env::var("MURSIL_LOG_LEVEL") {
            config.logging.level = level;
        }

        // Prefect target from environment
        if let Ok(api_url) = std::env::var("MURSIL_PREFECT_API") {
            let mut prefect = PrefectConfig {
                api_url,
                ..Default::default()
            };
            if let Ok(id) = std::env::var("MURSIL_PREFECT_DEPLOYMENT_ID") {
                prefect.deployment_id = Some(id);
            }
            if let Ok(flow) = std::env::var("MURSIL_PREFECT_FLOW_NAME") {
                prefect.flow_name = Some(flow);
            }
            if let Ok(name) = std::env::var("MURSIL_PREFECT_DEPLOYMENT_NAME") {
                prefect.deployment_name = Some(name);
            }
            if let Ok(key) = std::env::var("MURSIL_PREFECT_API_KEY") {
                prefect.api_key = Some(key);
            }
            config.targets.prefect = Some(prefect);
        }

        // Airflow target from environment
        if let Ok(base_url) = std::env::var("MURSIL_AIRFLOW_BASE_URL") {
            let mut airflow = AirflowConfig {
                base_url,
                ..Default::default()
            };
            if let Ok(dag) = std::env::var("MURSIL_AIRFLOW_DAG_ID") {
                airflow.dag_id = dag;
            }
            if let Ok(user) = std::env::var("MURSIL_AIRFLOW_USERNAME") {
                airflow.username = user;
            }
            if let Ok(pass) = std::env::var("MURSIL_AIRFLOW_PASSWORD") {
                airflow.password = pass;
            }
            config.targets.airflow = Some(airflow);
        }

        config
    }

    /// Validate the assembled configuration before the server starts.
    ///
    /// Unknown identity modes and absurd retry/length settings are
    /// startup errors, never per-call failures.
    pub fn validate(&self) -> crate::Result<()> {
        if self.identity.length == 0 || self.identity.length > 64 {
            return Err(crate::Error::InvalidConfig(
                "identity length must be between 1 and 64".into(),
            ));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(crate::Error::InvalidConfig(
                "dispatch max_attempts must be at least 1".into(),
            ));
        }
        if self.dispatch.concurrency == 0 {
            return Err(crate::Error::InvalidConfig(
                "dispatch concurrency must be at least 1".into(),
            ));
        }
        if self.targets.is_empty() {
            return Err(crate::Error::NoTargets);
        }
        if let Some(ref prefect) = self.targets.prefect {
            prefect.validate()?;
        }
        if let Some(ref airflow) = self.targets.airflow {
            airflow.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8090,
        }
    }
}

/// Ingress authentication
///
/// No secret configured means open mode: every caller is authorized.
/// That is an explicit opt-in for trusted-network deployments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub shared_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub mode: IdentityMode,
    pub length: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            mode: IdentityMode::HashPrefix,
            length: crate::DEFAULT_IDENTITY_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Total attempts per (request, target) pair, including the first
    pub max_attempts: u32,
    /// Delay policy between attempts
    pub backoff: BackoffPolicy,
    /// Maximum concurrent outbound trigger calls
    pub concurrency: usize,
    /// Upper bound on total dispatch time for one batch, in seconds
    pub batch_deadline_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            connect_timeout_secs: 2,
            max_attempts: 2,
            backoff: BackoffPolicy::default(),
            concurrency: 8,
            batch_deadline_secs: 30,
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_secs)
    }
}

/// Delay policy between retry attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    pub kind: BackoffKind,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    None,
    Fixed,
    Exponential,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            kind: BackoffKind::Fixed,
            base_delay_ms: 500,
        }
    }
}

impl BackoffPolicy {
    /// Delay to apply after `failed_attempts` failures (1-based)
    pub fn delay(&self, failed_attempts: u32) -> Duration {
        match self.kind {
            BackoffKind::None => Duration::ZERO,
            BackoffKind::Fixed => Duration::from_millis(self.base_delay_ms),
            BackoffKind::Exponential => {
                let factor = 2u64.saturating_pow(failed_attempts.saturating_sub(1));
                Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
            }
        }
    }
}

/// Downstream trigger targets, read-only after startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsConfig {
    pub prefect: Option<PrefectConfig>,
    pub airflow: Option<AirflowConfig>,
}

impl TargetsConfig {
    pub fn is_empty(&self) -> bool {
        self.prefect.is_none() && self.airflow.is_none()
    }
}

/// Prefect deployment-trigger target
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrefectConfig {
    /// Prefect API base URL, e.g. http://prefect:4200/api
    pub api_url: String,
    /// Literal deployment id; skips name resolution when set
    pub deployment_id: Option<String>,
    /// Flow name for deployment resolution
    pub flow_name: Option<String>,
    /// Deployment name for deployment resolution
    pub deployment_name: Option<String>,
    /// Optional API key sent as a bearer token
    pub api_key: Option<String>,
}

impl PrefectConfig {
    pub fn validate(&self) -> crate::Result<()> {
        url::Url::parse(&self.api_url).map_err(|e| {
            crate::Error::InvalidConfig(format!("invalid prefect api_url: {}", e))
        })?;
        let named = self.flow_name.is_some() && self.deployment_name.is_some();
        if self.deployment_id.is_none() && !named {
            return Err(crate::Error::InvalidConfig(
                "prefect target needs deployment_id or flow_name + deployment_name".into(),
            ));
        }
        Ok(())
    }
}

/// Airflow DAG-run target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirflowConfig {
    /// Airflow base URL, e.g. http://airflow:8080
    pub base_url: String,
    /// DAG to trigger
    pub dag_id: String,
    pub username: String,
    pub password: String,
}

impl Default for AirflowConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            dag_id: "object_scan".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl AirflowConfig {
    pub fn validate(&self) -> crate::Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            crate::Error::InvalidConfig(format!("invalid airflow base_url: {}", e))
        })?;
        if self.dag_id.is_empty() {
            return Err(crate::Error::InvalidConfig(
                "airflow target needs a dag_id".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
