use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::coordination::CircuitBreakerConfig;
use crate::domain::DependencyDescriptor;
use crate::error::{Result, VigilError};
use crate::supervisor::PolicyConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub policy: PolicySettings,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub event_store: EventStoreConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Monitored services
    #[serde(default)]
    pub dependencies: Vec<DependencyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds between probe/remediation cycles
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
}

fn default_cycle_interval() -> u64 {
    30
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Default probe timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
    /// 2xx responses slower than this are degraded
    #[serde(default = "default_degraded_latency")]
    pub degraded_latency_ms: u64,
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_degraded_latency() -> u64 {
    5_000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
            degraded_latency_ms: default_degraded_latency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive unhealthy probes before opening
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds an open breaker waits before allowing a trial probe
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    60
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
        }
    }
}

impl BreakerConfig {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySettings {
    /// Unhealthy samples slower than this get a cache clear
    #[serde(default = "default_unhealthy_latency")]
    pub unhealthy_latency_ms: u64,
    /// Degraded samples slower than this get a preventive cache clear
    #[serde(default = "default_degraded_latency")]
    pub degraded_latency_ms: u64,
    /// Error substrings that identify a connection failure
    #[serde(default = "default_restart_signatures")]
    pub restart_signatures: Vec<String>,
}

fn default_unhealthy_latency() -> u64 {
    10_000
}

fn default_restart_signatures() -> Vec<String> {
    vec![
        "connection".to_string(),
        "refused".to_string(),
        "reset by peer".to_string(),
    ]
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            unhealthy_latency_ms: default_unhealthy_latency(),
            degraded_latency_ms: default_degraded_latency(),
            restart_signatures: default_restart_signatures(),
        }
    }
}

impl PolicySettings {
    pub fn to_policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            unhealthy_latency: Duration::from_millis(self.unhealthy_latency_ms),
            degraded_latency: Duration::from_millis(self.degraded_latency_ms),
            restart_signatures: self
                .restart_signatures
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Log the action and report success
    #[default]
    Log,
    /// Call the deployment platform / cache service over HTTP
    Http,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub kind: ExecutorKind,
    /// Restart endpoint, `{name}` is replaced by the dependency name
    #[serde(default)]
    pub restart_url: Option<String>,
    /// Cache invalidation endpoint, `{name}` is replaced by the dependency name
    #[serde(default)]
    pub cache_clear_url: Option<String>,
    /// Optional webhook notified when a circuit is broken
    #[serde(default)]
    pub alert_url: Option<String>,
    /// Timeout for executor HTTP calls
    #[serde(default = "default_executor_timeout")]
    pub timeout_secs: u64,
    /// Seconds to wait after a restart before re-probing (0 = do not re-probe)
    #[serde(default = "default_restart_settle")]
    pub restart_settle_secs: u64,
}

fn default_executor_timeout() -> u64 {
    30
}

fn default_restart_settle() -> u64 {
    10
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::default(),
            restart_url: None,
            cache_clear_url: None,
            alert_url: None,
            timeout_secs: default_executor_timeout(),
            restart_settle_secs: default_restart_settle(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventStoreBackend {
    Memory,
    /// Append-only JSON lines file
    #[default]
    File,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventStoreConfig {
    #[serde(default)]
    pub backend: EventStoreBackend,
    /// JSON lines file for the `file` backend
    #[serde(default = "default_event_path")]
    pub path: String,
    /// PostgreSQL connection URL for the `postgres` backend
    #[serde(default)]
    pub database_url: Option<String>,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_event_path() -> String {
    "data/remediation_events.jsonl".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            backend: EventStoreBackend::default(),
            path: default_event_path(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_port() -> u16 {
    8007
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files (disabled when unset)
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info,vigil=debug,sqlx=warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    pub name: String,
    /// Base URL or full health endpoint URL
    pub url: String,
    /// Overrides `probe.timeout_secs`
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Overrides `probe.degraded_latency_ms`
    #[serde(default)]
    pub degraded_latency_ms: Option<u64>,
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info,vigil=debug,sqlx=warn")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("VIGIL_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (VIGIL_API__PORT, etc.)
            .add_source(
                Environment::with_prefix("VIGIL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Build the dependency descriptors, applying probe defaults
    pub fn descriptors(&self) -> Result<Vec<DependencyDescriptor>> {
        self.dependencies
            .iter()
            .map(|dep| {
                let timeout = dep.timeout_secs.unwrap_or(self.probe.timeout_secs);
                let degraded = dep
                    .degraded_latency_ms
                    .unwrap_or(self.probe.degraded_latency_ms);
                Ok(DependencyDescriptor::parse(&dep.name, &dep.url)?
                    .with_timeout(Duration::from_secs(timeout))
                    .with_degraded_latency(Duration::from_millis(degraded)))
            })
            .collect()
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.orchestrator.cycle_interval_secs)
    }

    /// Validate configuration values, collecting every problem
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.orchestrator.cycle_interval_secs == 0 {
            errors.push("orchestrator.cycle_interval_secs must be positive".to_string());
        }
        if self.probe.timeout_secs == 0 {
            errors.push("probe.timeout_secs must be positive".to_string());
        }
        if self.breaker.failure_threshold == 0 {
            errors.push("breaker.failure_threshold must be positive".to_string());
        }
        if self.policy.restart_signatures.iter().any(|s| s.trim().is_empty()) {
            errors.push("policy.restart_signatures must not contain empty entries".to_string());
        }

        if self.dependencies.is_empty() {
            errors.push("no dependencies configured".to_string());
        }

        let mut seen = HashSet::new();
        for dep in &self.dependencies {
            if !seen.insert(dep.name.as_str()) {
                errors.push(format!("duplicate dependency name: {}", dep.name));
            }
            if dep.timeout_secs == Some(0) {
                errors.push(format!("dependency {}: timeout_secs must be positive", dep.name));
            }
            if let Err(e) = DependencyDescriptor::parse(&dep.name, &dep.url) {
                errors.push(format!("dependency {}: {}", dep.name, e));
            }
        }

        if self.executor.kind == ExecutorKind::Http
            && self.executor.restart_url.is_none()
            && self.executor.cache_clear_url.is_none()
        {
            errors.push(
                "executor.kind = \"http\" needs restart_url or cache_clear_url".to_string(),
            );
        }

        match self.event_store.backend {
            EventStoreBackend::File if self.event_store.path.trim().is_empty() => {
                errors.push("event_store.path must be set for the file backend".to_string());
            }
            EventStoreBackend::Postgres if self.event_store.database_url.is_none() => {
                errors.push(
                    "event_store.database_url must be set for the postgres backend".to_string(),
                );
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VigilError::InvalidConfig(errors))
        }
    }
}
