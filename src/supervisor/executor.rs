//! Remediation Executors
//!
//! Side effects behind the orchestrator's decisions. `Ok(false)` means
//! the action ran and did not help; `Err` means the executor itself
//! failed. Both end up as unsuccessful remediation events.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{ExecutorConfig, ExecutorKind};
use crate::domain::{HealthStatus, RemediationAction};
use crate::error::{Result, VigilError};
use crate::monitor::{HealthProbe, HealthRegistry};

/// Corrective operations, implemented by external collaborators
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemediationExecutor: Send + Sync {
    async fn restart(&self, dependency: &str) -> Result<bool>;
    async fn clear_cache(&self, dependency: &str) -> Result<bool>;
    async fn circuit_break(&self, dependency: &str) -> Result<bool>;
}

/// Dispatch `action` to the matching executor call
pub async fn execute_action(
    executor: &dyn RemediationExecutor,
    action: RemediationAction,
    dependency: &str,
) -> Result<bool> {
    match action {
        RemediationAction::Restart => executor.restart(dependency).await,
        RemediationAction::ClearCache => executor.clear_cache(dependency).await,
        RemediationAction::CircuitBreak => executor.circuit_break(dependency).await,
        RemediationAction::None => Err(VigilError::InvalidAction(action.to_string())),
    }
}

/// Executor that only logs; used for dry runs and as the default
#[derive(Debug, Clone, Default)]
pub struct LoggingExecutor;

#[async_trait]
impl RemediationExecutor for LoggingExecutor {
    async fn restart(&self, dependency: &str) -> Result<bool> {
        info!("Recovery action: restart {} (log only)", dependency);
        Ok(true)
    }

    async fn clear_cache(&self, dependency: &str) -> Result<bool> {
        info!("Recovery action: clear cache for {} (log only)", dependency);
        Ok(true)
    }

    async fn circuit_break(&self, dependency: &str) -> Result<bool> {
        warn!("Recovery action: circuit break {} (log only)", dependency);
        Ok(true)
    }
}

#[derive(Serialize)]
struct ActionRequest<'a> {
    dependency: &'a str,
    action: RemediationAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
}

#[derive(Serialize)]
struct AlertMessage {
    msg_type: &'static str,
    text: String,
}

/// Re-probes a dependency after a restart request
struct RestartVerifier {
    registry: Arc<HealthRegistry>,
    probe: Arc<dyn HealthProbe>,
    settle: Duration,
}

/// Executor that drives a deployment platform and cache service over HTTP.
///
/// URL templates may contain `{name}`, replaced by the dependency name.
pub struct HttpExecutor {
    client: Client,
    restart_url: Option<String>,
    cache_clear_url: Option<String>,
    alert_url: Option<String>,
    verifier: Option<RestartVerifier>,
}

impl HttpExecutor {
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            restart_url: config.restart_url.clone(),
            cache_clear_url: config.cache_clear_url.clone(),
            alert_url: config.alert_url.clone(),
            verifier: None,
        })
    }

    /// After a restart, wait `settle` and report success only if the
    /// dependency is no longer unhealthy
    pub fn with_restart_verification(
        mut self,
        registry: Arc<HealthRegistry>,
        probe: Arc<dyn HealthProbe>,
        settle: Duration,
    ) -> Self {
        self.verifier = Some(RestartVerifier {
            registry,
            probe,
            settle,
        });
        self
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<bool> {
        let resp = self.client.post(url).json(body).send().await?;
        if resp.status().is_success() {
            debug!("POST {} -> {}", url, resp.status());
            Ok(true)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("POST {} failed: {} - {}", url, status, body);
            Ok(false)
        }
    }

    async fn verify_restart(&self, dependency: &str) -> bool {
        let Some(ref verifier) = self.verifier else {
            return true;
        };
        let Some(descriptor) = verifier.registry.descriptor(dependency).await else {
            return true;
        };

        tokio::time::sleep(verifier.settle).await;
        let sample = verifier.probe.probe(&descriptor).await;
        info!("Post-restart probe of {}: {}", dependency, sample.status);
        sample.status != HealthStatus::Unhealthy
    }
}

fn render(template: &str, dependency: &str) -> String {
    template.replace("{name}", dependency)
}

#[async_trait]
impl RemediationExecutor for HttpExecutor {
    async fn restart(&self, dependency: &str) -> Result<bool> {
        let Some(ref template) = self.restart_url else {
            warn!("No restart endpoint configured, cannot restart {}", dependency);
            return Ok(false);
        };

        info!("Restarting service: {}", dependency);
        let request = ActionRequest {
            dependency,
            action: RemediationAction::Restart,
            pattern: None,
        };
        if !self.post(&render(template, dependency), &request).await? {
            return Ok(false);
        }
        Ok(self.verify_restart(dependency).await)
    }

    async fn clear_cache(&self, dependency: &str) -> Result<bool> {
        let Some(ref template) = self.cache_clear_url else {
            warn!("No cache endpoint configured, cannot clear cache for {}", dependency);
            return Ok(false);
        };

        info!("Clearing cache for service: {}", dependency);
        let request = ActionRequest {
            dependency,
            action: RemediationAction::ClearCache,
            pattern: Some(format!("cache:{}:*", dependency)),
        };
        self.post(&render(template, dependency), &request).await
    }

    async fn circuit_break(&self, dependency: &str) -> Result<bool> {
        warn!("Circuit breaker activated for {}", dependency);
        match self.alert_url {
            Some(ref template) => {
                let message = AlertMessage {
                    msg_type: "text",
                    text: format!("Circuit breaker OPEN for {}", dependency),
                };
                self.post(&render(template, dependency), &message).await
            }
            None => Ok(true),
        }
    }
}

/// Build the executor selected by configuration
pub fn build_executor(
    config: &ExecutorConfig,
    registry: Arc<HealthRegistry>,
    probe: Arc<dyn HealthProbe>,
) -> Result<Arc<dyn RemediationExecutor>> {
    match config.kind {
        ExecutorKind::Log => Ok(Arc::new(LoggingExecutor)),
        ExecutorKind::Http => {
            let mut executor = HttpExecutor::new(config)?;
            if config.restart_settle_secs > 0 {
                executor = executor.with_restart_verification(
                    registry,
                    probe,
                    Duration::from_secs(config.restart_settle_secs),
                );
            }
            Ok(Arc::new(executor))
        }
    }
}
