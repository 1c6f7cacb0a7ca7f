//! Remediation Policy
//!
//! Maps one dependency's latest sample and breaker state to a single
//! remediation action. Deterministic and side-effect free; the
//! orchestrator executes whatever it returns.

use std::time::Duration;

use crate::coordination::CircuitState;
use crate::domain::{HealthSample, HealthStatus, IssueType, RemediationAction};

/// Thresholds driving the decision rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Unhealthy samples slower than this get a cache clear
    pub unhealthy_latency: Duration,
    /// Degraded samples slower than this get a preventive cache clear
    pub degraded_latency: Duration,
    /// Lowercase error substrings that identify a connection failure
    pub restart_signatures: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            unhealthy_latency: Duration::from_secs(10),
            degraded_latency: Duration::from_secs(5),
            restart_signatures: vec![
                "connection".to_string(),
                "refused".to_string(),
                "reset by peer".to_string(),
            ],
        }
    }
}

/// Action chosen for a dependency, with the issue that justified it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: RemediationAction,
    pub issue: IssueType,
}

impl Decision {
    fn none(issue: IssueType) -> Self {
        Self {
            action: RemediationAction::None,
            issue,
        }
    }
}

/// Rule set mapping health to remediation
#[derive(Debug, Clone, Default)]
pub struct RemediationPolicy {
    config: PolicyConfig,
}

impl RemediationPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Choose the action for one dependency. First matching rule wins:
    ///
    /// 1. breaker open, nothing attempted this cycle: circuit break
    /// 2. unhealthy with a connection-failure error: restart
    /// 3. unhealthy and slower than `unhealthy_latency`: clear cache
    /// 4. degraded and slower than `degraded_latency`: clear cache
    /// 5. otherwise nothing
    pub fn decide(
        &self,
        sample: &HealthSample,
        breaker: CircuitState,
        attempted_this_cycle: bool,
    ) -> Decision {
        if breaker == CircuitState::Open && !attempted_this_cycle {
            return Decision {
                action: RemediationAction::CircuitBreak,
                issue: IssueType::CircuitOpen,
            };
        }

        match sample.status {
            HealthStatus::Unhealthy => {
                let issue = IssueType::ServiceUnhealthy;
                if self.is_connection_failure(sample) {
                    Decision {
                        action: RemediationAction::Restart,
                        issue,
                    }
                } else if sample.latency > self.config.unhealthy_latency {
                    Decision {
                        action: RemediationAction::ClearCache,
                        issue,
                    }
                } else {
                    Decision::none(issue)
                }
            }
            HealthStatus::Degraded if sample.latency > self.config.degraded_latency => Decision {
                action: RemediationAction::ClearCache,
                issue: IssueType::ServiceDegraded,
            },
            HealthStatus::Degraded => Decision::none(IssueType::ServiceDegraded),
            HealthStatus::Healthy | HealthStatus::Unknown => Decision::none(IssueType::ServiceUnhealthy),
        }
    }

    fn is_connection_failure(&self, sample: &HealthSample) -> bool {
        let Some(error) = sample.error.as_deref() else {
            return false;
        };
        let error = error.to_ascii_lowercase();
        self.config
            .restart_signatures
            .iter()
            .any(|signature| error.contains(signature.as_str()))
    }
}
