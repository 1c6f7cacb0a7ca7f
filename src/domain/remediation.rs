use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::VigilError;

/// Corrective operation the orchestrator can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    Restart,
    ClearCache,
    CircuitBreak,
    None,
}

impl RemediationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationAction::Restart => "restart",
            RemediationAction::ClearCache => "clear_cache",
            RemediationAction::CircuitBreak => "circuit_break",
            RemediationAction::None => "none",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RemediationAction::None)
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemediationAction {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "restart" => Ok(RemediationAction::Restart),
            "clear_cache" | "cache_clear" => Ok(RemediationAction::ClearCache),
            "circuit_break" => Ok(RemediationAction::CircuitBreak),
            "none" => Ok(RemediationAction::None),
            other => Err(VigilError::InvalidAction(other.to_string())),
        }
    }
}

/// Why a remediation was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    ServiceUnhealthy,
    /// Preventive maintenance of a slow but answering dependency
    ServiceDegraded,
    CircuitOpen,
    ManualTrigger,
    /// The executor raised instead of reporting an outcome
    RemediationError,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::ServiceUnhealthy => "service_unhealthy",
            IssueType::ServiceDegraded => "service_degraded",
            IssueType::CircuitOpen => "circuit_open",
            IssueType::ManualTrigger => "manual_trigger",
            IssueType::RemediationError => "remediation_error",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one remediation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationEvent {
    pub id: Uuid,
    pub dependency: String,
    pub issue: IssueType,
    pub action: RemediationAction,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl RemediationEvent {
    pub fn new(
        dependency: impl Into<String>,
        issue: IssueType,
        action: RemediationAction,
        success: bool,
        details: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            dependency: dependency.into(),
            issue,
            action,
            success,
            timestamp: Utc::now(),
            details,
        }
    }
}
