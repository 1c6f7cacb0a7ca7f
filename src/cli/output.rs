//! Output formatting for `vigil` client commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::domain::RemediationEvent;
use crate::monitor::DependencySnapshot;

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct DependencyRow {
    pub name: String,
    pub status: String,
    pub latency_ms: String,
    pub breaker: String,
    pub failures: u32,
    pub error: String,
}

impl From<&DependencySnapshot> for DependencyRow {
    fn from(dep: &DependencySnapshot) -> Self {
        let sample = dep.sample.as_ref();
        Self {
            name: dep.name.clone(),
            status: dep.status.to_string(),
            latency_ms: sample
                .map(|s| s.latency.as_millis().to_string())
                .unwrap_or_else(|| "-".to_string()),
            breaker: dep.breaker.state.to_string(),
            failures: dep.breaker.failure_count,
            error: sample
                .and_then(|s| s.error.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct EventRow {
    pub timestamp: String,
    pub dependency: String,
    pub issue: String,
    pub action: String,
    pub success: bool,
}

impl From<&RemediationEvent> for EventRow {
    fn from(event: &RemediationEvent) -> Self {
        Self {
            timestamp: event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            dependency: event.dependency.clone(),
            issue: event.issue.to_string(),
            action: event.action.to_string(),
            success: event.success,
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Print a single Serialize item as JSON.
pub fn print_item<T: Serialize>(item: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("\x1b[31m{msg}\x1b[0m");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{CircuitBreaker, CircuitBreakerConfig};
    use crate::domain::{HealthSample, HealthStatus};
    use std::time::Duration;

    #[test]
    fn test_dependency_row_for_never_probed() {
        let dep = DependencySnapshot {
            name: "llm-service".to_string(),
            endpoint: "http://llm-service:8006/health".parse().unwrap(),
            status: HealthStatus::Unknown,
            sample: None,
            breaker: CircuitBreaker::new("llm-service", CircuitBreakerConfig::default()).snapshot(),
        };
        let row = DependencyRow::from(&dep);
        assert_eq!(row.status, "unknown");
        assert_eq!(row.latency_ms, "-");
        assert_eq!(row.breaker, "closed");
    }

    #[test]
    fn test_dependency_row_with_sample() {
        let dep = DependencySnapshot {
            name: "storage-service".to_string(),
            endpoint: "http://storage-service:8004/health".parse().unwrap(),
            status: HealthStatus::Unhealthy,
            sample: Some(HealthSample::unhealthy(
                "storage-service",
                Duration::from_millis(42),
                "connection failed",
            )),
            breaker: CircuitBreaker::new("storage-service", CircuitBreakerConfig::default())
                .snapshot(),
        };
        let row = DependencyRow::from(&dep);
        assert_eq!(row.latency_ms, "42");
        assert_eq!(row.error, "connection failed");
    }
}
