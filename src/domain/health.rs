use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Health classification of a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    /// Registered but never probed. Probes never produce this.
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Gauge value used by the metrics endpoint
    pub fn gauge(&self) -> i8 {
        match self {
            HealthStatus::Healthy => 1,
            HealthStatus::Degraded => 0,
            HealthStatus::Unhealthy => -1,
            HealthStatus::Unknown => -2,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One probe outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    pub dependency: String,
    pub status: HealthStatus,
    #[serde(rename = "latency_ms", with = "super::duration_ms")]
    pub latency: Duration,
    pub checked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl HealthSample {
    pub fn new(dependency: impl Into<String>, status: HealthStatus, latency: Duration) -> Self {
        Self {
            dependency: dependency.into(),
            status,
            latency,
            checked_at: Utc::now(),
            error: None,
            status_code: None,
        }
    }

    pub fn healthy(dependency: impl Into<String>, latency: Duration) -> Self {
        Self::new(dependency, HealthStatus::Healthy, latency)
    }

    pub fn degraded(dependency: impl Into<String>, latency: Duration) -> Self {
        Self::new(dependency, HealthStatus::Degraded, latency)
    }

    pub fn unhealthy(
        dependency: impl Into<String>,
        latency: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self::new(dependency, HealthStatus::Unhealthy, latency).with_error(error)
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = checked_at;
        self
    }

    /// Fields copied into a remediation event's detail map
    pub fn details(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut details = serde_json::Map::new();
        details.insert("status".into(), self.status.as_str().into());
        details.insert("latency_ms".into(), (self.latency.as_millis() as u64).into());
        details.insert("checked_at".into(), self.checked_at.to_rfc3339().into());
        if let Some(ref error) = self.error {
            details.insert("error".into(), error.clone().into());
        }
        if let Some(code) = self.status_code {
            details.insert("status_code".into(), code.into());
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Unhealthy).unwrap();
        assert_eq!(json, "\"unhealthy\"");
    }

    #[test]
    fn test_sample_details() {
        let sample = HealthSample::unhealthy("cache", Duration::from_millis(40), "connection failed")
            .with_status_code(502);
        let details = sample.details();
        assert_eq!(details["status"], "unhealthy");
        assert_eq!(details["latency_ms"], 40);
        assert_eq!(details["error"], "connection failed");
        assert_eq!(details["status_code"], 502);
    }

    #[test]
    fn test_healthy_sample_omits_error() {
        let json = serde_json::to_value(HealthSample::healthy("x", Duration::from_millis(3))).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["latency_ms"], 3);
    }
}
