use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{RemediationAction, RemediationEvent};

// ============================================================================
// System Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: i64,
    pub cycle: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Healing Types
// ============================================================================

pub const DEFAULT_EVENTS_LIMIT: usize = 50;
pub const MAX_EVENTS_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl EventsQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_EVENTS_LIMIT).min(MAX_EVENTS_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<RemediationEvent>,
    pub count: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: String,
    pub dependency: String,
    pub action: RemediationAction,
    pub requested_at: DateTime<Utc>,
}

// ============================================================================
// Dependency Types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDependencyRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub degraded_latency_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_query_caps_limit() {
        let query = EventsQuery {
            limit: Some(10_000),
            offset: None,
        };
        assert_eq!(query.limit(), MAX_EVENTS_LIMIT);
        assert_eq!(query.offset(), 0);
        assert_eq!(EventsQuery::default().limit(), DEFAULT_EVENTS_LIMIT);
    }
}
