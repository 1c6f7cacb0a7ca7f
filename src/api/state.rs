use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::supervisor::Orchestrator;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// The running orchestrator; owns the registry and event store
    pub orchestrator: Arc<Orchestrator>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            start_time: Utc::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
