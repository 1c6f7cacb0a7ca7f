use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::time::Duration;

use crate::api::{state::AppState, types::*};
use crate::coordination::CircuitBreakerState;
use crate::domain::DependencyDescriptor;
use crate::error::{Result, VigilError};
use crate::monitor::DependencySnapshot;

/// GET /api/dependencies
pub async fn list_dependencies(State(state): State<AppState>) -> Json<Vec<DependencySnapshot>> {
    Json(state.orchestrator.snapshot().await.dependencies)
}

/// POST /api/dependencies
pub async fn register_dependency(
    State(state): State<AppState>,
    Json(req): Json<RegisterDependencyRequest>,
) -> Result<(StatusCode, Json<DependencyDescriptor>)> {
    let mut descriptor = DependencyDescriptor::parse(req.name.trim(), &req.url)?;
    if let Some(ms) = req.timeout_ms {
        if ms == 0 {
            return Err(VigilError::InvalidConfig(vec![
                "timeout_ms must be positive".to_string(),
            ]));
        }
        descriptor = descriptor.with_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = req.degraded_latency_ms {
        descriptor = descriptor.with_degraded_latency(Duration::from_millis(ms));
    }

    state
        .orchestrator
        .register_dependency(descriptor.clone())
        .await?;
    Ok((StatusCode::CREATED, Json(descriptor)))
}

/// DELETE /api/dependencies/:name
pub async fn deregister_dependency(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    state.orchestrator.deregister_dependency(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/dependencies/:name/reset
pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CircuitBreakerState>> {
    Ok(Json(state.orchestrator.reset_breaker(&name).await?))
}
