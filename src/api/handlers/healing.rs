use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::api::{state::AppState, types::*};
use crate::domain::RemediationAction;
use crate::error::Result;

/// GET /api/healing/events
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>> {
    let limit = query.limit();
    let offset = query.offset();
    let events = state.orchestrator.events(limit, offset).await?;

    Ok(Json(EventsResponse {
        count: events.len(),
        events,
        limit,
        offset,
    }))
}

/// POST /api/healing/trigger/:name
///
/// Accepted as soon as the in-progress guard is taken; the event is
/// appended when the action finishes.
pub async fn trigger_remediation(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<TriggerRequest>,
) -> Result<(StatusCode, Json<TriggerResponse>)> {
    let action: RemediationAction = req.action.parse()?;
    let handle = state.orchestrator.trigger(&name, action).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "accepted".to_string(),
            dependency: handle.dependency().to_string(),
            action: handle.action(),
            requested_at: Utc::now(),
        }),
    ))
}
