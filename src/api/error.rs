use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::api::types::ErrorResponse;
use crate::error::VigilError;

impl VigilError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VigilError::DependencyNotFound(_) => StatusCode::NOT_FOUND,
            VigilError::DependencyExists(_) | VigilError::RemediationInProgress(_) => {
                StatusCode::CONFLICT
            }
            VigilError::InvalidAction(_)
            | VigilError::InvalidConfig(_)
            | VigilError::Url(_)
            | VigilError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for VigilError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("API request failed: {}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
