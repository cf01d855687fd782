use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::{DatabaseError, ValidationError};
use notifier::NotifierError;
use orchestrator::OrchestratorError;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid webhook signature")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Notifier(#[from] NotifierError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Orchestrator(OrchestratorError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Orchestrator(OrchestratorError::InvalidConfirmation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "API_REQUEST_FAILED");
            "Internal server error".to_string()
        } else {
            warn!(status = status.as_u16(), error = %self, "API_REQUEST_REJECTED");
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
