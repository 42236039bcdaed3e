use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

/// Failures surfaced by helpdesk operations.
///
/// `NotFound` covers both "absent" and "owned by another organization"; the
/// caller cannot tell the two apart.
#[derive(Debug, thiserror::Error)]
pub enum HelpdeskError {
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Authorization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Persistence(String),
}

impl HelpdeskError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn ticket_not_found() -> Self {
        Self::NotFound("Ticket not found".to_string())
    }
}

impl IntoResponse for HelpdeskError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Persistence(msg) = &self {
            error!("Persistence failure: {msg}");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub type HelpdeskResult<T> = Result<T, HelpdeskError>;
