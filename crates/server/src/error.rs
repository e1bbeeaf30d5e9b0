use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::warn;

use medvoice_core::errors::{ApplicationError, InterfaceError};
use medvoice_db::RepositoryError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_providers: Option<Vec<String>>,
    pub correlation_id: String,
}

/// JSON error response. 4xx bodies carry the specific message; 5xx bodies
/// carry the user-safe text unless a handler opts into an `error` detail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, correlation_id: &str) -> Self {
        Self {
            status,
            body: ErrorBody {
                message: message.into(),
                error: None,
                available_providers: None,
                correlation_id: correlation_id.to_string(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, correlation_id)
    }

    pub fn not_found(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, correlation_id)
    }

    pub fn internal(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, correlation_id)
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.body.error = Some(error.into());
        self
    }

    pub fn with_available_providers(mut self, providers: Vec<String>) -> Self {
        self.body.available_providers = Some(providers);
        self
    }

    pub fn repository(error: RepositoryError, correlation_id: &str) -> Self {
        warn!(
            event_name = "api.repository.failed",
            correlation_id,
            error = %error,
            "repository call failed"
        );
        ApplicationError::from(error).into_interface(correlation_id).into()
    }
}

impl From<InterfaceError> for ApiError {
    fn from(value: InterfaceError) -> Self {
        let status = match value {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status.is_server_error() {
            value.user_message().to_string()
        } else {
            value.message().to_string()
        };
        Self::new(status, message, value.correlation_id())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
