use crate::pipeline::{StorageError, ValidationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Errors returned by the HTTP surface
#[derive(Debug)]
pub enum AppError {
    /// Malformed query parameters or request body
    BadRequest(String),
    /// A log event failed validation
    Validation(ValidationError),
    /// The store rejected a row
    Constraint(String),
    /// The store could not be reached
    StoreUnavailable(String),
    /// Internal server error
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::Validation(err) => write!(f, "Validation failed: {}", err),
            Self::Constraint(msg) => write!(f, "Rejected by store: {}", msg),
            Self::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Constraint(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::StoreUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::BadRequest(_) => "bad_request",
        AppError::Validation(_) => "validation_error",
        AppError::Constraint(_) => "constraint_violation",
        AppError::StoreUnavailable(_) => "store_unavailable",
        AppError::InternalError(_) => "internal_error",
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Constraint(msg) | StorageError::Encoding(msg) => Self::Constraint(msg),
            StorageError::Unavailable(msg) => Self::StoreUnavailable(msg),
            StorageError::Database(msg) => Self::InternalError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AppError::Validation(ValidationError::MissingLevel);
        assert_eq!(error.to_string(), "Validation failed: log event has no level");
    }

    #[test]
    fn test_error_type_name() {
        assert_eq!(error_type_name(&AppError::BadRequest("x".to_string())), "bad_request");
        assert_eq!(
            error_type_name(&AppError::from(StorageError::Unavailable("down".to_string()))),
            "store_unavailable"
        );
    }

    #[tokio::test]
    async fn test_error_response() {
        let response = AppError::Validation(ValidationError::EmptyMessage).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::from(StorageError::Unavailable("down".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
