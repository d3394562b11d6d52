use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use formgate_intake::SubmitError;
use formgate_shared::form::ValidationError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Submission timed out")]
    Timeout,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Validation(err) => AppError::Validation(err),
            SubmitError::Timeout(_) => AppError::Timeout,
            SubmitError::Internal(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<formgate_shared::Error> for AppError {
    fn from(err: formgate_shared::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(ValidationError::MissingField(field)) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Missing required fields", "field": field}),
            ),
            AppError::Validation(ValidationError::MalformedField(field)) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid field", "field": field}),
            ),
            AppError::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid request body", "reason": reason}),
            ),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, json!({"error": message})),
            AppError::Timeout => {
                tracing::error!("Submission admission timed out");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Submission could not be processed in time"}),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error while handling submission");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Internal server error"}),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
