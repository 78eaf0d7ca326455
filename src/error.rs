use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Boundary failures of the series aligner.
#[derive(Debug, Error, PartialEq)]
pub enum AlignError {
    #[error("expected an array of per-variable arrays, got {0}")]
    NotArrayOfArrays(&'static str),
    #[error("series {series}, point {index}: {reason}")]
    InvalidPoint {
        series: usize,
        index: usize,
        reason: String,
    },
    #[error("tolerance_ms must be > 0, got {0}")]
    InvalidTolerance(i64),
    #[error("alignment would produce more than {limit} rows; use a larger tolerance_ms")]
    TooManyRows { limit: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("topic {0:?} must have 4 segments: user/device/variable/kind")]
    Malformed(String),
    #[error("topic {topic:?} has an empty {segment} segment")]
    EmptySegment {
        topic: String,
        segment: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("MQTT error: {0}")]
    Mqtt(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Topic(#[from] TopicError),
}

/// Errors returned by HTTP handlers; rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Align(#[from] AlignError),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Align(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unavailable(ref msg) => {
                tracing::error!("Unavailable: {}", msg);
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
