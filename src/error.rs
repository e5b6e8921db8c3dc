use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Faults inside the gate itself. Callers must deny the request on any of these.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("clock unavailable: {0}")]
    Clock(String),
    // MemoryStore never fails, shared or remote StateStore backends report here
    #[error("state store failure: {0}")]
    Store(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("api key must not be empty")]
    EmptySecret,
    #[error("rate limit must be at least 1")]
    ZeroRateLimit,
    #[error("time window must be at least 1 second")]
    ZeroWindow,
    #[error("alert threshold must be at least 1")]
    ZeroAlertThreshold,
    #[error("block duration must be at least 1 second")]
    ZeroBlockDuration,
    #[error("{name} of {secs} seconds is out of range")]
    DurationOutOfRange { name: &'static str, secs: u64 },
    #[error("invalid header name: {0:?}")]
    InvalidHeader(String),
    #[error("cannot open audit log: {0}")]
    AuditLog(#[from] std::io::Error),
    #[error("cannot install log subscriber: {0}")]
    Logging(String),
}

// Denials as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized,
    Blocked,
    TooManyRequests { retry_after_secs: u64 },
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Blocked => StatusCode::FORBIDDEN,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "Unauthorized",
            ApiError::Blocked => "API key temporarily blocked",
            ApiError::TooManyRequests { .. } => "Too many requests",
            ApiError::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.detail().to_string(),
        };
        let mut response = (self.status(), Json(body)).into_response();

        if let ApiError::TooManyRequests { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}
