//! Error types for the Lead API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use murshid_lead_core::LeadError;
use murshid_types::api::ApiErrorBody;
use murshid_types::FieldError;

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Too many requests")]
    RateLimited,

    #[error("Upstream timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LeadError> for ApiError {
    fn from(e: LeadError) -> Self {
        match e {
            LeadError::Validation(errors) => Self::Validation(errors),
            LeadError::RateLimited => Self::RateLimited,
            LeadError::StoreTimeout(_) => Self::Timeout,
            // Surface the upstream's own message when it rejected the call.
            LeadError::StoreRejected(message) => Self::Internal(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if matches!(self, Self::Internal(_) | Self::Timeout) {
            tracing::error!(error = ?self, "Internal API error");
        }

        let body = match self {
            Self::Validation(errors) => {
                ApiErrorBody::with_fields("Validation failed", errors)
            }
            Self::BadRequest(message) => ApiErrorBody::new(message),
            Self::RateLimited => {
                ApiErrorBody::new("Too many requests, please try again later")
            }
            Self::Timeout => ApiErrorBody::new("Upstream timeout, please try again"),
            Self::Internal(message) => ApiErrorBody::new(message),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
