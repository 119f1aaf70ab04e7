use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use llmgate_protocol::anthropic::{ErrorResponse, ErrorType};
use llmgate_transform::TranslateError;

use crate::router::RouteError;
use crate::upstream::UpstreamError;

/// Everything a request can fail with. Every variant renders as the
/// same client-dialect error envelope; callers never see provider wire
/// formats or transport internals.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request body is not a valid message request: {0}")]
    BadRequest(#[from] serde_json::Error),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("stream ended before the final message event")]
    StreamTerminated,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Route(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Upstream(err) => upstream_status(err),
            GatewayError::Translate(_) => StatusCode::BAD_GATEWAY,
            GatewayError::StreamTerminated => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            GatewayError::BadRequest(_) => ErrorType::InvalidRequestError,
            GatewayError::Route(_) => ErrorType::ApiError,
            GatewayError::Upstream(err) => upstream_error_type(err),
            GatewayError::Translate(_) => ErrorType::ApiError,
            GatewayError::StreamTerminated => ErrorType::ApiError,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.error_type(), self.to_string())
    }
}

fn upstream_status(err: &UpstreamError) -> StatusCode {
    match err {
        UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        UpstreamError::Connect(_) => StatusCode::BAD_GATEWAY,
        UpstreamError::Status { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        UpstreamError::MalformedBody(_) => StatusCode::BAD_GATEWAY,
    }
}

fn upstream_error_type(err: &UpstreamError) -> ErrorType {
    match err {
        UpstreamError::Timeout(_) => ErrorType::ApiError,
        UpstreamError::Connect(_) => ErrorType::ApiError,
        UpstreamError::Status { status, .. } => match status {
            400 => ErrorType::InvalidRequestError,
            401 | 403 => ErrorType::AuthenticationError,
            404 => ErrorType::NotFoundError,
            429 => ErrorType::RateLimitError,
            529 => ErrorType::OverloadedError,
            _ => ErrorType::ApiError,
        },
        UpstreamError::MalformedBody(_) => ErrorType::ApiError,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_error_response())).into_response()
    }
}
