use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorType {
    /// 400
    #[serde(rename = "invalid_request_error")]
    InvalidRequestError,
    /// 401
    #[serde(rename = "authentication_error")]
    AuthenticationError,
    /// 404
    #[serde(rename = "not_found_error")]
    NotFoundError,
    /// 429
    #[serde(rename = "rate_limit_error")]
    RateLimitError,
    /// 500
    #[serde(rename = "api_error")]
    ApiError,
    /// 529
    #[serde(rename = "overloaded_error")]
    OverloadedError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub r#type: ErrorType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub r#type: ErrorResponseType,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorResponseType {
    #[default]
    Error,
}

impl ErrorResponse {
    pub fn new(r#type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            r#type: ErrorResponseType::Error,
            error: ErrorDetail {
                r#type,
                message: message.into(),
            },
        }
    }
}
