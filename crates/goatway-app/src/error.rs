use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Every leaf error in this crate funnels through here on its way to the
/// client, so the `{"error":{...}}` envelope only needs to be built once.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: &'static str,
    pub message: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            message: message.into(),
            param: None,
            code: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request_error", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "authentication_error", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "permission_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found_error", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "rate_limit_error", message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(ErrorEnvelope {
                error: ErrorBody {
                    message: self.message,
                    error_type: self.error_type.to_string(),
                    param: self.param,
                    code: self.code,
                },
            }),
        )
            .into_response();
        if self.status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("60"));
        }
        response
    }
}

impl From<goatway_auth::AuthError> for ApiError {
    fn from(e: goatway_auth::AuthError) -> Self {
        use goatway_auth::AuthError::*;
        match e {
            InvalidApiKey => ApiError::unauthorized("invalid API key"),
            ApiKeyDisabled => ApiError::unauthorized("API key is disabled"),
            ApiKeyExpired => ApiError::unauthorized("API key has expired"),
            CredentialNotFound(name) => ApiError::not_found(format!("no such credential: {name}")),
            RateLimited => ApiError::rate_limited("rate limit exceeded"),
            Storage(e) => e.into(),
            Crypto(e) => ApiError::server_error(e.to_string()),
        }
    }
}

impl From<goatway_storage::StorageError> for ApiError {
    fn from(e: goatway_storage::StorageError) -> Self {
        use goatway_storage::StorageError::*;
        match e {
            NotFound => ApiError::not_found("not found"),
            DuplicateKey(msg) => ApiError::bad_request(format!("duplicate key: {msg}")),
            InvalidInput(msg) => ApiError::bad_request(msg),
            Closed | Sqlite(_) => ApiError::server_error(e.to_string()),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
