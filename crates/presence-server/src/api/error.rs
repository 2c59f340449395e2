//! API error types and response handling.
//!
//! Handlers return [`ApiError`], which renders as a JSON [`ErrorResponse`]
//! with the matching HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use presence_core::PresenceError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors a read-only presence endpoint can answer with.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400: the request names something malformed.
    BadRequest { error_code: String, message: String },

    /// 404: no such identity or resource.
    NotFound { error_code: String, message: String },

    /// 503: the radio cannot serve the request right now.
    Unavailable { error_code: String, message: String },

    /// 500: anything else. Logged when rendered.
    Internal { error_code: String, message: String },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "device_not_found",
    "message": "Device not found: 'tile:aabbccddeeff'"
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "device_not_found")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "Device not found: 'tile:aabbccddeeff'")]
    pub message: String,
}

impl ApiError {
    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn parts(&self) -> (&str, &str) {
        match self {
            Self::BadRequest {
                error_code,
                message,
            }
            | Self::NotFound {
                error_code,
                message,
            }
            | Self::Unavailable {
                error_code,
                message,
            }
            | Self::Internal {
                error_code,
                message,
            } => (error_code, message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(error_code = %error_code, message = %message, "request failed");
        }
        let body = ErrorResponse {
            error: error_code.to_string(),
            message: message.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (error_code, message) = self.parts();
        write!(f, "{} {error_code}: {message}", self.status().as_u16())
    }
}

impl std::error::Error for ApiError {}

impl From<PresenceError> for ApiError {
    fn from(err: PresenceError) -> Self {
        let error_code = err.error_code().to_ascii_lowercase();
        let message = err.to_string();
        match err.http_status_code() {
            400 | 422 => Self::BadRequest {
                error_code,
                message,
            },
            404 => Self::NotFound {
                error_code,
                message,
            },
            502 | 503 => Self::Unavailable {
                error_code,
                message,
            },
            _ => Self::Internal {
                error_code,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ApiError::from(PresenceError::DeviceNotFound("tile:01".into()));
        assert_eq!(
            err.to_string(),
            "404 device_not_found: Device not found: 'tile:01'"
        );
    }

    #[test]
    fn test_presence_error_mapping() {
        let err = ApiError::from(PresenceError::AdapterNotFound);
        assert!(matches!(
            err,
            ApiError::Unavailable { ref error_code, .. } if error_code == "bluetooth_adapter_not_found"
        ));

        let err = ApiError::from(PresenceError::DeviceNotFound("tile:01".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::from(PresenceError::IoError(std::io::Error::other("disk full")));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(PresenceError::ConfigValidationError("x".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::from(PresenceError::DeviceNotFound("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
