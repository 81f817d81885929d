//! HTTP-boundary error type. Converts `notevault_core::Error` into a status
//! code and a JSON body per the propagation table (§7): client-facing kinds
//! pass their message through verbatim, backend/internal kinds are logged
//! and genericized so implementation details never leak to the caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn internal_server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    #[must_use]
    pub fn service_unavailable(component: &str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, format!("{component} unavailable"))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse { error: self.message, status: self.status.as_u16() };
        (self.status, Json(body)).into_response()
    }
}

/// Per-variant mapping over the propagation table (§7). `http_status()`
/// supplies the numeric code; the 500/503-tier variants are logged here
/// since their raw message is an implementation detail, not something a
/// client should see.
impl From<notevault_core::Error> for AppError {
    fn from(err: notevault_core::Error) -> Self {
        use notevault_core::Error as CoreError;

        let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match err {
            CoreError::InvalidArgument(msg)
            | CoreError::Unauthorized(msg)
            | CoreError::Forbidden(msg)
            | CoreError::NotFound(msg)
            | CoreError::Conflict(msg) => Self::new(status, msg),
            CoreError::ShareExpired => Self::new(status, "share has expired"),
            CoreError::InvalidPassword => Self::new(status, "invalid share password"),
            CoreError::StorageUnavailable(msg) => {
                error!(error = %msg, "object storage unavailable");
                Self::new(status, "object storage is currently unavailable")
            }
            CoreError::BackendUnavailable(msg) => {
                error!(error = %msg, "event backend unavailable");
                Self::new(status, "event backend is currently unavailable")
            }
            CoreError::EncodingError(msg) => {
                error!(error = %msg, "encoding error");
                Self::internal_server_error()
            }
            CoreError::Cancelled => Self::new(status, "operation cancelled"),
            CoreError::Internal(msg) => {
                error!(error = %msg, "internal error");
                Self::internal_server_error()
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        error!(error = %err, "request body deserialization failed");
        Self::bad_request("malformed request body")
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %err, "unexpected error");
        Self::internal_server_error()
    }
}

#[cfg(test)]
mod tests {
    use notevault_core::Error as CoreError;

    use super::*;

    #[test]
    fn client_facing_kinds_keep_their_message() {
        let err: AppError = CoreError::NotFound("object not found".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "object not found");
    }

    #[test]
    fn share_expired_and_invalid_password_get_fixed_messages() {
        let expired: AppError = CoreError::ShareExpired.into();
        assert_eq!(expired.status, StatusCode::GONE);

        let bad_password: AppError = CoreError::InvalidPassword.into();
        assert_eq!(bad_password.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn backend_errors_are_genericized() {
        let err: AppError = CoreError::StorageUnavailable("bucket gone".into()).into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message.contains("bucket gone"));

        let err: AppError = CoreError::EncodingError("bad utf8".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }
}
