use thiserror::Error;

/// Error kinds for the storage orchestration core.
///
/// Variant set mirrors the propagation table: each maps to exactly one HTTP
/// status at the boundary crate via [`Error::http_status`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("share expired")]
    ShareExpired,

    #[error("invalid password")]
    InvalidPassword,

    #[error("object storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("event backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP status code this error kind maps to at the boundary (§7).
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::ShareExpired => 410,
            Self::InvalidPassword => 401,
            Self::StorageUnavailable(_) | Self::BackendUnavailable(_) => 503,
            Self::EncodingError(_) | Self::Cancelled | Self::Internal(_) => 500,
        }
    }

    /// True for errors that a best-effort cascade (§7) should swallow after
    /// logging, rather than propagate to the caller.
    #[must_use]
    pub const fn is_best_effort_swallowable(&self) -> bool {
        !matches!(self, Self::Forbidden(_) | Self::InvalidArgument(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("resource not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref().unwrap_or_default() {
                // PostgreSQL unique_violation
                "23505" => Self::Conflict("resource already exists".to_string()),
                // PostgreSQL foreign_key_violation
                "23503" => Self::NotFound("referenced resource not found".to_string()),
                // PostgreSQL check_violation / not_null_violation
                "23514" | "23502" => {
                    Self::InvalidArgument("constraint violation".to_string())
                }
                _ => Self::Internal(err.to_string()),
            },
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::EncodingError(err.to_string())
    }
}

impl From<opendal::Error> for Error {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::StorageUnavailable(err.to_string()),
        }
    }
}

impl From<async_nats::Error> for Error {
    fn from(err: async_nats::Error) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_matches_propagation_table() {
        assert_eq!(Error::InvalidArgument("x".into()).http_status(), 400);
        assert_eq!(Error::Forbidden("x".into()).http_status(), 403);
        assert_eq!(Error::NotFound("x".into()).http_status(), 404);
        assert_eq!(Error::Conflict("x".into()).http_status(), 409);
        assert_eq!(Error::ShareExpired.http_status(), 410);
        assert_eq!(Error::InvalidPassword.http_status(), 401);
        assert_eq!(Error::StorageUnavailable("x".into()).http_status(), 503);
        assert_eq!(Error::BackendUnavailable("x".into()).http_status(), 503);
        assert_eq!(Error::Internal("x".into()).http_status(), 500);
    }

    #[test]
    fn sqlx_row_not_found_maps_to_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
