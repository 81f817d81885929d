//! Timeout and retry defaults for calls to the object store, database, and
//! Redis — backing the cancellation/timeout model in §5.

pub mod timeout {
    use std::time::Duration;

    pub const DB_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
    pub const REDIS_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);
    pub const S3_CALL_TIMEOUT: Duration = Duration::from_secs(30);
    /// §5 "the shutdown path uses a 30-second deadline for draining."
    pub const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(30);

    #[derive(Debug, Clone, Copy)]
    pub struct TimeoutConfig {
        pub db_query: Duration,
        pub redis: Duration,
        pub s3: Duration,
    }

    impl Default for TimeoutConfig {
        fn default() -> Self {
            Self {
                db_query: DB_QUERY_TIMEOUT,
                redis: REDIS_OPERATION_TIMEOUT,
                s3: S3_CALL_TIMEOUT,
            }
        }
    }

    impl TimeoutConfig {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub const fn with_db_query_timeout(mut self, timeout: Duration) -> Self {
            self.db_query = timeout;
            self
        }

        #[must_use]
        pub const fn with_redis_timeout(mut self, timeout: Duration) -> Self {
            self.redis = timeout;
            self
        }

        #[must_use]
        pub const fn with_s3_timeout(mut self, timeout: Duration) -> Self {
            self.s3 = timeout;
            self
        }
    }
}

pub mod retry {
    //! Retry policy classification; backoff execution itself uses `backon`
    //! at the call site (e.g. the event publisher's reconnect loop).

    pub fn should_retry_error(err: &(dyn std::error::Error + 'static)) -> bool {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return is_transient_io_error(io_err);
        }

        let err_msg = err.to_string().to_lowercase();
        err_msg.contains("timed out")
            || err_msg.contains("timeout")
            || err_msg.contains("connection reset")
            || err_msg.contains("connection refused")
            || err_msg.contains("connection aborted")
            || err_msg.contains("broken pipe")
    }

    fn is_transient_io_error(err: &std::io::Error) -> bool {
        matches!(
            err.kind(),
            std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use timeout::TimeoutConfig;

    #[test]
    fn timeout_config_overrides_apply() {
        let config = TimeoutConfig::new().with_db_query_timeout(Duration::from_secs(60));
        assert_eq!(config.db_query.as_secs(), 60);
        assert_eq!(config.redis, timeout::REDIS_OPERATION_TIMEOUT);
    }

    #[test]
    fn should_retry_error_detects_transient_io() {
        let timeout_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        assert!(retry::should_retry_error(&timeout_err));

        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        assert!(!retry::should_retry_error(&not_found));
    }
}
