//! Error taxonomy for the relay.
//!
//! The split matters because each class has a different recovery path:
//! [`FetchError`] decides whether a poll cycle is retried next tick or
//! the process exits for supervisor-level remediation, [`DispatchError`]
//! leaves the message unmarked so the next cycle retries it, and
//! [`ConfigError`] is startup-fatal.

use thiserror::Error;

/// Failure while querying the mail inbox.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FetchError {
    /// Credentials are invalid, expired, or could not be refreshed.
    /// Fatal: the process exits so the supervisor can alert or restart
    /// with fresh authentication.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The mail API is throttling requests. Retried next cycle.
    #[error("rate limited by mail API")]
    RateLimited,

    /// Network or server trouble that may clear on its own.
    #[error("transient fetch failure: {0}")]
    Transient(String),
}

impl FetchError {
    /// Whether this error should terminate the process rather than be
    /// retried on the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth(_))
    }
}

/// Failure while posting to the chat channel.
///
/// A dispatch failure never marks the message seen; the poll loop
/// retries it on later cycles up to the configured attempt bound.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DispatchError {
    /// The chat API rejected or failed the post.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Configuration problems detected at startup.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Config file missing at the resolved path.
    #[error("config file not found: {0}")]
    NotFound(String),

    /// Config present but semantically unusable.
    #[error("invalid config: {reason}")]
    Invalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display() {
        let err = FetchError::Auth("refresh token revoked".into());
        assert_eq!(err.to_string(), "authentication failed: refresh token revoked");

        let err = FetchError::RateLimited;
        assert_eq!(err.to_string(), "rate limited by mail API");

        let err = FetchError::Transient("connection reset".into());
        assert_eq!(err.to_string(), "transient fetch failure: connection reset");
    }

    #[test]
    fn only_auth_is_fatal() {
        assert!(FetchError::Auth("x".into()).is_fatal());
        assert!(!FetchError::RateLimited.is_fatal());
        assert!(!FetchError::Transient("x".into()).is_fatal());
    }

    #[test]
    fn dispatch_error_display() {
        let err = DispatchError::SendFailed("HTTP 500".into());
        assert_eq!(err.to_string(), "send failed: HTTP 500");
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn config_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
