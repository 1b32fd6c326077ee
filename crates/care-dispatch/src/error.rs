//! Error types for backend reads.
//!
//! Dispatches never return these: every dispatch failure is folded into
//! `DispatchOutcome::Failed`. They surface only from snapshot fetches and
//! client construction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Network or transport-level HTTP error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success HTTP status.
    #[error("Backend error: {status} - {message}")]
    Backend {
        /// The HTTP status code returned by the backend.
        status: u16,
        /// The response body, typically containing error details.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No care record exists for the resident.
    #[error("Unknown resident: {0}")]
    UnknownResident(String),

    /// Invalid API URL or other setup issue.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    /// Returns true if a later read may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().is_some_and(|status| status.is_server_error())
            }
            DispatchError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Convenience Result type alias for dispatcher reads.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_5xx_is_transient() {
        let err = DispatchError::Backend {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_backend_4xx_is_not_transient() {
        let err = DispatchError::Backend {
            status: 401,
            message: "JWT expired".into(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unknown_resident_is_not_transient() {
        assert!(!DispatchError::UnknownResident("res-9".into()).is_transient());
    }
}
