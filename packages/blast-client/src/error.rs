//! Error types for the BLAST client.

use std::time::Duration;

use thiserror::Error;

/// Result type for BLAST client operations.
pub type Result<T> = std::result::Result<T, BlastError>;

/// BLAST client errors.
#[derive(Debug, Error)]
pub enum BlastError {
    /// Caller input violates a documented constraint. Never sent over the network.
    #[error("invalid parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    /// The single request/response exchange failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body carried no marker for the requested field
    #[error("no {marker} marker found in response")]
    IdentifierNotFound { marker: &'static str },

    /// The marker was found but its quoted value never terminated
    #[error("unterminated {marker} marker in response")]
    MalformedResponse { marker: &'static str },

    /// Still pending after the configured number of status checks
    #[error("job still pending after {attempts} status checks")]
    AttemptsExhausted { attempts: u32 },

    /// Still pending after the configured maximum total wait
    #[error("job still pending after waiting {waited:?}")]
    WaitExceeded { waited: Duration },

    /// External cancellation observed between poll cycles
    #[error("polling cancelled")]
    Cancelled,

    /// Configuration error (bad environment value, invalid base URL)
    #[error("configuration error: {0}")]
    Config(String),
}

impl BlastError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures of a single transport call. None of these are retried by the client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established or was reset
    #[error("connection failed: {0}")]
    Connect(String),

    /// The call did not finish within the request timeout
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-2xx status
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be read
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Classify a reqwest failure. `timeout` is the bound the call was made with.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_body() || err.is_decode() {
            Self::Body(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Connect(err.to_string())
        }
    }
}
