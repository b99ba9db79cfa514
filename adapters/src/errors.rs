//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur while talking to the identity
//! provider or the data gateway, so that every backend call surfaces failures
//! through one type regardless of which adapter served it.

use thiserror::Error;

/// Postgres `unique_violation`, reported by PostgREST in the `code` field.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request never produced a usable response.
    #[error("gateway unreachable: {0}")]
    Transport(String),

    /// Credentials, one-time code or refresh token were refused. The message
    /// is the provider's own wording and is meant to be shown verbatim.
    #[error("{0}")]
    AuthRejected(String),

    /// Row-level security or a missing/expired token denied the call.
    #[error("{0}")]
    Denied(String),

    /// A unique constraint rejected the write.
    #[error("{message}")]
    Conflict { message: String },

    /// Any other error status returned by the service.
    #[error("{message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl AdapterError {
    /// Classifies an error body the way both GoTrue and PostgREST shape them.
    pub fn from_status(status: u16, code: Option<String>, message: String) -> Self {
        if code.as_deref() == Some(UNIQUE_VIOLATION) || status == 409 {
            return AdapterError::Conflict { message };
        }
        match status {
            401 | 403 => AdapterError::Denied(message),
            _ => AdapterError::Rejected {
                status,
                code,
                message,
            },
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AdapterError::Conflict { .. })
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AdapterError::Decode(err.to_string())
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Decode(err.to_string())
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
