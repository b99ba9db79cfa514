//! Custom error types specific to authentication failures.
//!
//! Provider refusals keep the provider's wording so the sign-in form can show
//! it verbatim; local validation errors are raised before any network call.

use adapters::AdapterError;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials, an invalid or expired one-time code, or a sign-up the
    /// provider refused.
    #[error("{0}")]
    Rejected(String),

    /// The form itself is incomplete or inconsistent.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Provider(AdapterError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Rejected(_) => StatusCode::UNAUTHORIZED,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Provider(err) => crate::errors::gateway_status(err),
        }
    }
}

impl From<AdapterError> for AuthError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::AuthRejected(message) => AuthError::Rejected(message),
            other => AuthError::Provider(other),
        }
    }
}
