//! Global application error types and handlers.
//!
//! `AppError` is what every handler returns on failure. It renders as a
//! dismissible error notification with a status code that reflects the
//! failure class; nothing here is fatal to the process.

use adapters::AdapterError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::api::Notification;
use crate::auth::errors::AuthError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Gateway(#[from] AdapterError),

    /// Input refused before any gateway call.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(err) => err.status(),
            AppError::Gateway(err) => gateway_status(err),
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

pub(crate) fn gateway_status(err: &AdapterError) -> StatusCode {
    match err {
        AdapterError::Transport(_) | AdapterError::Decode(_) => StatusCode::BAD_GATEWAY,
        AdapterError::AuthRejected(_) => StatusCode::UNAUTHORIZED,
        AdapterError::Denied(_) => StatusCode::FORBIDDEN,
        AdapterError::Conflict { .. } => StatusCode::CONFLICT,
        AdapterError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!("request refused ({}): {}", status, self);
        }
        let body = json!({ "notification": Notification::error(self.to_string()) });
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_failures_map_to_notification_statuses() {
        let conflict = AppError::from(AdapterError::Conflict {
            message: "duplicate key".into(),
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(AdapterError::Denied("rls".into())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(AdapterError::Transport("down".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Validation("pick a slot".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
