//! Defines the HTTP routes for session and navigation data.

use std::sync::Arc;

use axum::{routing::get, Router};

use super::handlers::{get_navigation, get_session};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/navigation", get(get_navigation))
}
