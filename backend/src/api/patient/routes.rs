//! Defines the HTTP routes for the patient screens.

use std::sync::Arc;

use axum::{routing::get, Router};

use super::handlers::{book, booking_form, dashboard, history, profile, save_profile};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/patient", get(dashboard))
        .route("/patient/book", get(booking_form).post(book))
        .route("/patient/history", get(history))
        .route("/patient/profile", get(profile).put(save_profile))
}
