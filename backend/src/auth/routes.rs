//! Defines the HTTP routes for authentication.
//!
//! All of them are public; the route guard only covers role page trees.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{auth_page, request_code, sign_in, sign_out, sign_up, verify_code};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth", get(auth_page))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/otp", post(request_code))
        .route("/auth/otp/verify", post(verify_code))
        .route("/auth/sign-out", post(sign_out))
}
