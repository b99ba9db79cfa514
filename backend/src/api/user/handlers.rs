//! Handler functions for the session snapshot and navigation shell.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::navigation::Navigation;
use crate::auth::middleware::request_session;
use crate::auth::models::SessionView;
use crate::AppState;

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<SessionView> {
    let (_, auth) = request_session(&state, &headers).await;
    Json(SessionView::from(&auth))
}

#[derive(Debug, Deserialize)]
pub struct NavigationParams {
    #[serde(default)]
    pub path: String,
}

pub async fn get_navigation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<NavigationParams>,
) -> Json<Navigation> {
    let (_, auth) = request_session(&state, &headers).await;
    Json(Navigation::build(&auth, &params.path))
}
