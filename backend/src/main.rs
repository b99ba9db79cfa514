//! Main entry point for the H Connect backend.
//!
//! This file initializes tracing and configuration, connects to the selected
//! backend-as-a-service, and serves the page and auth routes behind the
//! route guard.

mod api;
mod auth;
mod config;
mod database;
mod errors;
mod middleware;
mod services;

use std::sync::Arc;
use std::time::Duration;

use adapters::DataGateway;
use axum::http::StatusCode;
use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::auth::SessionStore;
use crate::config::Config;

const SESSION_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Shared by every handler.
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<dyn DataGateway>,
    pub sessions: SessionStore,
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .merge(auth::routes::router())
        .merge(api::router())
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), auth::route_guard))
        .layer(from_fn(middleware::trace_requests))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let connections = database::connect(&config)?;
    let state = Arc::new(AppState {
        sessions: SessionStore::new(connections.identity, connections.gateway.clone())
            .idle_timeout(config.session_idle()),
        gateway: connections.gateway,
        config,
    });

    let sweeper = state.clone();
    tokio::spawn(async move {
        sweeper.sessions.run_sweeper(SESSION_SWEEP_PERIOD).await;
    });

    let listener = tokio::net::TcpListener::bind(state.config.bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn root_handler() -> &'static str {
    "Welcome to H Connect!"
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}
