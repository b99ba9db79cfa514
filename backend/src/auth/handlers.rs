//! Handler functions for authentication endpoints.
//!
//! These process sign-in (password or one-time code), sign-up and sign-out
//! for the browser session named by the session cookie, starting a new
//! browser session when there is none. Successful calls answer with the
//! resolved session and the path the client should navigate to.

use std::sync::Arc;

use adapters::{AdapterResult, Direction, Query, SignUp};
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::api::Notification;
use crate::auth::errors::AuthError;
use crate::auth::middleware::{cleared_session_cookie, request_session, session_cookie, session_id};
use crate::auth::models::{
    AuthOutcome, OtpRequest, Role, SignInRequest, SignUpRequest, VerifyOtpRequest, AUTH_PATH,
};
use crate::auth::service::SessionResolver;
use crate::errors::AppResult;
use crate::AppState;

fn with_cookie(id: Uuid, body: impl Serialize) -> Response {
    ([(SET_COOKIE, session_cookie(id))], Json(body)).into_response()
}

/// The caller's browser session, started if needed and settled before use.
async fn browser_session(state: &AppState, headers: &HeaderMap) -> (Uuid, Arc<SessionResolver>) {
    let (id, resolver) = state.sessions.get_or_create(session_id(headers)).await;
    resolver.settled(state.config.resolver_wait()).await;
    (id, resolver)
}

/// Passes a provider result through, dropping a browser session that was
/// started for this request when the call failed.
async fn checked<T>(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    result: AdapterResult<T>,
) -> Result<T, AuthError> {
    if result.is_err() && session_id(headers) != Some(id) {
        state.sessions.remove(id).await;
    }
    result.map_err(AuthError::from)
}

#[derive(Debug, Serialize)]
pub struct HospitalOption {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct AuthPage {
    /// Choices for the doctor sign-up form.
    pub hospitals: Vec<HospitalOption>,
}

/// Already-routed callers are sent home; everyone else gets the form data.
pub async fn auth_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let (_, auth) = request_session(&state, &headers).await;
    if let (Some(_), Some(role)) = (&auth.identity, auth.role) {
        return Ok(Redirect::to(role.home_path()).into_response());
    }
    let query = Query::table("hospitals")
        .select(&["id", "name"])
        .order("name", Direction::Ascending);
    let rows: Vec<Value> = state.gateway.select(None, &query).await?;
    let hospitals = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.get("id")?.as_str()?.parse().ok()?;
            let name = row.get("name")?.as_str()?.to_string();
            Some(HospitalOption { id, name })
        })
        .collect();
    Ok(Json(AuthPage { hospitals }).into_response())
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SignInRequest>,
) -> AppResult<Response> {
    let (id, resolver) = browser_session(&state, &headers).await;
    let result = resolver
        .provider()
        .sign_in_with_password(request.email.trim(), &request.password)
        .await;
    let session = checked(&state, &headers, id, result).await?;
    tracing::info!("user {} signed in", session.user.id);
    let auth = resolver
        .adopt(session.user.id, state.config.resolver_wait())
        .await;
    Ok(with_cookie(id, AuthOutcome::settled(&auth)))
}

/// Checks made before any provider call, so a refused form never creates
/// an account.
pub fn validate_sign_up(request: &SignUpRequest) -> Result<(), AuthError> {
    if request.full_name.trim().is_empty() {
        return Err(AuthError::Validation("Please enter your full name".to_string()));
    }
    if request.email.trim().is_empty() {
        return Err(AuthError::Validation("Please enter your email".to_string()));
    }
    if request.role == Role::Doctor && request.hospital_id.is_none() {
        return Err(AuthError::Validation("Please select a hospital".to_string()));
    }
    Ok(())
}

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SignUpRequest>,
) -> AppResult<Response> {
    validate_sign_up(&request)?;

    let (id, resolver) = browser_session(&state, &headers).await;
    let mut data = Map::new();
    data.insert("full_name".into(), json!(request.full_name.trim()));
    data.insert("role".into(), json!(request.role.as_str()));
    let result = resolver
        .provider()
        .sign_up(SignUp {
            email: request.email.trim().to_string(),
            password: request.password.clone(),
            data,
        })
        .await;
    let outcome = checked(&state, &headers, id, result).await?;
    let user_id = outcome.user.id;
    tracing::info!("user {} signed up as {}", user_id, request.role);

    if let (Role::Doctor, Some(hospital_id)) = (request.role, request.hospital_id) {
        let token = outcome.session.as_ref().map(|s| s.access_token.as_str());
        let specialty = request
            .specialty
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("General");
        let row = json!({
            "user_id": user_id.to_string(),
            "hospital_id": hospital_id.to_string(),
            "specialty": specialty,
        });
        if let Err(err) = state.gateway.insert(token, "doctors", vec![row.clone()]).await {
            tracing::warn!("doctor row insert failed ({}); retrying as upsert", err);
            if let Err(err) = state.gateway.upsert(token, "doctors", vec![row], "user_id").await {
                tracing::warn!("doctor row upsert for {} failed: {}", user_id, err);
            }
        }
    }

    let body = match outcome.session {
        Some(_) => {
            let auth = resolver.adopt(user_id, state.config.resolver_wait()).await;
            AuthOutcome {
                redirect_to: request.role.home_path(),
                ..AuthOutcome::settled(&auth)
            }
            .notify(Notification::success("Account created! Redirecting..."))
        }
        None => AuthOutcome::settled(&resolver.snapshot())
            .notify(Notification::success("Check your email to confirm your account")),
    };
    Ok(with_cookie(id, body))
}

/// Sends a one-time code. No browser session is started until the code is
/// verified.
pub async fn request_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OtpRequest>,
) -> AppResult<Response> {
    state
        .sessions
        .detached_client()
        .sign_in_with_otp(request.email.trim())
        .await
        .map_err(AuthError::from)?;
    let body = json!({ "notification": Notification::success("Check your email for the sign-in code") });
    Ok(Json(body).into_response())
}

pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<VerifyOtpRequest>,
) -> AppResult<Response> {
    let (id, resolver) = browser_session(&state, &headers).await;
    let result = resolver
        .provider()
        .verify_otp(request.email.trim(), request.code.trim())
        .await;
    let session = checked(&state, &headers, id, result).await?;
    tracing::info!("user {} signed in with a one-time code", session.user.id);
    let auth = resolver
        .adopt(session.user.id, state.config.resolver_wait())
        .await;
    Ok(with_cookie(id, AuthOutcome::settled(&auth)))
}

/// Ends the browser session. Local state is cleared even if the provider
/// could not be reached.
pub async fn sign_out(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        if let Some(resolver) = state.sessions.remove(id).await {
            if let Err(err) = resolver.sign_out().await {
                tracing::warn!("provider sign-out failed: {}", err);
            }
        }
    }
    (
        [(SET_COOKIE, cleared_session_cookie())],
        Json(json!({ "redirect_to": AUTH_PATH })),
    )
        .into_response()
}
