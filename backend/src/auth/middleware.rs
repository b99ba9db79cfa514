//! Route guard for role-scoped pages.
//!
//! `evaluate` is the pure decision: loading indicator, redirect, or render.
//! `route_guard` applies it to every request for a protected path, using the
//! resolver of the browser session named by the session cookie. Misrouted
//! requests are always redirected; there is no access-denied page.

use std::sync::Arc;

use adapters::Identity;
use axum::extract::{Request, State};
use axum::http::header::{COOKIE, RETRY_AFTER};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::api::access::required_roles;
use crate::auth::models::{AuthState, Role, AUTH_PATH};
use crate::auth::service::SessionResolver;
use crate::AppState;

pub const SESSION_COOKIE: &str = "hconnect_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Loading,
    Redirect(&'static str),
    Render(Role),
}

/// Decides what a page restricted to `allowed` shows for `state`.
/// `None` means any signed-in role may render.
pub fn evaluate(state: &AuthState, allowed: Option<&[Role]>) -> GuardOutcome {
    if state.loading {
        return GuardOutcome::Loading;
    }
    if state.identity.is_none() {
        return GuardOutcome::Redirect(AUTH_PATH);
    }
    let Some(role) = state.role else {
        return GuardOutcome::Redirect(AUTH_PATH);
    };
    match allowed {
        Some(roles) if !roles.contains(&role) => GuardOutcome::Redirect(role.home_path()),
        _ => GuardOutcome::Render(role),
    }
}

/// The signed-in caller of a rendered page, inserted as a request extension.
#[derive(Clone)]
pub struct Principal {
    pub identity: Identity,
    pub role: Role,
    pub access_token: String,
    pub resolver: Arc<SessionResolver>,
}

impl Principal {
    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }

    pub fn token(&self) -> Option<&str> {
        Some(&self.access_token)
    }
}

pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(id: Uuid) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

pub fn cleared_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// The caller's resolver and its settled state; anonymous callers get a
/// signed-out state without a resolver.
pub async fn request_session(
    state: &AppState,
    headers: &HeaderMap,
) -> (Option<Arc<SessionResolver>>, AuthState) {
    let resolver = match session_id(headers) {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };
    match resolver {
        Some(resolver) => {
            resolver.ensure_fresh().await;
            let auth = resolver.settled(state.config.resolver_wait()).await;
            (Some(resolver), auth)
        }
        None => (None, AuthState::signed_out()),
    }
}

fn loading_response() -> Response {
    (
        StatusCode::ACCEPTED,
        [(RETRY_AFTER, "1")],
        Json(json!({ "loading": true })),
    )
        .into_response()
}

pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(allowed) = required_roles(request.uri().path()) else {
        return next.run(request).await;
    };
    let (resolver, auth) = request_session(&state, request.headers()).await;
    match evaluate(&auth, Some(allowed)) {
        GuardOutcome::Loading => loading_response(),
        GuardOutcome::Redirect(to) => {
            tracing::debug!("redirecting {} to {}", request.uri().path(), to);
            Redirect::to(to).into_response()
        }
        GuardOutcome::Render(role) => {
            let principal = resolver.zip(auth.session).map(|(resolver, session)| Principal {
                identity: session.user.clone(),
                role,
                access_token: session.access_token,
                resolver,
            });
            match principal {
                Some(principal) => {
                    request.extensions_mut().insert(principal);
                    next.run(request).await
                }
                None => Redirect::to(AUTH_PATH).into_response(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signed_in(role: Option<Role>) -> AuthState {
        AuthState {
            identity: Some(Identity {
                id: Uuid::new_v4(),
                email: "u@example.com".into(),
            }),
            role,
            ..AuthState::signed_out()
        }
    }

    #[test]
    fn loading_never_redirects() {
        let state = AuthState::initial();
        assert_eq!(evaluate(&state, Some(&[Role::Admin])), GuardOutcome::Loading);
        assert_eq!(evaluate(&state, None), GuardOutcome::Loading);
    }

    #[test]
    fn no_identity_goes_to_auth_regardless_of_roles() {
        let state = AuthState::signed_out();
        for allowed in [None, Some(&[Role::Patient][..]), Some(&[Role::Doctor, Role::Admin][..])] {
            assert_eq!(evaluate(&state, allowed), GuardOutcome::Redirect("/auth"));
        }
    }

    #[test]
    fn identity_without_role_goes_to_auth() {
        assert_eq!(
            evaluate(&signed_in(None), Some(&[Role::Patient])),
            GuardOutcome::Redirect("/auth")
        );
    }

    #[test]
    fn wrong_role_goes_home() {
        assert_eq!(
            evaluate(&signed_in(Some(Role::Doctor)), Some(&[Role::Patient])),
            GuardOutcome::Redirect("/doctor")
        );
        assert_eq!(
            evaluate(&signed_in(Some(Role::Patient)), Some(&[Role::Admin])),
            GuardOutcome::Redirect("/patient")
        );
    }

    #[test]
    fn allowed_or_unrestricted_role_renders() {
        assert_eq!(
            evaluate(&signed_in(Some(Role::Admin)), Some(&[Role::Admin])),
            GuardOutcome::Render(Role::Admin)
        );
        assert_eq!(
            evaluate(&signed_in(Some(Role::Patient)), None),
            GuardOutcome::Render(Role::Patient)
        );
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}; lang=en", SESSION_COOKIE, id))
                .unwrap(),
        );
        assert_eq!(session_id(&headers), Some(id));

        headers.insert(COOKIE, HeaderValue::from_static("hconnect_session=garbage"));
        assert_eq!(session_id(&headers), None);
        assert!(session_cookie(id).contains("HttpOnly"));
    }
}
