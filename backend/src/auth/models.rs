//! Data structures for authentication-related entities.
//!
//! This module defines the role axis of access control, the resolved profile,
//! the resolver's observable `AuthState`, and the request bodies of the
//! sign-in, sign-up and one-time-code endpoints.

use std::fmt;
use std::str::FromStr;

use adapters::{Identity, Session};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::Notification;

/// Unauthenticated entry point; the only redirect target besides role homes.
pub const AUTH_PATH: &str = "/auth";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    /// Each role's single landing page. Used by the guard and by every
    /// post-authentication redirect.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Patient => "/patient",
            Role::Doctor => "/doctor",
            Role::Admin => "/admin",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub full_name: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

/// Everything the resolver knows about the current browser session.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub session: Option<Session>,
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl AuthState {
    pub fn initial() -> Self {
        AuthState {
            session: None,
            identity: None,
            role: None,
            profile: None,
            loading: true,
        }
    }

    /// A settled state with nobody signed in.
    pub fn signed_out() -> Self {
        AuthState {
            loading: false,
            ..AuthState::initial()
        }
    }

    pub fn identity_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|i| i.id)
    }
}

/// Client-facing view of an `AuthState`. Tokens stay on the server.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub profile: Option<Profile>,
    pub loading: bool,
}

impl From<&AuthState> for SessionView {
    fn from(state: &AuthState) -> Self {
        SessionView {
            identity: state.identity.clone(),
            role: state.role,
            profile: state.profile.clone(),
            loading: state.loading,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub hospital_id: Option<Uuid>,
    #[serde(default)]
    pub specialty: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

/// Response of every successful authentication call.
#[derive(Debug, Serialize)]
pub struct AuthOutcome {
    pub session: SessionView,
    /// Where the client should go next; `/auth` when the role is not known yet.
    pub redirect_to: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

impl AuthOutcome {
    /// Outcome for a settled state: the role's home, or `/auth` without one.
    pub fn settled(state: &AuthState) -> Self {
        AuthOutcome {
            session: SessionView::from(state),
            redirect_to: state.role.map(|r| r.home_path()).unwrap_or(AUTH_PATH),
            notification: None,
        }
    }

    pub fn notify(mut self, notification: Notification) -> Self {
        self.notification = Some(notification);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_has_exactly_one_home() {
        assert_eq!(Role::Patient.home_path(), "/patient");
        assert_eq!(Role::Doctor.home_path(), "/doctor");
        assert_eq!(Role::Admin.home_path(), "/admin");
        assert_eq!("doctor".parse::<Role>(), Ok(Role::Doctor));
        assert!("nurse".parse::<Role>().is_err());
    }
}
