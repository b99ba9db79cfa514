//! Central module for organizing the application's page and helper endpoints.
//!
//! Role screens live under `patient`, `doctor` and `admin`; `user` serves the
//! session snapshot and the navigation shell; `access` maps paths to the
//! roles allowed to render them. Authentication routes are handled in
//! `crate::auth`.
//!
//! Every screen answers with a `Screen`: the view model, optional guidance
//! for a missing linkage (a patient without a patient row, a doctor without a
//! hospital), and an optional notification after a write.

pub mod access;
pub mod admin;
pub mod doctor;
pub mod patient;
pub mod user;

use std::sync::Arc;

use axum::Router;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

/// A dismissible message shown after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Notification {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notification {
            level: Level::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Screen<V> {
    pub view: V,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

impl<V> Screen<V> {
    pub fn new(view: V) -> Self {
        Screen {
            view,
            guidance: None,
            notification: None,
        }
    }

    /// Reloaded view after a successful write.
    pub fn saved(view: V, message: impl Into<String>) -> Self {
        Screen {
            notification: Some(Notification::success(message)),
            ..Screen::new(view)
        }
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }
}

impl<V: Default> Screen<V> {
    /// Empty view for a caller whose domain linkage does not exist yet.
    pub fn unlinked(guidance: impl Into<String>) -> Self {
        Screen::new(V::default()).with_guidance(guidance)
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(patient::routes::router())
        .merge(doctor::routes::router())
        .merge(admin::routes::router())
        .merge(user::routes::router())
}
