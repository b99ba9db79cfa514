//! Core `adapters` crate for abstracting the hosted backend-as-a-service.
//!
//! This crate defines the `IdentityProvider` and `DataGateway` traits, which
//! outline what the web backend needs from managed auth and row-level secured
//! tables, and provides the concrete implementations (Supabase, in-memory).

pub mod errors;
pub mod memory;
pub mod models;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

pub use errors::{AdapterError, AdapterResult};
pub use models::{
    AuthChange, AuthEvent, Direction, Embed, Filter, Identity, Order, Query, Session, SignUp,
    SignUpOutcome,
};

/// One client's view of the identity provider.
///
/// Implementations keep the current session for exactly one browser session
/// and notify subscribers on every transition, including the one produced by
/// the first `get_session` call.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the stored session, refreshing it first when it has expired.
    async fn get_session(&self) -> AdapterResult<Option<Session>>;

    /// Subscribes to session transitions. Call before `get_session` to see
    /// the initial notification.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AdapterResult<Session>;

    async fn sign_up(&self, request: SignUp) -> AdapterResult<SignUpOutcome>;

    /// Sends a one-time code to an existing account.
    async fn sign_in_with_otp(&self, email: &str) -> AdapterResult<()>;

    async fn verify_otp(&self, email: &str, code: &str) -> AdapterResult<Session>;

    async fn sign_out(&self) -> AdapterResult<()>;
}

/// Hands out a fresh, signed-out provider client per browser session.
pub trait IdentityService: Send + Sync {
    fn client(&self) -> Arc<dyn IdentityProvider>;
}

/// Table-scoped reads and writes. `token` is the caller's access token; `None`
/// runs the call with the anonymous key.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn select(&self, token: Option<&str>, query: &Query) -> AdapterResult<Vec<Value>>;

    async fn count(&self, token: Option<&str>, query: &Query) -> AdapterResult<u64>;

    /// Inserts rows and returns them as stored.
    async fn insert(&self, token: Option<&str>, table: &str, rows: Vec<Value>) -> AdapterResult<Vec<Value>>;

    /// Inserts rows, merging into existing ones that collide on `on_conflict`.
    async fn upsert(
        &self,
        token: Option<&str>,
        table: &str,
        rows: Vec<Value>,
        on_conflict: &str,
    ) -> AdapterResult<Vec<Value>>;

    /// Patches every row matching `filters` and returns the updated rows.
    async fn update(
        &self,
        token: Option<&str>,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> AdapterResult<Vec<Value>>;

    async fn delete(&self, token: Option<&str>, table: &str, filters: &[Filter]) -> AdapterResult<()>;
}
