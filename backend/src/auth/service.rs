//! Session/role resolution for one browser session.
//!
//! A `SessionResolver` owns an identity provider client and keeps the
//! observable `AuthState` for it in a `watch` channel. It subscribes to the
//! provider's change stream before the first session fetch, so no transition
//! is missed, and clears `loading` exactly once, after the initial session
//! and (when signed in) its role and profile have been fetched.
//!
//! Role and profile are only ever written for the identity they were fetched
//! for, and are cleared when the identity changes, so the settled state
//! depends only on the latest identity no matter how the change listener,
//! its deferred fetches and the initial fetch interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adapters::{AuthChange, DataGateway, IdentityProvider, Session};
use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::errors::AuthError;
use crate::auth::models::{AuthState, Profile, Role};
use crate::database::queries;

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn DataGateway>,
    state: watch::Sender<AuthState>,
    alive: AtomicBool,
}

impl Inner {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Writes session and identity. A different identity (including none)
    /// drops the previous role and profile in the same write.
    fn apply_session(&self, session: Option<Session>) {
        if !self.is_alive() {
            return;
        }
        self.state.send_if_modified(move |state| {
            let identity = session.as_ref().map(|s| s.user.clone());
            let switched = state.identity_id() != identity.as_ref().map(|i| i.id);
            if !switched && state.session == session {
                return false;
            }
            if switched {
                state.role = None;
                state.profile = None;
            }
            state.identity = identity;
            state.session = session;
            true
        });
    }

    async fn resolve(&self, session: &Session) {
        let user_id = session.user.id;
        let token = Some(session.access_token.as_str());
        let gateway = self.gateway.as_ref();
        let (role, profile) = tokio::join!(
            queries::role_for_user(gateway, token, user_id),
            queries::profile_for_user(gateway, token, user_id),
        );
        let role = role.unwrap_or_else(|err| {
            warn!("role lookup for {} failed: {}", user_id, err);
            None
        });
        let profile = profile.unwrap_or_else(|err| {
            warn!("profile lookup for {} failed: {}", user_id, err);
            None
        });
        self.write_resolved(user_id, role, profile);
    }

    /// Missing rows keep whatever is already there.
    fn write_resolved(&self, user_id: Uuid, role: Option<Role>, profile: Option<Profile>) {
        if !self.is_alive() {
            return;
        }
        self.state.send_if_modified(move |state| {
            if state.identity_id() != Some(user_id) {
                return false;
            }
            let mut modified = false;
            if let Some(role) = role {
                modified |= state.role.replace(role) != Some(role);
            }
            if let Some(profile) = profile {
                if state.profile.as_ref() != Some(&profile) {
                    state.profile = Some(profile);
                    modified = true;
                }
            }
            modified
        });
    }

    fn finish_loading(&self) {
        if !self.is_alive() {
            return;
        }
        self.state.send_if_modified(|state| {
            let was_loading = state.loading;
            state.loading = false;
            was_loading
        });
    }

    async fn initialize(self: Arc<Self>) {
        match self.provider.get_session().await {
            Ok(session) => {
                self.apply_session(session.clone());
                if let Some(session) = session {
                    self.resolve(&session).await;
                }
            }
            Err(err) => warn!("initial session fetch failed: {}", err),
        }
        self.finish_loading();
        debug!("session resolver settled");
    }

    async fn listen(self: Arc<Self>, mut changes: broadcast::Receiver<AuthChange>) {
        loop {
            let session = match changes.recv().await {
                Ok(change) => {
                    debug!("auth change: {:?}", change.event);
                    change.session
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("resolver skipped {} auth changes; re-reading session", skipped);
                    match self.provider.get_session().await {
                        Ok(session) => session,
                        Err(err) => {
                            warn!("session re-read failed: {}", err);
                            continue;
                        }
                    }
                }
                Err(RecvError::Closed) => break,
            };
            if !self.is_alive() {
                break;
            }
            self.apply_session(session.clone());
            // Queued as its own task so the listener never waits on the gateway.
            if let Some(session) = session {
                let inner = self.clone();
                tokio::spawn(async move {
                    if inner.is_alive() {
                        inner.resolve(&session).await;
                    }
                });
            }
        }
    }
}

/// Resolver for one browser session. Dropping it stops all of its tasks
/// from writing.
pub struct SessionResolver {
    inner: Arc<Inner>,
    listener: JoinHandle<()>,
}

impl SessionResolver {
    /// Subscribes to `provider`, then starts the initial session fetch.
    /// Must be called inside a Tokio runtime.
    pub fn start(provider: Arc<dyn IdentityProvider>, gateway: Arc<dyn DataGateway>) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        let changes = provider.subscribe();
        let inner = Arc::new(Inner {
            provider,
            gateway,
            state,
            alive: AtomicBool::new(true),
        });
        let listener = tokio::spawn(inner.clone().listen(changes));
        tokio::spawn(inner.clone().initialize());
        Self { inner, listener }
    }

    pub fn provider(&self) -> Arc<dyn IdentityProvider> {
        self.inner.provider.clone()
    }

    pub fn snapshot(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    async fn wait_until(
        &self,
        timeout: Duration,
        ready: impl FnMut(&AuthState) -> bool,
    ) -> AuthState {
        let mut rx = self.watch();
        let state = match tokio::time::timeout(timeout, rx.wait_for(ready)).await {
            Ok(Ok(state)) => state.clone(),
            _ => self.snapshot(),
        };
        state
    }

    /// The state once `loading` is false, or the current state after `timeout`.
    pub async fn settled(&self, timeout: Duration) -> AuthState {
        self.wait_until(timeout, |state| !state.loading).await
    }

    /// Waits until the change listener has applied `user_id` as the current
    /// identity, then resolves its role and profile directly.
    pub async fn adopt(&self, user_id: Uuid, timeout: Duration) -> AuthState {
        self.settled(timeout).await;
        self.wait_until(timeout, |state| state.identity_id() == Some(user_id))
            .await;
        self.refresh().await;
        self.snapshot()
    }

    /// Re-fetches role and profile for the current identity.
    pub async fn refresh(&self) {
        let session = self.inner.state.borrow().session.clone();
        if let Some(session) = session {
            self.inner.resolve(&session).await;
        }
    }

    /// Lets the provider renew an expired access token before it is used.
    pub async fn ensure_fresh(&self) {
        let expired = self
            .inner
            .state
            .borrow()
            .session
            .as_ref()
            .is_some_and(|s| s.is_expired(Utc::now()));
        if !expired {
            return;
        }
        match self.inner.provider.get_session().await {
            Ok(session) => self.inner.apply_session(session),
            Err(err) => warn!("session renewal failed: {}", err),
        }
    }

    /// Signs out at the provider and clears identity, role and profile even
    /// when the provider call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.inner.provider.sign_out().await;
        self.inner.apply_session(None);
        result.map_err(AuthError::from)
    }
}

impl Drop for SessionResolver {
    fn drop(&mut self) {
        self.inner.alive.store(false, Ordering::SeqCst);
        self.listener.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::memory::{MemoryGateway, MemoryIdentity};
    use adapters::{AdapterError, AdapterResult, Filter, IdentityService, Query, SignUp};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::database;

    const WAIT: Duration = Duration::from_secs(2);

    /// Delays every read that filters on one of `slow_users`.
    struct SlowGateway {
        inner: MemoryGateway,
        slow_users: Vec<String>,
        delay: Duration,
    }

    impl SlowGateway {
        fn is_slow(&self, query: &Query) -> bool {
            query.filters.iter().any(|f| match f {
                Filter::Eq(column, Value::String(v)) => {
                    column == "user_id" && self.slow_users.contains(v)
                }
                _ => false,
            })
        }
    }

    #[async_trait]
    impl DataGateway for SlowGateway {
        async fn select(&self, token: Option<&str>, query: &Query) -> AdapterResult<Vec<Value>> {
            if self.is_slow(query) {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.select(token, query).await
        }
        async fn count(&self, token: Option<&str>, query: &Query) -> AdapterResult<u64> {
            self.inner.count(token, query).await
        }
        async fn insert(&self, token: Option<&str>, table: &str, rows: Vec<Value>) -> AdapterResult<Vec<Value>> {
            self.inner.insert(token, table, rows).await
        }
        async fn upsert(&self, token: Option<&str>, table: &str, rows: Vec<Value>, on_conflict: &str) -> AdapterResult<Vec<Value>> {
            self.inner.upsert(token, table, rows, on_conflict).await
        }
        async fn update(&self, token: Option<&str>, table: &str, patch: Value, filters: &[Filter]) -> AdapterResult<Vec<Value>> {
            self.inner.update(token, table, patch, filters).await
        }
        async fn delete(&self, token: Option<&str>, table: &str, filters: &[Filter]) -> AdapterResult<()> {
            self.inner.delete(token, table, filters).await
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl DataGateway for FailingGateway {
        async fn select(&self, _: Option<&str>, _: &Query) -> AdapterResult<Vec<Value>> {
            Err(AdapterError::Transport("connection refused".into()))
        }
        async fn count(&self, _: Option<&str>, _: &Query) -> AdapterResult<u64> {
            Err(AdapterError::Transport("connection refused".into()))
        }
        async fn insert(&self, _: Option<&str>, _: &str, _: Vec<Value>) -> AdapterResult<Vec<Value>> {
            Err(AdapterError::Transport("connection refused".into()))
        }
        async fn upsert(&self, _: Option<&str>, _: &str, _: Vec<Value>, _: &str) -> AdapterResult<Vec<Value>> {
            Err(AdapterError::Transport("connection refused".into()))
        }
        async fn update(&self, _: Option<&str>, _: &str, _: Value, _: &[Filter]) -> AdapterResult<Vec<Value>> {
            Err(AdapterError::Transport("connection refused".into()))
        }
        async fn delete(&self, _: Option<&str>, _: &str, _: &[Filter]) -> AdapterResult<()> {
            Err(AdapterError::Transport("connection refused".into()))
        }
    }

    async fn register(identity: &MemoryIdentity, email: &str, name: &str, role: &str) -> Uuid {
        let data = json!({ "full_name": name, "role": role });
        let outcome = identity
            .client()
            .sign_up(SignUp {
                email: email.to_string(),
                password: "secret1".to_string(),
                data: data.as_object().cloned().unwrap(),
            })
            .await
            .unwrap();
        outcome.user.id
    }

    #[tokio::test]
    async fn loading_clears_once_and_only_after_role_is_known() {
        let (gateway, identity) = database::memory();
        let user = register(&identity, "pat@example.com", "Pat Doe", "patient").await;
        let client = identity.client();
        client.sign_in_with_password("pat@example.com", "secret1").await.unwrap();

        let slow = SlowGateway {
            inner: gateway,
            slow_users: vec![user.to_string()],
            delay: Duration::from_millis(40),
        };
        let resolver = SessionResolver::start(client.clone(), Arc::new(slow));
        let mut rx = resolver.watch();
        assert!(rx.borrow_and_update().loading);

        let transitions = tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut last = true;
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                if state.loading != last {
                    seen.push((state.loading, state.role));
                    last = state.loading;
                }
            }
            seen
        });

        let state = resolver.settled(WAIT).await;
        assert!(!state.loading);
        assert_eq!(state.role, Some(Role::Patient));
        assert_eq!(state.profile.unwrap().full_name, "Pat Doe");

        client.sign_in_with_password("pat@example.com", "secret1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!resolver.snapshot().loading);

        drop(resolver);
        let seen = transitions.await.unwrap();
        assert_eq!(seen, vec![(false, Some(Role::Patient))]);
    }

    #[tokio::test]
    async fn latest_identity_wins_over_slower_fetches() {
        let (gateway, identity) = database::memory();
        let first = register(&identity, "first@example.com", "First", "patient").await;
        let second = register(&identity, "second@example.com", "Second", "doctor").await;

        let slow = SlowGateway {
            inner: gateway,
            slow_users: vec![first.to_string()],
            delay: Duration::from_millis(80),
        };
        let client = identity.client();
        let resolver = SessionResolver::start(client.clone(), Arc::new(slow));
        resolver.settled(WAIT).await;

        client.sign_in_with_password("first@example.com", "secret1").await.unwrap();
        client.sign_in_with_password("second@example.com", "secret1").await.unwrap();

        let state = resolver
            .wait_until(WAIT, |s| s.identity_id() == Some(second) && s.role.is_some())
            .await;
        assert_eq!(state.role, Some(Role::Doctor));

        // Let the first identity's fetches land; they must not overwrite.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let state = resolver.snapshot();
        assert_eq!(state.identity_id(), Some(second));
        assert_eq!(state.role, Some(Role::Doctor));
        assert_eq!(state.profile.unwrap().full_name, "Second");
    }

    #[tokio::test]
    async fn sign_out_clears_identity_role_and_profile() {
        let (gateway, identity) = database::memory();
        let user = register(&identity, "doc@example.com", "Dr. Who", "doctor").await;
        let client = identity.client();
        let resolver = SessionResolver::start(client.clone(), Arc::new(gateway));
        resolver.settled(WAIT).await;

        client.sign_in_with_password("doc@example.com", "secret1").await.unwrap();
        let state = resolver.adopt(user, WAIT).await;
        assert_eq!(state.role, Some(Role::Doctor));

        resolver.sign_out().await.unwrap();
        let state = resolver.snapshot();
        assert!(state.session.is_none());
        assert!(state.identity.is_none());
        assert!(state.role.is_none());
        assert!(state.profile.is_none());
    }

    #[tokio::test]
    async fn gateway_failures_are_swallowed_and_loading_still_clears() {
        let identity = MemoryIdentity::new(MemoryGateway::new());
        register(&identity, "nobody@example.com", "Nobody", "patient").await;
        let client = identity.client();
        client.sign_in_with_password("nobody@example.com", "secret1").await.unwrap();

        let resolver = SessionResolver::start(client, Arc::new(FailingGateway));
        let state = resolver.settled(WAIT).await;
        assert!(!state.loading);
        assert!(state.identity.is_some());
        assert_eq!(state.role, None);
        assert_eq!(state.profile, None);
    }
}
