//! Browser sessions and their resolvers, keyed by the session cookie.
//!
//! Each entry remembers when it was last used. Entries idle for longer than
//! the idle timeout are dropped on access and by `run_sweeper`; signed-out
//! entries go after a short grace period. Dropping the last `Arc` of a
//! resolver stops its listener task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use adapters::{DataGateway, IdentityProvider, IdentityService};
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::service::SessionResolver;

const DEFAULT_IDLE: Duration = Duration::from_secs(60 * 60);
const SIGNED_OUT_GRACE: Duration = Duration::from_secs(60);

struct Entry {
    resolver: Arc<SessionResolver>,
    last_seen: Instant,
}

impl Entry {
    fn expired(&self, now: Instant, idle: Duration) -> bool {
        let unused = now.saturating_duration_since(self.last_seen);
        if unused > idle {
            return true;
        }
        let state = self.resolver.snapshot();
        !state.loading && state.identity.is_none() && unused > SIGNED_OUT_GRACE.min(idle)
    }
}

pub struct SessionStore {
    identity: Arc<dyn IdentityService>,
    gateway: Arc<dyn DataGateway>,
    idle: Duration,
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityService>, gateway: Arc<dyn DataGateway>) -> Self {
        Self {
            identity,
            gateway,
            idle: DEFAULT_IDLE,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn idle_timeout(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// A provider client that is not tied to any browser session, for calls
    /// that do not sign anyone in (sending a one-time code).
    pub fn detached_client(&self) -> Arc<dyn IdentityProvider> {
        self.identity.client()
    }

    /// Starts a resolver over a fresh provider client under a new session id.
    pub async fn create(&self) -> (Uuid, Arc<SessionResolver>) {
        let id = Uuid::new_v4();
        let resolver = Arc::new(SessionResolver::start(
            self.identity.client(),
            self.gateway.clone(),
        ));
        let entry = Entry {
            resolver: resolver.clone(),
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        tracing::debug!("browser session {} started", id);
        (id, resolver)
    }

    /// The live resolver for `id`, marking it as used. An expired entry is
    /// dropped and reported as missing.
    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionResolver>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let last_seen = sessions.get(&id)?.last_seen;
        if now.saturating_duration_since(last_seen) > self.idle {
            sessions.remove(&id);
            tracing::debug!("browser session {} expired", id);
            return None;
        }
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(entry.resolver.clone())
    }

    /// The resolver for `id`, or a new session when `id` is unknown.
    pub async fn get_or_create(&self, id: Option<Uuid>) -> (Uuid, Arc<SessionResolver>) {
        if let Some(id) = id {
            if let Some(resolver) = self.get(id).await {
                return (id, resolver);
            }
        }
        self.create().await
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<SessionResolver>> {
        let removed = self.sessions.write().await.remove(&id).map(|e| e.resolver);
        if removed.is_some() {
            tracing::debug!("browser session {} ended", id);
        }
        removed
    }

    /// Drops idle and signed-out sessions; returns how many were dropped.
    pub async fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.expired(now, self.idle));
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!("evicted {} browser sessions", evicted);
        }
        evicted
    }

    /// Evicts expired sessions every `period`, forever.
    pub async fn run_sweeper(&self, period: Duration) {
        let mut ticks = tokio::time::interval(period);
        loop {
            ticks.tick().await;
            self.evict_expired().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;

    fn store() -> SessionStore {
        let (gateway, identity) = database::memory();
        SessionStore::new(Arc::new(identity), Arc::new(gateway))
    }

    #[tokio::test]
    async fn unknown_ids_get_a_fresh_session() {
        let store = store();

        let (id, first) = store.get_or_create(None).await;
        let (same, again) = store.get_or_create(Some(id)).await;
        assert_eq!(id, same);
        assert!(Arc::ptr_eq(&first, &again));

        let (other, _) = store.get_or_create(Some(Uuid::new_v4())).await;
        assert_ne!(other, id);
        assert_eq!(store.len().await, 2);

        assert!(store.remove(id).await.is_some());
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let store = store().idle_timeout(Duration::from_millis(20));
        let (idle, _) = store.create().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        let (fresh, _) = store.create().await;

        assert_eq!(store.evict_expired().await, 1);
        assert!(store.get(idle).await.is_none());
        assert!(store.get(fresh).await.is_some());
    }

    #[tokio::test]
    async fn an_expired_session_is_not_handed_out() {
        let store = store().idle_timeout(Duration::from_millis(20));
        let (id, _) = store.create().await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let (replacement, _) = store.get_or_create(Some(id)).await;
        assert_ne!(replacement, id);
        assert_eq!(store.len().await, 1);
    }
}
