//! In-process adapter implementation for local development and tests.
//!
//! `MemoryGateway` keeps every table as a list of JSON rows and evaluates the
//! same `Query` model the Supabase adapter renders to PostgREST, including
//! embedded relations and unique constraints. `MemoryIdentity` is a user
//! directory with password and one-time-code sign-in, and runs a configurable
//! sign-up hook in place of the hosted backend's database trigger.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{debug, info};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::errors::{AdapterError, AdapterResult};
use crate::models::{
    AuthChange, AuthEvent, Direction, Embed, Filter, Identity, Query, Session, SignUp,
    SignUpOutcome,
};
use crate::{DataGateway, IdentityProvider, IdentityService};

type Row = Map<String, Value>;

fn poisoned() -> AdapterError {
    AdapterError::Transport("memory store lock poisoned".to_string())
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), other) | (other, Value::String(x)) => *x == other.to_string(),
        _ => a == b,
    }
}

fn field<'a>(row: &'a Row, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches(row: &Row, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(column, value) => loose_eq(field(row, column), value),
        // SQL semantics: NULL <> x is not true.
        Filter::Neq(column, value) => {
            let current = field(row, column);
            !current.is_null() && !loose_eq(current, value)
        }
        Filter::In(column, values) => values.iter().any(|v| loose_eq(field(row, column), v)),
        Filter::IsNull(column) => field(row, column).is_null(),
        Filter::Or(inner) => inner.iter().any(|f| matches(row, f)),
    }
}

fn compare(a: &Value, b: &Value) -> CmpOrdering {
    match (a, b) {
        (Value::Null, Value::Null) => CmpOrdering::Equal,
        (Value::Null, _) => CmpOrdering::Greater,
        (_, Value::Null) => CmpOrdering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// Table rows keyed by table name, plus declared unique column sets.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    unique: Arc<RwLock<HashMap<String, Vec<Vec<String>>>>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a unique constraint; colliding inserts fail with a conflict.
    pub fn unique(self, table: &str, columns: &[&str]) -> Self {
        if let Ok(mut unique) = self.unique.write() {
            unique
                .entry(table.to_string())
                .or_default()
                .push(columns.iter().map(|c| c.to_string()).collect());
        }
        self
    }

    /// Inserts rows directly, bypassing constraints. Returns the stored rows.
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Vec<Value> {
        let Ok(mut tables) = self.tables.write() else {
            return Vec::new();
        };
        let stored: Vec<Row> = rows.into_iter().filter_map(into_row).map(stamp).collect();
        tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        stored.into_iter().map(Value::Object).collect()
    }

    /// Every row of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .read()
            .map(|tables| {
                tables
                    .get(table)
                    .map(|rows| rows.iter().cloned().map(Value::Object).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn check_unique(&self, table: &str, existing: &[Row], row: &Row) -> AdapterResult<()> {
        let unique = self.unique.read().map_err(|_| poisoned())?;
        for columns in unique.get(table).into_iter().flatten() {
            let collides = existing.iter().any(|other| {
                columns
                    .iter()
                    .all(|c| loose_eq(field(other, c), field(row, c)))
            });
            if collides {
                return Err(AdapterError::Conflict {
                    message: format!(
                        "duplicate key value violates unique constraint \"{}_{}_key\"",
                        table,
                        columns.join("_")
                    ),
                });
            }
        }
        Ok(())
    }
}

fn into_row(value: Value) -> Option<Row> {
    match value {
        Value::Object(row) => Some(row),
        _ => None,
    }
}

fn stamp(mut row: Row) -> Row {
    row.entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    let now = timestamp();
    row.entry("created_at").or_insert_with(|| now.clone());
    row.entry("updated_at").or_insert(now);
    row
}

fn project(tables: &HashMap<String, Vec<Row>>, row: &Row, columns: &[String], embeds: &[Embed]) -> Row {
    let mut out = if columns.is_empty() {
        row.clone()
    } else {
        columns
            .iter()
            .map(|c| (c.clone(), field(row, c).clone()))
            .collect()
    };
    for embed in embeds {
        let key = field(row, &embed.local_column);
        let related = tables
            .get(&embed.table)
            .map(|rows| rows.as_slice())
            .unwrap_or_default();
        let mut hits = related
            .iter()
            .filter(|r| loose_eq(field(r, &embed.foreign_column), key))
            .map(|r| Value::Object(project(tables, r, &embed.columns, &embed.embeds)));
        let value = if embed.many {
            Value::Array(hits.collect())
        } else {
            hits.next().unwrap_or(Value::Null)
        };
        out.insert(embed.alias.clone(), value);
    }
    out
}

fn filtered<'a>(rows: &'a [Row], filters: &'a [Filter]) -> impl Iterator<Item = &'a Row> {
    rows.iter().filter(move |row| filters.iter().all(|f| matches(row, f)))
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn select(&self, _token: Option<&str>, query: &Query) -> AdapterResult<Vec<Value>> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let rows = tables.get(&query.table).map(Vec::as_slice).unwrap_or_default();
        let mut hits: Vec<&Row> = filtered(rows, &query.filters).collect();
        for order in query.order.iter().rev() {
            hits.sort_by(|a, b| {
                let ord = compare(field(a, &order.column), field(b, &order.column));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(hits
            .into_iter()
            .take(limit)
            .map(|row| Value::Object(project(&tables, row, &query.columns, &query.embeds)))
            .collect())
    }

    async fn count(&self, _token: Option<&str>, query: &Query) -> AdapterResult<u64> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        let rows = tables.get(&query.table).map(Vec::as_slice).unwrap_or_default();
        Ok(filtered(rows, &query.filters).count() as u64)
    }

    async fn insert(&self, _token: Option<&str>, table: &str, rows: Vec<Value>) -> AdapterResult<Vec<Value>> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let existing = tables.entry(table.to_string()).or_default();
        let mut staged: Vec<Row> = Vec::with_capacity(rows.len());
        for value in rows {
            let row = into_row(value)
                .ok_or_else(|| AdapterError::Decode("rows must be JSON objects".to_string()))?;
            let row = stamp(row);
            self.check_unique(table, existing, &row)?;
            self.check_unique(table, &staged, &row)?;
            staged.push(row);
        }
        existing.extend(staged.iter().cloned());
        debug!("memory insert into {}: {} rows", table, staged.len());
        Ok(staged.into_iter().map(Value::Object).collect())
    }

    async fn upsert(
        &self,
        _token: Option<&str>,
        table: &str,
        rows: Vec<Value>,
        on_conflict: &str,
    ) -> AdapterResult<Vec<Value>> {
        let keys: Vec<&str> = on_conflict.split(',').map(str::trim).collect();
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let existing = tables.entry(table.to_string()).or_default();
        let mut out = Vec::new();
        for value in rows {
            let row = into_row(value)
                .ok_or_else(|| AdapterError::Decode("rows must be JSON objects".to_string()))?;
            let position = existing
                .iter()
                .position(|other| keys.iter().all(|k| loose_eq(field(other, k), field(&row, k))));
            match position {
                Some(index) => {
                    let target = &mut existing[index];
                    for (k, v) in row {
                        target.insert(k, v);
                    }
                    target.insert("updated_at".to_string(), timestamp());
                    out.push(Value::Object(target.clone()));
                }
                None => {
                    let row = stamp(row);
                    self.check_unique(table, existing, &row)?;
                    existing.push(row.clone());
                    out.push(Value::Object(row));
                }
            }
        }
        Ok(out)
    }

    async fn update(
        &self,
        _token: Option<&str>,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> AdapterResult<Vec<Value>> {
        let patch = into_row(patch)
            .ok_or_else(|| AdapterError::Decode("patch must be a JSON object".to_string()))?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let mut out = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| filters.iter().all(|f| matches(row, f))) {
                for (k, v) in &patch {
                    row.insert(k.clone(), v.clone());
                }
                row.insert("updated_at".to_string(), timestamp());
                out.push(Value::Object(row.clone()));
            }
        }
        Ok(out)
    }

    async fn delete(&self, _token: Option<&str>, table: &str, filters: &[Filter]) -> AdapterResult<()> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| !filters.iter().all(|f| matches(row, f)));
        }
        Ok(())
    }
}

/// Runs after an account is created, with the new user and its metadata.
pub type SignUpHook = Arc<dyn Fn(&MemoryGateway, &Identity, &Map<String, Value>) + Send + Sync>;

struct Account {
    identity: Identity,
    password: String,
}

#[derive(Default)]
struct Directory {
    accounts: HashMap<String, Account>,
    codes: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
}

/// Shared user directory; hands out one `MemoryAuthClient` per browser session.
#[derive(Clone)]
pub struct MemoryIdentity {
    directory: Arc<RwLock<Directory>>,
    gateway: MemoryGateway,
    on_sign_up: Option<SignUpHook>,
    session_ttl: Duration,
}

impl MemoryIdentity {
    pub fn new(gateway: MemoryGateway) -> Self {
        Self {
            directory: Arc::new(RwLock::new(Directory::default())),
            gateway,
            on_sign_up: None,
            session_ttl: Duration::hours(1),
        }
    }

    pub fn on_sign_up(mut self, hook: SignUpHook) -> Self {
        self.on_sign_up = Some(hook);
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// The last one-time code issued for `email`; stands in for the mailbox.
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.directory
            .read()
            .ok()?
            .codes
            .get(&email.to_lowercase())
            .cloned()
    }

    fn issue(&self, identity: &Identity) -> AdapterResult<Session> {
        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            expires_at: Utc::now() + self.session_ttl,
            user: identity.clone(),
        };
        self.directory
            .write()
            .map_err(|_| poisoned())?
            .refresh_tokens
            .insert(session.refresh_token.clone(), identity.email.clone());
        Ok(session)
    }

    fn refresh(&self, refresh_token: &str) -> AdapterResult<Session> {
        let identity = {
            let mut directory = self.directory.write().map_err(|_| poisoned())?;
            let email = directory
                .refresh_tokens
                .remove(refresh_token)
                .ok_or_else(|| AdapterError::AuthRejected("Invalid Refresh Token".to_string()))?;
            directory
                .accounts
                .get(&email)
                .map(|a| a.identity.clone())
                .ok_or_else(|| AdapterError::AuthRejected("User not found".to_string()))?
        };
        self.issue(&identity)
    }

    fn revoke(&self, refresh_token: &str) {
        if let Ok(mut directory) = self.directory.write() {
            directory.refresh_tokens.remove(refresh_token);
        }
    }
}

impl IdentityService for MemoryIdentity {
    fn client(&self) -> Arc<dyn IdentityProvider> {
        Arc::new(MemoryAuthClient::new(self.clone()))
    }
}

pub struct MemoryAuthClient {
    identity: MemoryIdentity,
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
    initialized: AtomicBool,
}

impl MemoryAuthClient {
    pub fn new(identity: MemoryIdentity) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            identity,
            session: Mutex::new(None),
            events,
            initialized: AtomicBool::new(false),
        }
    }

    async fn store(&self, event: AuthEvent, session: Option<Session>) {
        *self.session.lock().await = session.clone();
        let _ = self.events.send(AuthChange { event, session });
    }
}

#[async_trait]
impl IdentityProvider for MemoryAuthClient {
    async fn get_session(&self) -> AdapterResult<Option<Session>> {
        let current = self.session.lock().await.clone();
        let session = match current {
            Some(session) if session.is_expired(Utc::now()) => {
                match self.identity.refresh(&session.refresh_token) {
                    Ok(refreshed) => {
                        self.store(AuthEvent::TokenRefreshed, Some(refreshed.clone())).await;
                        Some(refreshed)
                    }
                    Err(_) => {
                        self.store(AuthEvent::SignedOut, None).await;
                        None
                    }
                }
            }
            other => other,
        };
        if !self.initialized.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(AuthChange {
                event: AuthEvent::InitialSession,
                session: session.clone(),
            });
        }
        Ok(session)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AdapterResult<Session> {
        let identity = {
            let directory = self.identity.directory.read().map_err(|_| poisoned())?;
            match directory.accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => {
                    return Err(AdapterError::AuthRejected(
                        "Invalid login credentials".to_string(),
                    ))
                }
            }
        };
        let session = self.identity.issue(&identity)?;
        self.store(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_up(&self, request: SignUp) -> AdapterResult<SignUpOutcome> {
        if request.password.chars().count() < 6 {
            return Err(AdapterError::AuthRejected(
                "Password should be at least 6 characters.".to_string(),
            ));
        }
        let email = request.email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AdapterError::AuthRejected(
                "Unable to validate email address: invalid format".to_string(),
            ));
        }
        let identity = {
            let mut directory = self.identity.directory.write().map_err(|_| poisoned())?;
            if directory.accounts.contains_key(&email) {
                return Err(AdapterError::AuthRejected("User already registered".to_string()));
            }
            let identity = Identity {
                id: Uuid::new_v4(),
                email: email.clone(),
            };
            directory.accounts.insert(
                email,
                Account {
                    identity: identity.clone(),
                    password: request.password,
                },
            );
            identity
        };
        if let Some(hook) = &self.identity.on_sign_up {
            hook(&self.identity.gateway, &identity, &request.data);
        }
        let session = self.identity.issue(&identity)?;
        self.store(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(SignUpOutcome {
            user: identity,
            session: Some(session),
        })
    }

    async fn sign_in_with_otp(&self, email: &str) -> AdapterResult<()> {
        let email = email.trim().to_lowercase();
        let mut directory = self.identity.directory.write().map_err(|_| poisoned())?;
        if !directory.accounts.contains_key(&email) {
            return Err(AdapterError::AuthRejected("Signups not allowed for otp".to_string()));
        }
        let code = format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000);
        // No mailbox in memory mode.
        info!("one-time code for {}: {}", email, code);
        directory.codes.insert(email, code);
        Ok(())
    }

    async fn verify_otp(&self, email: &str, code: &str) -> AdapterResult<Session> {
        let email = email.trim().to_lowercase();
        let identity = {
            let mut directory = self.identity.directory.write().map_err(|_| poisoned())?;
            match directory.codes.get(&email) {
                Some(expected) if expected == code.trim() => {
                    directory.codes.remove(&email);
                }
                _ => {
                    return Err(AdapterError::AuthRejected(
                        "Token has expired or is invalid".to_string(),
                    ))
                }
            }
            directory
                .accounts
                .get(&email)
                .map(|a| a.identity.clone())
                .ok_or_else(|| AdapterError::AuthRejected("User not found".to_string()))?
        };
        let session = self.identity.issue(&identity)?;
        self.store(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_out(&self) -> AdapterResult<()> {
        if let Some(session) = self.session.lock().await.as_ref() {
            self.identity.revoke(&session.refresh_token);
        }
        self.store(AuthEvent::SignedOut, None).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway() -> MemoryGateway {
        let gw = MemoryGateway::new().unique("doctor_requests", &["hospital_id", "doctor_id"]);
        gw.seed(
            "hospitals",
            vec![
                json!({ "id": "h1", "name": "St. Mary", "city": "Lagos" }),
                json!({ "id": "h2", "name": "General", "city": "Abuja" }),
            ],
        );
        gw.seed(
            "doctors",
            vec![
                json!({ "id": "d1", "user_id": "u1", "hospital_id": "h1", "specialty": "Cardiology" }),
                json!({ "id": "d2", "user_id": "u2", "hospital_id": "h2", "specialty": "General" }),
                json!({ "id": "d3", "user_id": "u3", "hospital_id": null, "specialty": "General" }),
            ],
        );
        gw.seed(
            "profiles",
            vec![
                json!({ "user_id": "u1", "full_name": "Ada Obi" }),
                json!({ "user_id": "u2", "full_name": "Bayo Ade" }),
            ],
        );
        gw
    }

    #[tokio::test]
    async fn select_applies_filters_order_and_limit() {
        let gw = gateway();
        let query = Query::table("doctors")
            .eq("specialty", "General")
            .order("id", Direction::Descending)
            .limit(1);
        let rows = gw.select(None, &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "d3");
    }

    #[tokio::test]
    async fn neq_or_is_null_selects_doctors_outside_a_hospital() {
        let gw = gateway();
        let query = Query::table("doctors")
            .select(&["id"])
            .filter(Filter::Or(vec![
                Filter::neq("hospital_id", "h1"),
                Filter::is_null("hospital_id"),
            ]))
            .order("id", Direction::Ascending);
        let rows = gw.select(None, &query).await.unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(|r| r["id"].as_str()).collect();
        assert_eq!(ids, vec!["d2", "d3"]);
    }

    #[tokio::test]
    async fn embeds_resolve_to_one_and_to_many_relations() {
        let gw = gateway();
        let query = Query::table("doctors")
            .eq("id", "d1")
            .embed(Embed::one("hospitals", "hospital_id").columns(&["name"]))
            .embed(Embed::one_by("profiles", "profiles", "user_id", "user_id").columns(&["full_name"]));
        let rows = gw.select(None, &query).await.unwrap();
        assert_eq!(rows[0]["hospitals"], json!({ "name": "St. Mary" }));
        assert_eq!(rows[0]["profiles"]["full_name"], "Ada Obi");

        let query = Query::table("hospitals")
            .eq("id", "h1")
            .embed(Embed::many("doctors", "hospital_id").columns(&["id"]));
        let rows = gw.select(None, &query).await.unwrap();
        assert_eq!(rows[0]["doctors"], json!([{ "id": "d1" }]));

        let query = Query::table("doctors")
            .eq("id", "d3")
            .embed(Embed::one("hospitals", "hospital_id"));
        let rows = gw.select(None, &query).await.unwrap();
        assert!(rows[0]["hospitals"].is_null());
    }

    #[tokio::test]
    async fn unique_constraint_rejects_duplicate_request() {
        let gw = gateway();
        let row = json!({ "hospital_id": "h1", "doctor_id": "d3", "status": "pending" });
        let stored = gw.insert(None, "doctor_requests", vec![row.clone()]).await.unwrap();
        assert!(stored[0]["id"].is_string());
        let err = gw.insert(None, "doctor_requests", vec![row]).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn update_upsert_and_delete_mutate_matching_rows() {
        let gw = gateway();
        let updated = gw
            .update(None, "doctors", json!({ "hospital_id": "h1" }), &[Filter::eq("id", "d3")])
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        let count = gw
            .count(None, &Query::table("doctors").eq("hospital_id", "h1"))
            .await
            .unwrap();
        assert_eq!(count, 2);

        gw.upsert(
            None,
            "doctors",
            vec![json!({ "user_id": "u3", "specialty": "Pediatrics" })],
            "user_id",
        )
        .await
        .unwrap();
        let rows = gw.select(None, &Query::table("doctors").eq("user_id", "u3")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["specialty"], "Pediatrics");

        gw.delete(None, "doctors", &[Filter::eq("id", "d3")]).await.unwrap();
        assert_eq!(gw.rows("doctors").len(), 2);
    }

    #[tokio::test]
    async fn password_and_code_sign_in_emit_session_changes() {
        let identity = MemoryIdentity::new(MemoryGateway::new());
        let client = identity.client();
        let mut events = client.subscribe();

        assert_eq!(client.get_session().await.unwrap(), None);
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::InitialSession);

        let outcome = client
            .sign_up(SignUp {
                email: "Pat@Example.com".into(),
                password: "secret1".into(),
                data: Map::new(),
            })
            .await
            .unwrap();
        assert_eq!(outcome.user.email, "pat@example.com");
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::SignedIn);

        client.sign_out().await.unwrap();
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::SignedOut);

        let err = client
            .sign_in_with_password("pat@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");

        client.sign_in_with_otp("pat@example.com").await.unwrap();
        let code = identity.last_code("pat@example.com").unwrap();
        assert!(client.verify_otp("pat@example.com", "000000x").await.is_err());
        let session = client.verify_otp("pat@example.com", &code).await.unwrap();
        assert_eq!(session.user.id, outcome.user.id);
        assert!(identity.last_code("pat@example.com").is_none());
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_on_read() {
        let identity = MemoryIdentity::new(MemoryGateway::new()).session_ttl(Duration::seconds(-1));
        let client = identity.client();
        let outcome = client
            .sign_up(SignUp {
                email: "doc@example.com".into(),
                password: "secret1".into(),
                data: Map::new(),
            })
            .await
            .unwrap();
        let first = outcome.session.unwrap();
        let mut events = client.subscribe();
        let refreshed = client.get_session().await.unwrap().unwrap();
        assert_ne!(refreshed.access_token, first.access_token);
        assert_eq!(events.recv().await.unwrap().event, AuthEvent::TokenRefreshed);
    }
}
