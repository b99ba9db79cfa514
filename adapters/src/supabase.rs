//! Supabase adapter implementation for the identity provider and data gateway.
//!
//! This file contains the concrete implementation of `IdentityProvider` over
//! GoTrue and `DataGateway` over PostgREST, including the HTTP client wrapper,
//! query string rendering and conversion of service responses and errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use log::{debug, warn};
use reqwest::{header::HeaderMap, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};

use crate::errors::{AdapterError, AdapterResult};
use crate::models::{
    AuthChange, AuthEvent, Direction, Embed, Filter, Identity, Query, Session, SignUp,
    SignUpOutcome,
};
use crate::{DataGateway, IdentityProvider, IdentityService};

const AUTH_EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), path)
    }
}

/// Builds the `select` parameter, e.g. `*,hospitals:hospitals!hospital_id(name)`.
pub fn select_clause(columns: &[String], embeds: &[Embed]) -> String {
    let mut parts: Vec<String> = if columns.is_empty() {
        vec!["*".to_string()]
    } else {
        columns.to_vec()
    };
    parts.extend(embeds.iter().map(embed_clause));
    parts.join(",")
}

fn embed_clause(embed: &Embed) -> String {
    let hint = if embed.many {
        &embed.foreign_column
    } else {
        &embed.local_column
    };
    let head = if embed.alias == embed.table {
        format!("{}!{}", embed.table, hint)
    } else {
        format!("{}:{}!{}", embed.alias, embed.table, hint)
    };
    format!("{}({})", head, select_clause(&embed.columns, &embed.embeds))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Values inside `in.(…)` and `or=(…)` lists are quoted when they contain
/// PostgREST delimiters.
fn render_list_value(value: &Value) -> String {
    let raw = render_value(value);
    if raw.contains(&[',', '(', ')', '"', '.', ':'][..]) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw
    }
}

fn filter_parts(filter: &Filter, nested: bool) -> (String, String) {
    let value = |v: &Value| {
        if nested {
            render_list_value(v)
        } else {
            render_value(v)
        }
    };
    match filter {
        Filter::Eq(column, v) => (column.clone(), format!("eq.{}", value(v))),
        Filter::Neq(column, v) => (column.clone(), format!("neq.{}", value(v))),
        Filter::In(column, values) => {
            let list: Vec<String> = values.iter().map(render_list_value).collect();
            (column.clone(), format!("in.({})", list.join(",")))
        }
        Filter::IsNull(column) => (column.clone(), "is.null".to_string()),
        Filter::Or(inner) => {
            let conditions: Vec<String> = inner
                .iter()
                .map(|f| {
                    let (column, expr) = filter_parts(f, true);
                    match f {
                        Filter::Or(_) => format!("{}{}", column, expr),
                        _ => format!("{}.{}", column, expr),
                    }
                })
                .collect();
            ("or".to_string(), format!("({})", conditions.join(",")))
        }
    }
}

/// Filter list as PostgREST query parameters.
pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters.iter().map(|f| filter_parts(f, false)).collect()
}

/// Full query string for a read.
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        select_clause(&query.columns, &query.embeds),
    )];
    params.extend(filter_params(&query.filters));
    if !query.order.is_empty() {
        let order: Vec<String> = query
            .order
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    Direction::Ascending => "asc",
                    Direction::Descending => "desc",
                };
                format!("{}.{}", o.column, dir)
            })
            .collect();
        params.push(("order".to_string(), order.join(",")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`.
pub fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    code: Option<Value>,
    error_code: Option<String>,
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(code)) => Some(code.clone()),
            _ => self.error_code.clone(),
        }
    }

    fn message(self, status: u16) -> String {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| format!("request failed with status {}", status))
    }
}

async fn read_error(response: Response) -> (u16, Option<String>, String) {
    let status = response.status().as_u16();
    let body: ErrorBody = response.json().await.unwrap_or_default();
    let code = body.code();
    (status, code, body.message(status))
}

async fn error_from(response: Response) -> AdapterError {
    let (status, code, message) = read_error(response).await;
    AdapterError::from_status(status, code, message)
}

/// Like `error_from`, but client errors from GoTrue are credential problems
/// whose message is shown to the user as-is.
async fn auth_error_from(response: Response) -> AdapterError {
    let (status, code, message) = read_error(response).await;
    if (400..500).contains(&status) {
        AdapterError::AuthRejected(message)
    } else {
        AdapterError::from_status(status, code, message)
    }
}

async fn rows(response: Response) -> AdapterResult<Vec<Value>> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }
    let body = response.bytes().await?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_slice(&body)? {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        row => Ok(vec![row]),
    }
}

/// PostgREST-backed table access.
#[derive(Clone)]
pub struct SupabaseGateway {
    http: reqwest::Client,
    config: Arc<SupabaseConfig>,
}

impl SupabaseGateway {
    pub fn new(http: reqwest::Client, config: Arc<SupabaseConfig>) -> Self {
        Self { http, config }
    }

    fn request(&self, method: Method, table: &str, token: Option<&str>) -> RequestBuilder {
        let url = self.config.endpoint(&format!("rest/v1/{}", table));
        self.http
            .request(method, url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token.unwrap_or(&self.config.anon_key))
    }
}

#[async_trait]
impl DataGateway for SupabaseGateway {
    async fn select(&self, token: Option<&str>, query: &Query) -> AdapterResult<Vec<Value>> {
        let params = query_params(query);
        debug!("GET {} {:?}", query.table, params);
        let response = self
            .request(Method::GET, &query.table, token)
            .query(&params)
            .send()
            .await?;
        rows(response).await
    }

    async fn count(&self, token: Option<&str>, query: &Query) -> AdapterResult<u64> {
        let params = query_params(query);
        debug!("HEAD {} {:?}", query.table, params);
        let response = self
            .request(Method::HEAD, &query.table, token)
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        let headers: &HeaderMap = response.headers();
        headers
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| AdapterError::Decode("missing Content-Range total".to_string()))
    }

    async fn insert(&self, token: Option<&str>, table: &str, rows_in: Vec<Value>) -> AdapterResult<Vec<Value>> {
        debug!("POST {} ({} rows)", table, rows_in.len());
        let response = self
            .request(Method::POST, table, token)
            .header("Prefer", "return=representation")
            .json(&rows_in)
            .send()
            .await?;
        rows(response).await
    }

    async fn upsert(
        &self,
        token: Option<&str>,
        table: &str,
        rows_in: Vec<Value>,
        on_conflict: &str,
    ) -> AdapterResult<Vec<Value>> {
        debug!("POST {} upsert on {} ({} rows)", table, on_conflict, rows_in.len());
        let response = self
            .request(Method::POST, table, token)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .query(&[("on_conflict", on_conflict)])
            .json(&rows_in)
            .send()
            .await?;
        rows(response).await
    }

    async fn update(
        &self,
        token: Option<&str>,
        table: &str,
        patch: Value,
        filters: &[Filter],
    ) -> AdapterResult<Vec<Value>> {
        let params = filter_params(filters);
        debug!("PATCH {} {:?}", table, params);
        let response = self
            .request(Method::PATCH, table, token)
            .header("Prefer", "return=representation")
            .query(&params)
            .json(&patch)
            .send()
            .await?;
        rows(response).await
    }

    async fn delete(&self, token: Option<&str>, table: &str, filters: &[Filter]) -> AdapterResult<()> {
        let params = filter_params(filters);
        debug!("DELETE {} {:?}", table, params);
        let response = self
            .request(Method::DELETE, table, token)
            .query(&params)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from(response).await)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: uuid::Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl From<GoTrueUser> for Identity {
    fn from(user: GoTrueUser) -> Self {
        Identity {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: GoTrueUser,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| Utc::now() + Duration::seconds(token.expires_in.unwrap_or(3600)));
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user.into(),
        }
    }
}

/// GoTrue-backed identity service; each browser session gets its own client.
#[derive(Clone)]
pub struct SupabaseIdentity {
    http: reqwest::Client,
    config: Arc<SupabaseConfig>,
}

impl SupabaseIdentity {
    pub fn new(http: reqwest::Client, config: Arc<SupabaseConfig>) -> Self {
        Self { http, config }
    }
}

/// Gateway and identity service sharing one HTTP connection pool.
pub fn connect(config: SupabaseConfig) -> (SupabaseGateway, SupabaseIdentity) {
    let http = reqwest::Client::new();
    let config = Arc::new(config);
    (
        SupabaseGateway::new(http.clone(), config.clone()),
        SupabaseIdentity::new(http, config),
    )
}

impl IdentityService for SupabaseIdentity {
    fn client(&self) -> Arc<dyn IdentityProvider> {
        Arc::new(SupabaseAuthClient::new(self.http.clone(), self.config.clone()))
    }
}

pub struct SupabaseAuthClient {
    http: reqwest::Client,
    config: Arc<SupabaseConfig>,
    session: Mutex<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
    initialized: AtomicBool,
}

impl SupabaseAuthClient {
    pub fn new(http: reqwest::Client, config: Arc<SupabaseConfig>) -> Self {
        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            http,
            config,
            session: Mutex::new(None),
            events,
            initialized: AtomicBool::new(false),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(self.config.endpoint(&format!("auth/v1/{}", path)))
            .header("apikey", &self.config.anon_key)
    }

    async fn grant(&self, grant_type: &str, body: Value) -> AdapterResult<Session> {
        let response = self
            .post("token")
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(auth_error_from(response).await);
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.into())
    }

    async fn store(&self, event: AuthEvent, session: Option<Session>) {
        *self.session.lock().await = session.clone();
        // No receivers is fine: nobody is listening yet.
        let _ = self.events.send(AuthChange { event, session });
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn get_session(&self) -> AdapterResult<Option<Session>> {
        let current = self.session.lock().await.clone();
        let session = match current {
            Some(session) if session.is_expired(Utc::now()) => {
                let body = json!({ "refresh_token": session.refresh_token });
                match self.grant("refresh_token", body).await {
                    Ok(refreshed) => {
                        self.store(AuthEvent::TokenRefreshed, Some(refreshed.clone())).await;
                        Some(refreshed)
                    }
                    Err(err) => {
                        warn!("session refresh failed, signing out locally: {}", err);
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
        let session = self
            .grant("password", json!({ "email": email, "password": password }))
            .await?;
        self.store(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_up(&self, request: SignUp) -> AdapterResult<SignUpOutcome> {
        let response = self
            .post("signup")
            .json(&json!({
                "email": request.email,
                "password": request.password,
                "data": request.data,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(auth_error_from(response).await);
        }
        let body: Value = response.json().await?;
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value::<TokenResponse>(body)?.into();
            self.store(AuthEvent::SignedIn, Some(session.clone())).await;
            return Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            });
        }
        // Email confirmation pending: the body is the user itself.
        let user = body.get("user").cloned().unwrap_or(body);
        let user: GoTrueUser = serde_json::from_value(user)?;
        Ok(SignUpOutcome {
            user: user.into(),
            session: None,
        })
    }

    async fn sign_in_with_otp(&self, email: &str) -> AdapterResult<()> {
        let response = self
            .post("otp")
            .json(&json!({ "email": email, "create_user": false }))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(auth_error_from(response).await)
        }
    }

    async fn verify_otp(&self, email: &str, code: &str) -> AdapterResult<Session> {
        let response = self
            .post("verify")
            .json(&json!({ "type": "email", "email": email, "token": code }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(auth_error_from(response).await);
        }
        let token: TokenResponse = response.json().await?;
        let session: Session = token.into();
        self.store(AuthEvent::SignedIn, Some(session.clone())).await;
        Ok(session)
    }

    async fn sign_out(&self) -> AdapterResult<()> {
        let current = self.session.lock().await.clone();
        let result = match current {
            Some(session) => {
                let response = self
                    .post("logout")
                    .bearer_auth(&session.access_token)
                    .send()
                    .await;
                match response {
                    Ok(r) if r.status().is_success() => Ok(()),
                    Ok(r) => Err(error_from(r).await),
                    Err(err) => Err(err.into()),
                }
            }
            None => Ok(()),
        };
        // The local session is dropped whatever the server said.
        self.store(AuthEvent::SignedOut, None).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn renders_nested_embeds_with_column_hints() {
        let query = Query::table("appointments").embed(
            Embed::one("patients", "patient_id")
                .columns(&["user_id"])
                .embed(Embed::one_by("profiles", "profiles", "user_id", "user_id").columns(&["full_name"])),
        );
        let params = query_params(&query);
        assert_eq!(
            param(&params, "select"),
            Some("*,patients!patient_id(user_id,profiles!user_id(full_name))")
        );
    }

    #[test]
    fn renders_alias_and_to_many_embeds() {
        let query = Query::table("consultations")
            .select(&["id", "observations"])
            .embed(Embed::one_by("doctor", "doctors", "doctor_id", "id").columns(&["specialty"]))
            .embed(Embed::many("prescriptions", "consultation_id"));
        let params = query_params(&query);
        assert_eq!(
            param(&params, "select"),
            Some("id,observations,doctor:doctors!doctor_id(specialty),prescriptions!consultation_id(*)")
        );
    }

    #[test]
    fn renders_filters_order_and_limit() {
        let query = Query::table("appointments")
            .eq("hospital_id", "h1")
            .neq("status", "cancelled")
            .is_in("patient_id", ["a", "b"])
            .filter(Filter::is_null("notes"))
            .order("appointment_date", Direction::Descending)
            .order("appointment_time", Direction::Ascending)
            .limit(50);
        let params = query_params(&query);
        assert_eq!(param(&params, "hospital_id"), Some("eq.h1"));
        assert_eq!(param(&params, "status"), Some("neq.cancelled"));
        assert_eq!(param(&params, "patient_id"), Some("in.(a,b)"));
        assert_eq!(param(&params, "notes"), Some("is.null"));
        assert_eq!(
            param(&params, "order"),
            Some("appointment_date.desc,appointment_time.asc")
        );
        assert_eq!(param(&params, "limit"), Some("50"));
    }

    #[test]
    fn renders_or_groups_and_quotes_delimiters() {
        let filters = vec![Filter::Or(vec![
            Filter::neq("hospital_id", "h1"),
            Filter::is_null("hospital_id"),
            Filter::eq("city", "Lagos, Island"),
        ])];
        let params = filter_params(&filters);
        assert_eq!(
            params,
            vec![(
                "or".to_string(),
                "(hospital_id.neq.h1,hospital_id.is.null,city.eq.\"Lagos, Island\")".to_string()
            )]
        );
    }

    #[test]
    fn reads_content_range_totals() {
        assert_eq!(parse_content_range("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-24/*"), None);
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = AdapterError::from_status(409, Some("23505".into()), "duplicate key".into());
        assert!(err.is_conflict());
        let err = AdapterError::from_status(403, Some("42501".into()), "permission denied".into());
        assert!(matches!(err, AdapterError::Denied(_)));
    }

    #[test]
    fn token_response_prefers_absolute_expiry() {
        let token: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 1_700_000_000,
            "user": { "id": "6f1e5bd2-1b35-4d6e-9bb5-1b6a3f0f8f10", "email": "p@example.com" }
        }))
        .unwrap();
        let session: Session = token.into();
        assert_eq!(session.expires_at.timestamp(), 1_700_000_000);
        assert_eq!(session.user.email, "p@example.com");
    }
}
