//! Generic data models for the `adapters` crate.
//!
//! These models define backend-neutral representations of sessions, auth
//! change notifications and table queries, so the web backend can talk to any
//! adapter implementation through a consistent shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The signed-in user as the identity provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: String,
}

/// A provider-issued session. The user travels with the token so a session
/// can never exist without an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// One session transition, delivered to every subscriber.
#[derive(Debug, Clone)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

/// Sign-up payload. `data` becomes the user's metadata, which the backend
/// trigger reads to create the profile and role rows.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub data: Map<String, Value>,
}

/// Result of a sign-up. `session` is absent when the provider requires email
/// confirmation before the first sign-in.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: Identity,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    /// Matches when any inner filter matches.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn neq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Neq(column.to_string(), value.into())
    }

    pub fn is_null(column: &str) -> Self {
        Filter::IsNull(column.to_string())
    }
}

/// A related table pulled into each row under `alias`.
///
/// To-one embeds match `row[local_column] == related[foreign_column]` and
/// yield an object (or null); to-many embeds yield an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub alias: String,
    pub table: String,
    pub local_column: String,
    pub foreign_column: String,
    pub many: bool,
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
}

impl Embed {
    /// Parent row referenced by `local_column` (e.g. `hospital_id` → `hospitals.id`).
    pub fn one(table: &str, local_column: &str) -> Self {
        Self::one_by(table, table, local_column, "id")
    }

    /// Parent row matched on an arbitrary column pair, under a chosen alias.
    pub fn one_by(alias: &str, table: &str, local_column: &str, foreign_column: &str) -> Self {
        Embed {
            alias: alias.to_string(),
            table: table.to_string(),
            local_column: local_column.to_string(),
            foreign_column: foreign_column.to_string(),
            many: false,
            columns: Vec::new(),
            embeds: Vec::new(),
        }
    }

    /// Child rows whose `foreign_column` points back at this row's id.
    pub fn many(table: &str, foreign_column: &str) -> Self {
        Embed {
            alias: table.to_string(),
            table: table.to_string(),
            local_column: "id".to_string(),
            foreign_column: foreign_column.to_string(),
            many: true,
            columns: Vec::new(),
            embeds: Vec::new(),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }
}

/// A table read: projection, embedded relations, filters, ordering, limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: Vec<String>,
    pub embeds: Vec<Embed>,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: &str) -> Self {
        Query {
            table: table.to_string(),
            columns: Vec::new(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Restricts the projection. An empty projection selects every column.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::neq(column, value))
    }

    pub fn is_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Filter::In(column.to_string(), values))
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
