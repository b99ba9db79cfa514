//! Module for backend-as-a-service connection setup.
//!
//! Builds the data gateway and identity service selected by the configuration.
//! The in-memory backend is given the same unique constraints as the hosted
//! schema and a sign-up hook that mirrors its new-user trigger.

pub mod models;
pub mod queries;

use std::sync::Arc;

use adapters::memory::{MemoryGateway, MemoryIdentity, SignUpHook};
use adapters::supabase::{self, SupabaseConfig};
use adapters::{DataGateway, Identity, IdentityService};
use serde_json::{json, Map, Value};

use crate::config::{Backend, Config};
use crate::errors::AppResult;

pub struct Connections {
    pub gateway: Arc<dyn DataGateway>,
    pub identity: Arc<dyn IdentityService>,
}

pub fn connect(config: &Config) -> AppResult<Connections> {
    match config.backend {
        Backend::Supabase => {
            let (url, anon_key) = config.supabase_credentials()?;
            tracing::info!("using supabase project at {}", url);
            let (gateway, identity) = supabase::connect(SupabaseConfig { url, anon_key });
            Ok(Connections {
                gateway: Arc::new(gateway),
                identity: Arc::new(identity),
            })
        }
        Backend::Memory => {
            tracing::info!("using in-memory backend; data is lost on exit");
            let (gateway, identity) = memory();
            Ok(Connections {
                gateway: Arc::new(gateway),
                identity: Arc::new(identity),
            })
        }
    }
}

/// In-memory gateway and identity service with the H Connect schema rules.
pub fn memory() -> (MemoryGateway, MemoryIdentity) {
    let gateway = MemoryGateway::new()
        .unique("profiles", &["user_id"])
        .unique("user_roles", &["user_id"])
        .unique("patients", &["user_id"])
        .unique("doctors", &["user_id"])
        .unique("doctor_requests", &["hospital_id", "doctor_id"]);
    let identity = MemoryIdentity::new(gateway.clone()).on_sign_up(new_user_trigger());
    (gateway, identity)
}

/// Creates the profile and role rows from sign-up metadata, plus the patient
/// row for patients. Doctor rows are written by the sign-up handler.
fn new_user_trigger() -> SignUpHook {
    Arc::new(|gateway: &MemoryGateway, user: &Identity, data: &Map<String, Value>| {
        let user_id = user.id.to_string();
        let role = data
            .get("role")
            .and_then(|r| r.as_str())
            .unwrap_or("patient")
            .to_string();
        let full_name = data
            .get("full_name")
            .and_then(|n| n.as_str())
            .unwrap_or_default();
        gateway.seed(
            "profiles",
            vec![json!({ "user_id": user_id, "full_name": full_name })],
        );
        gateway.seed(
            "user_roles",
            vec![json!({ "user_id": user_id, "role": role })],
        );
        if role == "patient" {
            gateway.seed(
                "patients",
                vec![json!({ "user_id": user_id, "consent_given": false })],
            );
        }
    })
}
