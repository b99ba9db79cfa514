//! Reusable gateway reads.
//!
//! Typed wrappers over `DataGateway::select` plus the lookups every screen
//! starts with: the caller's role, profile, and domain row (doctor, patient,
//! or the hospital an admin is linked to).

use adapters::{AdapterError, DataGateway, Embed, Query};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::models::{Profile, Role};
use crate::database::models::{Doctor, Patient};
use crate::errors::{AppError, AppResult};

pub fn decode<T: DeserializeOwned>(rows: Vec<Value>) -> AppResult<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| AppError::from(AdapterError::from(e))))
        .collect()
}

pub async fn fetch_all<T: DeserializeOwned>(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    query: &Query,
) -> AppResult<Vec<T>> {
    decode(gateway.select(token, query).await?)
}

/// First matching row, if any.
pub async fn fetch_optional<T: DeserializeOwned>(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    query: Query,
) -> AppResult<Option<T>> {
    let rows = fetch_all(gateway, token, &query.limit(1)).await?;
    Ok(rows.into_iter().next())
}

/// `profiles` embedded through a `user_id` column.
pub fn profile_embed(columns: &[&str]) -> Embed {
    Embed::one_by("profiles", "profiles", "user_id", "user_id").columns(columns)
}

#[derive(serde::Deserialize)]
struct RoleRow {
    role: Role,
}

pub async fn role_for_user(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    user_id: Uuid,
) -> AppResult<Option<Role>> {
    let query = Query::table("user_roles")
        .select(&["role"])
        .eq("user_id", user_id.to_string());
    let row: Option<RoleRow> = fetch_optional(gateway, token, query).await?;
    Ok(row.map(|r| r.role))
}

pub async fn profile_for_user(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    user_id: Uuid,
) -> AppResult<Option<Profile>> {
    let query = Query::table("profiles")
        .select(&["full_name", "phone", "avatar_url"])
        .eq("user_id", user_id.to_string());
    fetch_optional(gateway, token, query).await
}

pub async fn doctor_for_user(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    user_id: Uuid,
) -> AppResult<Option<Doctor>> {
    let query = Query::table("doctors").eq("user_id", user_id.to_string());
    fetch_optional(gateway, token, query).await
}

pub async fn patient_for_user(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    user_id: Uuid,
) -> AppResult<Option<Patient>> {
    let query = Query::table("patients").eq("user_id", user_id.to_string());
    fetch_optional(gateway, token, query).await
}

/// Admins are linked to their hospital through their own `doctors` row.
pub async fn hospital_id_for_admin(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    user_id: Uuid,
) -> AppResult<Option<Uuid>> {
    let doctor = doctor_for_user(gateway, token, user_id).await?;
    Ok(doctor.and_then(|d| d.hospital_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::database;

    #[tokio::test]
    async fn role_and_domain_lookups_follow_user_id() {
        let (gateway, _) = database::memory();
        let user = Uuid::new_v4();
        let hospital = Uuid::new_v4();
        gateway.seed("user_roles", vec![json!({ "user_id": user.to_string(), "role": "admin" })]);
        gateway.seed(
            "doctors",
            vec![json!({
                "user_id": user.to_string(),
                "hospital_id": hospital.to_string(),
                "specialty": "Administration"
            })],
        );

        assert_eq!(role_for_user(&gateway, None, user).await.unwrap(), Some(Role::Admin));
        assert_eq!(
            hospital_id_for_admin(&gateway, None, user).await.unwrap(),
            Some(hospital)
        );
        assert!(patient_for_user(&gateway, None, user).await.unwrap().is_none());
        assert!(profile_for_user(&gateway, None, Uuid::new_v4()).await.unwrap().is_none());
    }
}
