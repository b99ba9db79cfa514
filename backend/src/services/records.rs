//! Patient-facing records: medical history and the profile form.

use adapters::{DataGateway, Direction, Embed, Filter, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::models::Profile;
use crate::database::models::{Consultation, Patient};
use crate::database::queries::{fetch_all, profile_embed, profile_for_user};
use crate::errors::AppResult;

/// Consultations with appointment, hospital, doctor and prescriptions,
/// newest first.
pub async fn medical_history(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    patient: &Patient,
) -> AppResult<Vec<Consultation>> {
    let query = Query::table("consultations")
        .embed(
            Embed::one("appointments", "appointment_id")
                .columns(&["appointment_date", "appointment_time"])
                .embed(Embed::one("hospitals", "hospital_id").columns(&["name"])),
        )
        .embed(
            Embed::one("doctors", "doctor_id")
                .columns(&["specialty"])
                .embed(profile_embed(&["full_name"])),
        )
        .embed(Embed::many("prescriptions", "consultation_id"))
        .eq("patient_id", patient.id.to_string())
        .order("created_at", Direction::Descending);
    fetch_all(gateway, token, &query).await
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct ProfileView {
    pub profile: Profile,
    pub patient: Option<Patient>,
}

pub async fn load_profile(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    user_id: Uuid,
    patient: Option<Patient>,
) -> AppResult<ProfileView> {
    let profile = profile_for_user(gateway, token, user_id).await?;
    Ok(ProfileView {
        profile: profile.unwrap_or_default(),
        patient,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub age: Option<i32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub allergies: Option<String>,
    #[serde(default)]
    pub consent_given: bool,
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Updates the profile and patient rows together; both writes are issued
/// even if one of them fails.
pub async fn save_profile(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    user_id: Uuid,
    form: &ProfileForm,
) -> AppResult<()> {
    let owner = [Filter::eq("user_id", user_id.to_string())];
    let profile = json!({
        "full_name": form.full_name.trim(),
        "phone": blank_to_none(&form.phone),
    });
    let patient = json!({
        "age": form.age,
        "gender": blank_to_none(&form.gender),
        "blood_group": blank_to_none(&form.blood_group),
        "allergies": blank_to_none(&form.allergies),
        "consent_given": form.consent_given,
    });
    let (profile, patient) = tokio::join!(
        gateway.update(token, "profiles", profile, &owner),
        gateway.update(token, "patients", patient, &owner),
    );
    profile?;
    patient?;
    Ok(())
}
