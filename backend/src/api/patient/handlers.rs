//! Handler functions for the patient screens.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::Screen;
use crate::auth::middleware::Principal;
use crate::database::models::{Appointment, Consultation};
use crate::database::queries::patient_for_user;
use crate::errors::{AppError, AppResult};
use crate::services::booking::{self, BookingForm, BookingRequest};
use crate::services::data_aggregator::{self, PatientDashboard};
use crate::services::records::{self, ProfileForm, ProfileView};
use crate::AppState;

const NO_PATIENT_RECORD: &str =
    "Your patient record is not set up yet. Complete your profile to get started.";

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<PatientDashboard>>> {
    let gateway = state.gateway.as_ref();
    let Some(patient) = patient_for_user(gateway, principal.token(), principal.user_id()).await?
    else {
        return Ok(Json(Screen::unlinked(NO_PATIENT_RECORD)));
    };
    let today = Utc::now().date_naive();
    let view = data_aggregator::patient_dashboard(gateway, principal.token(), &patient, today).await?;
    Ok(Json(Screen::new(view)))
}

#[derive(Debug, Deserialize)]
pub struct BookingParams {
    pub hospital_id: Option<Uuid>,
}

pub async fn booking_form(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<BookingParams>,
) -> AppResult<Json<Screen<BookingForm>>> {
    let view = booking::load_form(state.gateway.as_ref(), principal.token(), params.hospital_id).await?;
    Ok(Json(Screen::new(view)))
}

#[derive(Debug, Serialize)]
pub struct Booked {
    pub appointment: Appointment,
    pub form: BookingForm,
}

pub async fn book(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<BookingRequest>,
) -> AppResult<Json<Screen<Option<Booked>>>> {
    let gateway = state.gateway.as_ref();
    let Some(patient) = patient_for_user(gateway, principal.token(), principal.user_id()).await?
    else {
        return Ok(Json(Screen::unlinked(NO_PATIENT_RECORD)));
    };
    let today = Utc::now().date_naive();
    let appointment = booking::book(gateway, principal.token(), &patient, &request, today).await?;
    tracing::info!("patient {} booked appointment {}", patient.id, appointment.id);
    let form = booking::load_form(gateway, principal.token(), Some(request.hospital_id)).await?;
    Ok(Json(Screen::saved(
        Some(Booked { appointment, form }),
        "Appointment booked!",
    )))
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<Vec<Consultation>>>> {
    let gateway = state.gateway.as_ref();
    let Some(patient) = patient_for_user(gateway, principal.token(), principal.user_id()).await?
    else {
        return Ok(Json(Screen::unlinked(NO_PATIENT_RECORD)));
    };
    let consultations = records::medical_history(gateway, principal.token(), &patient).await?;
    Ok(Json(Screen::new(consultations)))
}

async fn load_profile(state: &AppState, principal: &Principal) -> AppResult<ProfileView> {
    let gateway = state.gateway.as_ref();
    let patient = patient_for_user(gateway, principal.token(), principal.user_id()).await?;
    records::load_profile(gateway, principal.token(), principal.user_id(), patient).await
}

pub async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<ProfileView>>> {
    let view = load_profile(&state, &principal).await?;
    if view.patient.is_none() {
        return Ok(Json(Screen::new(view).with_guidance(NO_PATIENT_RECORD)));
    }
    Ok(Json(Screen::new(view)))
}

pub async fn save_profile(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(form): Json<ProfileForm>,
) -> AppResult<Json<Screen<ProfileView>>> {
    if form.full_name.trim().is_empty() {
        return Err(AppError::Validation("Full name is required".to_string()));
    }
    records::save_profile(state.gateway.as_ref(), principal.token(), principal.user_id(), &form)
        .await?;
    principal.resolver.refresh().await;
    let view = load_profile(&state, &principal).await?;
    Ok(Json(Screen::saved(view, "Profile updated!")))
}
