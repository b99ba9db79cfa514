//! Handler functions for the doctor screens.
//!
//! The caller's `doctors` row is looked up per request. Without one every
//! screen is empty with guidance; without a hospital only the invitations
//! screen is useful, and the dashboard says so.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::Screen;
use crate::auth::middleware::Principal;
use crate::database::models::{Appointment, Doctor, DoctorRequest, Patient};
use crate::database::queries::doctor_for_user;
use crate::errors::{AppError, AppResult};
use crate::services::consultation::{self, ConsultationForm, PatientRecord};
use crate::services::data_aggregator::{self, DoctorDashboard};
use crate::services::hospital;
use crate::AppState;

const NO_DOCTOR_RECORD: &str = "Your doctor profile is not set up yet. Contact your hospital administrator.";
const NO_HOSPITAL: &str =
    "You are not linked to a hospital yet. Accept a hospital request to start receiving appointments.";
const PICK_APPOINTMENT: &str = "Select an appointment from your dashboard to start a consultation.";

async fn linked_doctor(state: &AppState, principal: &Principal) -> AppResult<Option<Doctor>> {
    doctor_for_user(state.gateway.as_ref(), principal.token(), principal.user_id()).await
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<DoctorDashboard>>> {
    let Some(doctor) = linked_doctor(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_DOCTOR_RECORD)));
    };
    let today = Utc::now().date_naive();
    let view =
        data_aggregator::doctor_dashboard(state.gateway.as_ref(), principal.token(), &doctor, today)
            .await?;
    let screen = Screen::new(view);
    if doctor.hospital_id.is_none() {
        return Ok(Json(screen.with_guidance(NO_HOSPITAL)));
    }
    Ok(Json(screen))
}

#[derive(Debug, Deserialize)]
pub struct ConsultParams {
    pub appointment: Option<Uuid>,
}

pub async fn consultation(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ConsultParams>,
) -> AppResult<Json<Screen<Option<Appointment>>>> {
    let Some(doctor) = linked_doctor(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_DOCTOR_RECORD)));
    };
    let Some(appointment_id) = params.appointment else {
        return Ok(Json(Screen::unlinked(PICK_APPOINTMENT)));
    };
    let appointment =
        consultation::load_appointment(state.gateway.as_ref(), principal.token(), &doctor, appointment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;
    Ok(Json(Screen::new(Some(appointment))))
}

pub async fn record(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(form): Json<ConsultationForm>,
) -> AppResult<Json<Screen<Option<Appointment>>>> {
    let Some(doctor) = linked_doctor(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_DOCTOR_RECORD)));
    };
    let gateway = state.gateway.as_ref();
    consultation::record(gateway, principal.token(), &doctor, &form).await?;
    let appointment =
        consultation::load_appointment(gateway, principal.token(), &doctor, form.appointment_id).await?;
    Ok(Json(Screen::saved(appointment, "Consultation saved!")))
}

#[derive(Debug, Deserialize)]
pub struct RecordsParams {
    pub search: Option<String>,
}

pub async fn patients(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<RecordsParams>,
) -> AppResult<Json<Screen<Vec<Patient>>>> {
    let Some(doctor) = linked_doctor(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_DOCTOR_RECORD)));
    };
    let patients = consultation::patients(
        state.gateway.as_ref(),
        principal.token(),
        &doctor,
        params.search.as_deref(),
    )
    .await?;
    Ok(Json(Screen::new(patients)))
}

pub async fn patient_record(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(patient_id): Path<Uuid>,
) -> AppResult<Json<Screen<PatientRecord>>> {
    let doctor = linked_doctor(&state, &principal)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;
    let record =
        consultation::patient_record(state.gateway.as_ref(), principal.token(), &doctor, patient_id)
            .await?;
    Ok(Json(Screen::new(record)))
}

pub async fn requests(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<Vec<DoctorRequest>>>> {
    let Some(doctor) = linked_doctor(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_DOCTOR_RECORD)));
    };
    let requests = hospital::pending_requests(state.gateway.as_ref(), principal.token(), doctor.id).await?;
    Ok(Json(Screen::new(requests)))
}

async fn respond(
    state: &AppState,
    principal: &Principal,
    request_id: Uuid,
    accept: bool,
) -> AppResult<Screen<Vec<DoctorRequest>>> {
    let Some(doctor) = linked_doctor(state, principal).await? else {
        return Ok(Screen::unlinked(NO_DOCTOR_RECORD));
    };
    let gateway = state.gateway.as_ref();
    hospital::respond(gateway, principal.token(), &doctor, request_id, accept).await?;
    let requests = hospital::pending_requests(gateway, principal.token(), doctor.id).await?;
    let message = if accept {
        "Request accepted! You are now part of the hospital."
    } else {
        "Request declined"
    };
    Ok(Screen::saved(requests, message))
}

pub async fn accept_request(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Screen<Vec<DoctorRequest>>>> {
    respond(&state, &principal, id, true).await.map(Json)
}

pub async fn decline_request(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Screen<Vec<DoctorRequest>>>> {
    respond(&state, &principal, id, false).await.map(Json)
}
