//! Handler functions for the hospital admin screens.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::Screen;
use crate::auth::middleware::Principal;
use crate::database::models::{Appointment, AppointmentStatus, Hospital, InvoiceStatus};
use crate::database::queries::hospital_id_for_admin;
use crate::errors::{AppError, AppResult};
use crate::services::billing::{self, Billing, NewInvoice};
use crate::services::data_aggregator::{self, AdminDashboard};
use crate::services::hospital::{self as hospitals, DoctorManagement, HospitalForm};
use crate::AppState;

const NO_HOSPITAL: &str = "No hospital is linked to your account. Set one up under Hospital settings.";
const CREATE_HOSPITAL: &str = "Create your hospital to start managing doctors and appointments.";

async fn linked_hospital(state: &AppState, principal: &Principal) -> AppResult<Option<Uuid>> {
    hospital_id_for_admin(state.gateway.as_ref(), principal.token(), principal.user_id()).await
}

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<AdminDashboard>>> {
    let Some(hospital_id) = linked_hospital(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_HOSPITAL)));
    };
    let today = Utc::now().date_naive();
    let view =
        data_aggregator::admin_dashboard(state.gateway.as_ref(), principal.token(), hospital_id, today)
            .await?;
    Ok(Json(Screen::new(view)))
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentParams {
    pub status: Option<String>,
}

/// `all`, an empty value or no value means no filter.
fn status_filter(raw: Option<&str>) -> AppResult<Option<AppointmentStatus>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("Unknown appointment status: {}", value))),
    }
}

pub async fn appointments(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<AppointmentParams>,
) -> AppResult<Json<Screen<Vec<Appointment>>>> {
    let status = status_filter(params.status.as_deref())?;
    let Some(hospital_id) = linked_hospital(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_HOSPITAL)));
    };
    let view = hospitals::appointments(state.gateway.as_ref(), principal.token(), hospital_id, status).await?;
    Ok(Json(Screen::new(view)))
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: AppointmentStatus,
}

pub async fn set_appointment_status(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Query(params): Query<AppointmentParams>,
    Json(change): Json<StatusChange>,
) -> AppResult<Json<Screen<Vec<Appointment>>>> {
    let filter = status_filter(params.status.as_deref())?;
    let Some(hospital_id) = linked_hospital(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_HOSPITAL)));
    };
    let gateway = state.gateway.as_ref();
    hospitals::set_appointment_status(gateway, principal.token(), hospital_id, id, change.status).await?;
    let view = hospitals::appointments(gateway, principal.token(), hospital_id, filter).await?;
    Ok(Json(Screen::saved(
        view,
        format!("Appointment {}", change.status.as_str()),
    )))
}

pub async fn billing(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<Billing>>> {
    let Some(hospital_id) = linked_hospital(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_HOSPITAL)));
    };
    let view = billing::load(state.gateway.as_ref(), principal.token(), hospital_id).await?;
    Ok(Json(Screen::new(view)))
}

pub async fn create_invoice(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(invoice): Json<NewInvoice>,
) -> AppResult<Json<Screen<Billing>>> {
    let Some(hospital_id) = linked_hospital(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_HOSPITAL)));
    };
    let gateway = state.gateway.as_ref();
    billing::create_invoice(gateway, principal.token(), hospital_id, &invoice).await?;
    let view = billing::load(gateway, principal.token(), hospital_id).await?;
    Ok(Json(Screen::saved(view, "Invoice created!")))
}

async fn change_invoice(
    state: &AppState,
    principal: &Principal,
    invoice_id: Uuid,
    status: InvoiceStatus,
) -> AppResult<Screen<Billing>> {
    let Some(hospital_id) = linked_hospital(state, principal).await? else {
        return Ok(Screen::unlinked(NO_HOSPITAL));
    };
    let gateway = state.gateway.as_ref();
    billing::set_status(gateway, principal.token(), hospital_id, invoice_id, status).await?;
    let view = billing::load(gateway, principal.token(), hospital_id).await?;
    Ok(Screen::saved(view, format!("Invoice marked as {}", status.as_str())))
}

pub async fn send_invoice(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Screen<Billing>>> {
    change_invoice(&state, &principal, id, InvoiceStatus::Sent).await.map(Json)
}

pub async fn mark_invoice_paid(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Screen<Billing>>> {
    change_invoice(&state, &principal, id, InvoiceStatus::Paid).await.map(Json)
}

pub async fn doctors(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<DoctorManagement>>> {
    let Some(hospital_id) = linked_hospital(&state, &principal).await? else {
        return Ok(Json(Screen::unlinked(NO_HOSPITAL)));
    };
    let view = hospitals::doctor_management(state.gateway.as_ref(), principal.token(), hospital_id).await?;
    Ok(Json(Screen::new(view)))
}

/// A doctor-management write followed by a reload of the whole screen.
enum DoctorChange {
    Specialty(Uuid, String),
    Unlink(Uuid),
    Invite(Uuid),
    CancelInvite(Uuid),
}

impl DoctorChange {
    fn message(&self) -> &'static str {
        match self {
            DoctorChange::Specialty(..) => "Doctor updated!",
            DoctorChange::Unlink(_) => "Doctor removed from hospital.",
            DoctorChange::Invite(_) => "Request sent to doctor!",
            DoctorChange::CancelInvite(_) => "Request cancelled",
        }
    }
}

async fn change_doctors(
    state: &AppState,
    principal: &Principal,
    change: DoctorChange,
) -> AppResult<Json<Screen<DoctorManagement>>> {
    let Some(hospital_id) = linked_hospital(state, principal).await? else {
        return Ok(Json(Screen::unlinked(NO_HOSPITAL)));
    };
    let gateway = state.gateway.as_ref();
    let token = principal.token();
    match &change {
        DoctorChange::Specialty(id, specialty) => {
            hospitals::update_specialty(gateway, token, hospital_id, *id, specialty).await?
        }
        DoctorChange::Unlink(id) => hospitals::unlink_doctor(gateway, token, hospital_id, *id).await?,
        DoctorChange::Invite(id) => hospitals::send_request(gateway, token, hospital_id, *id).await?,
        DoctorChange::CancelInvite(id) => {
            hospitals::cancel_request(gateway, token, hospital_id, *id).await?
        }
    }
    let view = hospitals::doctor_management(gateway, token, hospital_id).await?;
    Ok(Json(Screen::saved(view, change.message())))
}

#[derive(Debug, Deserialize)]
pub struct SpecialtyChange {
    pub specialty: String,
}

pub async fn update_specialty(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(body): Json<SpecialtyChange>,
) -> AppResult<Json<Screen<DoctorManagement>>> {
    change_doctors(&state, &principal, DoctorChange::Specialty(id, body.specialty)).await
}

pub async fn unlink_doctor(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Screen<DoctorManagement>>> {
    change_doctors(&state, &principal, DoctorChange::Unlink(id)).await
}

#[derive(Debug, Deserialize)]
pub struct Invitation {
    pub doctor_id: Uuid,
}

pub async fn send_request(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<Invitation>,
) -> AppResult<Json<Screen<DoctorManagement>>> {
    change_doctors(&state, &principal, DoctorChange::Invite(body.doctor_id)).await
}

pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Screen<DoctorManagement>>> {
    change_doctors(&state, &principal, DoctorChange::CancelInvite(id)).await
}

pub async fn hospital(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<Screen<Option<Hospital>>>> {
    let hospital_id = linked_hospital(&state, &principal).await?;
    let view = hospitals::load_settings(state.gateway.as_ref(), principal.token(), hospital_id).await?;
    match view {
        Some(hospital) => Ok(Json(Screen::new(Some(hospital)))),
        None => Ok(Json(Screen::unlinked(CREATE_HOSPITAL))),
    }
}

pub async fn save_hospital(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(form): Json<HospitalForm>,
) -> AppResult<Json<Screen<Option<Hospital>>>> {
    let gateway = state.gateway.as_ref();
    let (saved, created) =
        hospitals::save_settings(gateway, principal.token(), principal.user_id(), &form).await?;
    let view = hospitals::load_settings(gateway, principal.token(), Some(saved.id)).await?;
    let message = if created {
        "Hospital created!"
    } else {
        "Hospital updated!"
    };
    Ok(Json(Screen::saved(view, message)))
}
