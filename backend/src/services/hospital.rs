//! Hospital administration: appointments, doctor roster, join requests and
//! hospital settings.
//!
//! An admin reaches their hospital through their own `doctors` row. Doctors
//! join a hospital either directly at sign-up or by accepting a request the
//! admin sent; both paths end with `doctors.hospital_id` set.

use adapters::{AdapterError, DataGateway, Direction, Embed, Filter, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{
    Appointment, AppointmentStatus, Doctor, DoctorRequest, Hospital, RequestStatus,
};
use crate::database::queries::{decode, doctor_for_user, fetch_all, fetch_optional, profile_embed};
use crate::errors::{AppError, AppResult};

const APPOINTMENT_PAGE: usize = 50;
const ADMIN_SPECIALTY: &str = "Hospital Admin";

pub async fn appointments(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    status: Option<AppointmentStatus>,
) -> AppResult<Vec<Appointment>> {
    let mut query = Query::table("appointments")
        .embed(
            Embed::one("patients", "patient_id")
                .columns(&["id"])
                .embed(profile_embed(&["full_name"])),
        )
        .embed(
            Embed::one("doctors", "doctor_id")
                .columns(&["specialty"])
                .embed(profile_embed(&["full_name"])),
        )
        .eq("hospital_id", hospital_id.to_string())
        .order("appointment_date", Direction::Descending)
        .limit(APPOINTMENT_PAGE);
    if let Some(status) = status {
        query = query.eq("status", status.as_str());
    }
    fetch_all(gateway, token, &query).await
}

pub async fn set_appointment_status(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    appointment_id: Uuid,
    status: AppointmentStatus,
) -> AppResult<()> {
    let updated = gateway
        .update(
            token,
            "appointments",
            json!({ "status": status.as_str() }),
            &[
                Filter::eq("id", appointment_id.to_string()),
                Filter::eq("hospital_id", hospital_id.to_string()),
            ],
        )
        .await?;
    if updated.is_empty() {
        return Err(AppError::NotFound("Appointment not found".to_string()));
    }
    tracing::info!("appointment {} set to {}", appointment_id, status.as_str());
    Ok(())
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct DoctorManagement {
    pub doctors: Vec<Doctor>,
    /// Doctors outside this hospital, including unaffiliated ones.
    pub available: Vec<Doctor>,
    /// Requests this hospital sent that are still pending.
    pub requests: Vec<DoctorRequest>,
}

pub async fn doctor_management(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
) -> AppResult<DoctorManagement> {
    let hospital = hospital_id.to_string();
    let doctors = Query::table("doctors")
        .embed(profile_embed(&["full_name", "phone"]))
        .eq("hospital_id", hospital.clone());
    let available = Query::table("doctors")
        .embed(profile_embed(&["full_name", "phone"]))
        .filter(Filter::Or(vec![
            Filter::neq("hospital_id", hospital.clone()),
            Filter::is_null("hospital_id"),
        ]));
    let requests = Query::table("doctor_requests")
        .embed(Embed::one("doctors", "doctor_id").embed(profile_embed(&["full_name"])))
        .eq("hospital_id", hospital)
        .eq("status", RequestStatus::Pending.as_str());
    let (doctors, available, requests) = tokio::join!(
        fetch_all(gateway, token, &doctors),
        fetch_all(gateway, token, &available),
        fetch_all(gateway, token, &requests),
    );
    Ok(DoctorManagement {
        doctors: doctors?,
        available: available?,
        requests: requests?,
    })
}

fn in_hospital(doctor_id: Uuid, hospital_id: Uuid) -> [Filter; 2] {
    [
        Filter::eq("id", doctor_id.to_string()),
        Filter::eq("hospital_id", hospital_id.to_string()),
    ]
}

pub async fn update_specialty(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    doctor_id: Uuid,
    specialty: &str,
) -> AppResult<()> {
    let specialty = specialty.trim();
    if specialty.is_empty() {
        return Err(AppError::Validation("Specialty is required".to_string()));
    }
    let updated = gateway
        .update(
            token,
            "doctors",
            json!({ "specialty": specialty }),
            &in_hospital(doctor_id, hospital_id),
        )
        .await?;
    if updated.is_empty() {
        return Err(AppError::NotFound("Doctor not found".to_string()));
    }
    Ok(())
}

/// Detaches a doctor from the hospital; the doctor account stays.
pub async fn unlink_doctor(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    doctor_id: Uuid,
) -> AppResult<()> {
    let updated = gateway
        .update(
            token,
            "doctors",
            json!({ "hospital_id": null }),
            &in_hospital(doctor_id, hospital_id),
        )
        .await?;
    if updated.is_empty() {
        return Err(AppError::NotFound("Doctor not found".to_string()));
    }
    tracing::info!("doctor {} removed from hospital {}", doctor_id, hospital_id);
    Ok(())
}

pub async fn send_request(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    doctor_id: Uuid,
) -> AppResult<()> {
    let row = json!({
        "hospital_id": hospital_id.to_string(),
        "doctor_id": doctor_id.to_string(),
        "status": RequestStatus::Pending.as_str(),
    });
    match gateway.insert(token, "doctor_requests", vec![row]).await {
        Ok(_) => Ok(()),
        Err(err) if err.is_conflict() => Err(AppError::Gateway(AdapterError::Conflict {
            message: "Request already sent to this doctor".to_string(),
        })),
        Err(err) => Err(err.into()),
    }
}

pub async fn cancel_request(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    request_id: Uuid,
) -> AppResult<()> {
    gateway
        .delete(
            token,
            "doctor_requests",
            &[
                Filter::eq("id", request_id.to_string()),
                Filter::eq("hospital_id", hospital_id.to_string()),
            ],
        )
        .await?;
    Ok(())
}

/// Pending requests addressed to a doctor, with the inviting hospital.
pub async fn pending_requests(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    doctor_id: Uuid,
) -> AppResult<Vec<DoctorRequest>> {
    let query = Query::table("doctor_requests")
        .embed(Embed::one("hospitals", "hospital_id").columns(&["name", "city", "address"]))
        .eq("doctor_id", doctor_id.to_string())
        .eq("status", RequestStatus::Pending.as_str());
    fetch_all(gateway, token, &query).await
}

/// Accepting marks the request and moves the doctor to its hospital;
/// declining only marks the request.
pub async fn respond(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    doctor: &Doctor,
    request_id: Uuid,
    accept: bool,
) -> AppResult<()> {
    let status = if accept {
        RequestStatus::Accepted
    } else {
        RequestStatus::Declined
    };
    let updated = gateway
        .update(
            token,
            "doctor_requests",
            json!({ "status": status.as_str() }),
            &[
                Filter::eq("id", request_id.to_string()),
                Filter::eq("doctor_id", doctor.id.to_string()),
                Filter::eq("status", RequestStatus::Pending.as_str()),
            ],
        )
        .await?;
    let request: DoctorRequest = decode(updated)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Request not found".to_string()))?;
    if accept {
        gateway
            .update(
                token,
                "doctors",
                json!({ "hospital_id": request.hospital_id.to_string() }),
                &[Filter::eq("id", doctor.id.to_string())],
            )
            .await?;
        tracing::info!("doctor {} joined hospital {}", doctor.id, request.hospital_id);
    }
    Ok(())
}

pub async fn load_settings(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Option<Uuid>,
) -> AppResult<Option<Hospital>> {
    match hospital_id {
        Some(id) => {
            let query = Query::table("hospitals").eq("id", id.to_string());
            fetch_optional(gateway, token, query).await
        }
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HospitalForm {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Updates the admin's hospital, or creates one and links the admin to it.
/// Returns the stored hospital and whether it was created.
pub async fn save_settings(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    user_id: Uuid,
    form: &HospitalForm,
) -> AppResult<(Hospital, bool)> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Hospital name is required".to_string()));
    }
    let optional = |v: &Option<String>| {
        v.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let row = json!({
        "name": name,
        "address": form.address.trim(),
        "city": form.city.trim(),
        "phone": optional(&form.phone),
        "email": optional(&form.email),
    });

    let admin = doctor_for_user(gateway, token, user_id).await?;
    if let Some(hospital_id) = admin.as_ref().and_then(|d| d.hospital_id) {
        let updated = gateway
            .update(token, "hospitals", row, &[Filter::eq("id", hospital_id.to_string())])
            .await?;
        let hospital = decode::<Hospital>(updated)?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Hospital not found".to_string()))?;
        return Ok((hospital, false));
    }

    let stored = gateway.insert(token, "hospitals", vec![row]).await?;
    let hospital = decode::<Hospital>(stored)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Hospital was not stored".to_string()))?;
    let link = json!({ "hospital_id": hospital.id.to_string() });
    match admin {
        Some(_) => {
            gateway
                .update(token, "doctors", link, &[Filter::eq("user_id", user_id.to_string())])
                .await?;
        }
        None => {
            let row = json!({
                "user_id": user_id.to_string(),
                "hospital_id": hospital.id.to_string(),
                "specialty": ADMIN_SPECIALTY,
            });
            gateway.insert(token, "doctors", vec![row]).await?;
        }
    }
    tracing::info!("hospital {} created by {}", hospital.id, user_id);
    Ok((hospital, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    use crate::database;
    use crate::database::queries::hospital_id_for_admin;

    fn first<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> T {
        serde_json::from_value(rows[0].clone()).unwrap()
    }

    fn doctor(gateway: &adapters::memory::MemoryGateway, hospital: Option<Uuid>) -> Doctor {
        first(gateway.seed(
            "doctors",
            vec![json!({
                "user_id": Uuid::new_v4().to_string(),
                "hospital_id": hospital.map(|h| h.to_string()),
                "specialty": "General"
            })],
        ))
    }

    #[tokio::test]
    async fn available_doctors_are_outside_the_hospital() {
        let (gateway, _) = database::memory();
        let (mine, other) = (Uuid::new_v4(), Uuid::new_v4());
        let member = doctor(&gateway, Some(mine));
        let elsewhere = doctor(&gateway, Some(other));
        let free = doctor(&gateway, None);

        let view = doctor_management(&gateway, None, mine).await.unwrap();
        assert_eq!(view.doctors.iter().map(|d| d.id).collect::<Vec<_>>(), [member.id]);
        let mut available: Vec<Uuid> = view.available.iter().map(|d| d.id).collect();
        available.sort();
        let mut expected = vec![elsewhere.id, free.id];
        expected.sort();
        assert_eq!(available, expected);
    }

    #[tokio::test]
    async fn a_second_request_to_the_same_doctor_conflicts() {
        let (gateway, _) = database::memory();
        let hospital = Uuid::new_v4();
        let free = doctor(&gateway, None);
        send_request(&gateway, None, hospital, free.id).await.unwrap();

        let err = send_request(&gateway, None, hospital, free.id).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Request already sent to this doctor");

        let view = doctor_management(&gateway, None, hospital).await.unwrap();
        assert_eq!(view.requests.len(), 1);
        cancel_request(&gateway, None, hospital, view.requests[0].id).await.unwrap();
        assert!(gateway.rows("doctor_requests").is_empty());
    }

    #[tokio::test]
    async fn accepting_a_request_links_the_doctor() {
        let (gateway, _) = database::memory();
        let hospital: Hospital = first(gateway.seed(
            "hospitals",
            vec![json!({ "name": "St. Mary", "address": "1 Main St", "city": "Lagos" })],
        ));
        let free = doctor(&gateway, None);
        send_request(&gateway, None, hospital.id, free.id).await.unwrap();

        let pending = pending_requests(&gateway, None, free.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].hospitals.as_ref().unwrap().name, "St. Mary");

        respond(&gateway, None, &free, pending[0].id, true).await.unwrap();
        assert_eq!(gateway.rows("doctors")[0]["hospital_id"], hospital.id.to_string());
        assert!(pending_requests(&gateway, None, free.id).await.unwrap().is_empty());
        assert!(respond(&gateway, None, &free, pending[0].id, false).await.is_err());
    }

    #[tokio::test]
    async fn saving_settings_creates_then_updates_the_hospital() {
        let (gateway, _) = database::memory();
        let admin = Uuid::new_v4();
        let form = HospitalForm {
            name: "City Clinic".into(),
            address: "2 Broad St".into(),
            city: "Abuja".into(),
            phone: Some(" ".into()),
            email: None,
        };
        let (created, is_new) = save_settings(&gateway, None, admin, &form).await.unwrap();
        assert!(is_new);
        assert_eq!(created.phone, None);
        assert_eq!(
            hospital_id_for_admin(&gateway, None, admin).await.unwrap(),
            Some(created.id)
        );
        assert_eq!(gateway.rows("doctors")[0]["specialty"], ADMIN_SPECIALTY);

        let renamed = HospitalForm {
            name: "City Clinic North".into(),
            ..form
        };
        let (updated, is_new) = save_settings(&gateway, None, admin, &renamed).await.unwrap();
        assert!(!is_new);
        assert_eq!(updated.id, created.id);
        assert_eq!(gateway.rows("hospitals").len(), 1);
        let loaded = load_settings(&gateway, None, Some(created.id)).await.unwrap().unwrap();
        assert_eq!(loaded.name, "City Clinic North");
    }
}
