//! Consultation entry and patient records for doctors.
//!
//! Saving a consultation writes the consultation row, then every prescription
//! with a medicine name, then completes the appointment. Each write is issued
//! once; a failure part-way is reported and not rolled back.

use std::collections::HashSet;

use adapters::{DataGateway, Direction, Embed, Filter, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{Appointment, AppointmentStatus, Consultation, Doctor, Patient};
use crate::database::queries::{decode, fetch_all, fetch_optional, profile_embed};
use crate::errors::{AppError, AppResult};

fn appointment_for_consult(appointment_id: Uuid) -> Query {
    Query::table("appointments")
        .embed(
            Embed::one("patients", "patient_id").embed(profile_embed(&["full_name", "phone"])),
        )
        .embed(Embed::one("hospitals", "hospital_id").columns(&["name"]))
        .eq("id", appointment_id.to_string())
}

/// The appointment with patient details, if it belongs to `doctor`.
pub async fn load_appointment(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    doctor: &Doctor,
    appointment_id: Uuid,
) -> AppResult<Option<Appointment>> {
    let appointment: Option<Appointment> =
        fetch_optional(gateway, token, appointment_for_consult(appointment_id)).await?;
    Ok(appointment.filter(|a| a.doctor_id == doctor.id))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionInput {
    #[serde(default)]
    pub medicine_name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub duration: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsultationForm {
    pub appointment_id: Uuid,
    #[serde(default)]
    pub observations: String,
    #[serde(default)]
    pub prescriptions: Vec<PrescriptionInput>,
}

pub async fn record(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    doctor: &Doctor,
    form: &ConsultationForm,
) -> AppResult<Consultation> {
    let appointment = load_appointment(gateway, token, doctor, form.appointment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    let row = json!({
        "appointment_id": appointment.id.to_string(),
        "doctor_id": doctor.id.to_string(),
        "patient_id": appointment.patient_id.to_string(),
        "observations": form.observations.trim(),
    });
    let stored = gateway.insert(token, "consultations", vec![row]).await?;
    let consultation: Consultation = decode(stored)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Consultation was not stored".to_string()))?;

    let prescriptions: Vec<_> = form
        .prescriptions
        .iter()
        .filter(|p| !p.medicine_name.trim().is_empty())
        .map(|p| {
            json!({
                "consultation_id": consultation.id.to_string(),
                "medicine_name": p.medicine_name.trim(),
                "dosage": p.dosage.trim(),
                "duration": p.duration.trim(),
            })
        })
        .collect();
    if !prescriptions.is_empty() {
        gateway.insert(token, "prescriptions", prescriptions).await?;
    }

    gateway
        .update(
            token,
            "appointments",
            json!({ "status": AppointmentStatus::Completed.as_str() }),
            &[Filter::eq("id", appointment.id.to_string())],
        )
        .await?;
    tracing::info!(
        "consultation {} recorded for appointment {}",
        consultation.id,
        appointment.id
    );
    Ok(consultation)
}

/// Patients this doctor has consulted, optionally filtered by a
/// case-insensitive name fragment.
pub async fn patients(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    doctor: &Doctor,
    search: Option<&str>,
) -> AppResult<Vec<Patient>> {
    #[derive(Deserialize)]
    struct PatientId {
        patient_id: Uuid,
    }

    let query = Query::table("consultations")
        .select(&["patient_id"])
        .eq("doctor_id", doctor.id.to_string());
    let ids: Vec<PatientId> = fetch_all(gateway, token, &query).await?;
    let mut seen = HashSet::new();
    let ids: Vec<String> = ids
        .into_iter()
        .filter(|row| seen.insert(row.patient_id))
        .map(|row| row.patient_id.to_string())
        .collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let query = Query::table("patients")
        .embed(profile_embed(&["full_name", "phone"]))
        .is_in("id", ids);
    let patients: Vec<Patient> = fetch_all(gateway, token, &query).await?;
    let needle = search.map(str::trim).unwrap_or_default().to_lowercase();
    Ok(patients
        .into_iter()
        .filter(|p| {
            needle.is_empty()
                || p.profiles
                    .as_ref()
                    .is_some_and(|profile| profile.full_name.to_lowercase().contains(&needle))
        })
        .collect())
}

#[derive(Debug, Serialize)]
pub struct PatientRecord {
    pub patient: Patient,
    pub consultations: Vec<Consultation>,
}

/// Consultation history of one patient, newest first. Only patients the
/// doctor has consulted are visible; anyone else is reported as not found.
pub async fn patient_record(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    doctor: &Doctor,
    patient_id: Uuid,
) -> AppResult<PatientRecord> {
    let treated = Query::table("consultations")
        .eq("doctor_id", doctor.id.to_string())
        .eq("patient_id", patient_id.to_string());
    if gateway.count(token, &treated).await? == 0 {
        return Err(AppError::NotFound("Patient not found".to_string()));
    }
    let query = Query::table("patients")
        .embed(profile_embed(&["full_name", "phone"]))
        .eq("id", patient_id.to_string());
    let patient: Patient = fetch_optional(gateway, token, query)
        .await?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;
    let query = Query::table("consultations")
        .embed(Embed::one("appointments", "appointment_id").columns(&["appointment_date"]))
        .embed(Embed::many("prescriptions", "consultation_id"))
        .eq("patient_id", patient_id.to_string())
        .order("created_at", Direction::Descending);
    let consultations = fetch_all(gateway, token, &query).await?;
    Ok(PatientRecord {
        patient,
        consultations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    use crate::database;

    fn first<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> T {
        serde_json::from_value(rows[0].clone()).unwrap()
    }

    #[tokio::test]
    async fn recording_saves_prescriptions_and_completes_the_appointment() {
        let (gateway, _) = database::memory();
        let hospital = Uuid::new_v4().to_string();
        let doctor: Doctor = first(gateway.seed(
            "doctors",
            vec![json!({ "user_id": Uuid::new_v4().to_string(), "hospital_id": hospital, "specialty": "General" })],
        ));
        let patient: Patient = first(gateway.seed(
            "patients",
            vec![json!({ "user_id": Uuid::new_v4().to_string() })],
        ));
        gateway.seed(
            "profiles",
            vec![json!({ "user_id": patient.user_id.to_string(), "full_name": "Grace Hopper" })],
        );
        let appointment: Appointment = first(gateway.seed(
            "appointments",
            vec![json!({
                "patient_id": patient.id.to_string(),
                "doctor_id": doctor.id.to_string(),
                "hospital_id": hospital,
                "appointment_date": "2026-10-18",
                "appointment_time": "09:00",
                "status": "in_progress"
            })],
        ));

        let form = ConsultationForm {
            appointment_id: appointment.id,
            observations: "Mild fever".into(),
            prescriptions: vec![
                PrescriptionInput {
                    medicine_name: "Paracetamol".into(),
                    dosage: "500mg".into(),
                    duration: "3 days".into(),
                },
                PrescriptionInput::default(),
            ],
        };
        record(&gateway, None, &doctor, &form).await.unwrap();

        assert_eq!(gateway.rows("prescriptions").len(), 1);
        assert_eq!(gateway.rows("appointments")[0]["status"], "completed");

        let found = patients(&gateway, None, &doctor, Some("grace")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(patients(&gateway, None, &doctor, Some("turing")).await.unwrap().is_empty());

        let history = patient_record(&gateway, None, &doctor, patient.id).await.unwrap();
        assert_eq!(history.consultations.len(), 1);
        assert_eq!(history.consultations[0].prescriptions[0].medicine_name, "Paracetamol");
    }

    #[tokio::test]
    async fn another_doctors_appointment_is_not_found() {
        let (gateway, _) = database::memory();
        let doctor: Doctor = first(gateway.seed(
            "doctors",
            vec![json!({ "user_id": Uuid::new_v4().to_string(), "specialty": "General" })],
        ));
        let appointment: Appointment = first(gateway.seed(
            "appointments",
            vec![json!({
                "patient_id": Uuid::new_v4().to_string(),
                "doctor_id": Uuid::new_v4().to_string(),
                "hospital_id": Uuid::new_v4().to_string(),
                "appointment_date": "2026-10-18",
                "appointment_time": "10:00",
                "status": "approved"
            })],
        ));
        let form = ConsultationForm {
            appointment_id: appointment.id,
            observations: String::new(),
            prescriptions: Vec::new(),
        };
        let err = record(&gateway, None, &doctor, &form).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(gateway.rows("consultations").is_empty());
    }

    #[tokio::test]
    async fn records_of_another_doctors_patient_are_not_found() {
        let (gateway, _) = database::memory();
        let doctors: Vec<Doctor> = gateway
            .seed(
                "doctors",
                vec![
                    json!({ "user_id": Uuid::new_v4().to_string(), "specialty": "General" }),
                    json!({ "user_id": Uuid::new_v4().to_string(), "specialty": "Cardiology" }),
                ],
            )
            .into_iter()
            .map(|row| serde_json::from_value(row).unwrap())
            .collect();
        let (treating, other) = (&doctors[0], &doctors[1]);
        let patient: Patient = first(gateway.seed(
            "patients",
            vec![json!({ "user_id": Uuid::new_v4().to_string() })],
        ));
        gateway.seed(
            "consultations",
            vec![json!({
                "appointment_id": Uuid::new_v4().to_string(),
                "doctor_id": treating.id.to_string(),
                "patient_id": patient.id.to_string(),
                "observations": "Routine check"
            })],
        );

        let history = patient_record(&gateway, None, treating, patient.id).await.unwrap();
        assert_eq!(history.consultations.len(), 1);

        let err = patient_record(&gateway, None, other, patient.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
