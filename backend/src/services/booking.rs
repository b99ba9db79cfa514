//! Appointment booking for patients.
//!
//! Slots are a fixed list of half-hour starts; there is no availability
//! calculation. A booking is validated locally and stored as `pending` for
//! the hospital to approve.

use adapters::{DataGateway, Direction, Query};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{Appointment, AppointmentStatus, Doctor, Hospital, Patient};
use crate::database::queries::{decode, fetch_all, fetch_optional, profile_embed};
use crate::errors::{AppError, AppResult};

pub const TIME_SLOTS: [&str; 12] = [
    "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "14:00", "14:30", "15:00", "15:30",
    "16:00", "16:30",
];

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct BookingForm {
    pub hospitals: Vec<Hospital>,
    pub selected_hospital: Option<Uuid>,
    /// Doctors of the selected hospital; empty until one is chosen.
    pub doctors: Vec<Doctor>,
    pub time_slots: Vec<&'static str>,
}

pub async fn load_form(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Option<Uuid>,
) -> AppResult<BookingForm> {
    let hospitals = Query::table("hospitals").order("name", Direction::Ascending);
    let hospitals = fetch_all(gateway, token, &hospitals).await?;
    let doctors = match hospital_id {
        Some(id) => {
            let query = Query::table("doctors")
                .embed(profile_embed(&["full_name"]))
                .eq("hospital_id", id.to_string());
            fetch_all(gateway, token, &query).await?
        }
        None => Vec::new(),
    };
    Ok(BookingForm {
        hospitals,
        selected_hospital: hospital_id,
        doctors,
        time_slots: TIME_SLOTS.to_vec(),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub notes: Option<String>,
}

pub fn validate(request: &BookingRequest, today: NaiveDate) -> AppResult<()> {
    if !TIME_SLOTS.contains(&request.time.as_str()) {
        return Err(AppError::Validation(
            "Please choose one of the available time slots".to_string(),
        ));
    }
    if request.date < today {
        return Err(AppError::Validation(
            "Appointments cannot be booked in the past".to_string(),
        ));
    }
    Ok(())
}

pub async fn book(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    patient: &Patient,
    request: &BookingRequest,
    today: NaiveDate,
) -> AppResult<Appointment> {
    validate(request, today)?;
    let doctor = Query::table("doctors")
        .eq("id", request.doctor_id.to_string())
        .eq("hospital_id", request.hospital_id.to_string());
    if fetch_optional::<Doctor>(gateway, token, doctor).await?.is_none() {
        return Err(AppError::Validation(
            "The selected doctor does not work at this hospital".to_string(),
        ));
    }
    let notes = request
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let row = json!({
        "patient_id": patient.id.to_string(),
        "doctor_id": request.doctor_id.to_string(),
        "hospital_id": request.hospital_id.to_string(),
        "appointment_date": request.date.to_string(),
        "appointment_time": request.time,
        "status": AppointmentStatus::Pending.as_str(),
        "notes": notes,
    });
    let stored = gateway.insert(token, "appointments", vec![row]).await?;
    decode::<Appointment>(stored)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Booking was not stored".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::memory::MemoryGateway;

    use crate::database;

    fn request(date: NaiveDate, time: &str) -> BookingRequest {
        BookingRequest {
            hospital_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date,
            time: time.to_string(),
            notes: Some("  ".to_string()),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn only_listed_slots_on_or_after_today_are_accepted() {
        assert!(validate(&request(today(), "09:00"), today()).is_ok());
        assert!(validate(&request(today(), "12:00"), today()).is_err());
        assert!(validate(&request(today(), "9:00"), today()).is_err());
        let yesterday = today().pred_opt().unwrap();
        assert!(validate(&request(yesterday, "14:30"), today()).is_err());
    }

    /// A patient and a doctor working at a fresh hospital.
    fn seeded(gateway: &MemoryGateway) -> (Patient, Doctor) {
        let patient = gateway.seed("patients", vec![json!({ "user_id": Uuid::new_v4().to_string() })]);
        let doctor = gateway.seed(
            "doctors",
            vec![json!({
                "user_id": Uuid::new_v4().to_string(),
                "hospital_id": Uuid::new_v4().to_string(),
                "specialty": "General"
            })],
        );
        (
            serde_json::from_value(patient[0].clone()).unwrap(),
            serde_json::from_value(doctor[0].clone()).unwrap(),
        )
    }

    #[tokio::test]
    async fn booking_is_stored_as_pending() {
        let (gateway, _) = database::memory();
        let (patient, doctor) = seeded(&gateway);
        let request = BookingRequest {
            hospital_id: doctor.hospital_id.unwrap(),
            doctor_id: doctor.id,
            ..request(today(), "16:30")
        };
        let appointment = book(&gateway, None, &patient, &request, today()).await.unwrap();
        assert_eq!(appointment.status, AppointmentStatus::Pending);
        assert_eq!(appointment.patient_id, patient.id);
        assert_eq!(appointment.notes, None);
        assert_eq!(gateway.rows("appointments").len(), 1);
    }

    #[tokio::test]
    async fn a_doctor_from_another_hospital_cannot_be_booked() {
        let (gateway, _) = database::memory();
        let (patient, doctor) = seeded(&gateway);
        let request = BookingRequest {
            doctor_id: doctor.id,
            ..request(today(), "09:30")
        };
        let err = book(&gateway, None, &patient, &request, today()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(gateway.rows("appointments").is_empty());
    }
}
