//! Rust structs that represent table rows.
//!
//! These are projections of rows owned by the gateway, deserialized from the
//! JSON it returns. Embedded relations (`doctors`, `hospitals`, `profiles`,
//! ...) are optional because each screen asks for a different shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    InProgress,
    Completed,
    Cancelled,
    Rescheduled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Rescheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }

    /// Still ahead of the patient: neither finished nor called off.
    pub fn is_open(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }
}

/// `profiles` embedded by `user_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRef {
    #[serde(default)]
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HospitalRef {
    #[serde(default)]
    pub name: String,
    pub city: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoctorRef {
    pub id: Option<Uuid>,
    pub specialty: Option<String>,
    pub profiles: Option<ProfileRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: Option<Uuid>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub profiles: Option<ProfileRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRef {
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub hospitals: Option<HospitalRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub hospital_id: Option<Uuid>,
    #[serde(default)]
    pub specialty: String,
    pub availability_slots: Option<Value>,
    pub profiles: Option<ProfileRef>,
    pub hospitals: Option<HospitalRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    #[serde(default)]
    pub consent_given: bool,
    pub profiles: Option<ProfileRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub hospital_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub doctors: Option<DoctorRef>,
    pub hospitals: Option<HospitalRef>,
    pub patients: Option<PatientRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub medicine_name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub duration: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub observations: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub appointments: Option<AppointmentRef>,
    pub doctors: Option<DoctorRef>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub hospital_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub charges: Vec<Charge>,
    #[serde(default)]
    pub total: f64,
    pub status: InvoiceStatus,
    pub pdf_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub patients: Option<PatientRef>,
    pub appointments: Option<AppointmentRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorRequest {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub status: RequestStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub hospitals: Option<HospitalRef>,
    pub doctors: Option<DoctorRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_enums_keep_their_wire_names() {
        for status in AppointmentStatus::ALL {
            let wire = serde_json::to_value(status).unwrap();
            assert_eq!(wire, json!(status.as_str()));
        }
        assert_eq!(serde_json::to_value(InvoiceStatus::Overdue).unwrap(), json!("overdue"));
        assert_eq!(
            serde_json::from_value::<RequestStatus>(json!("declined")).unwrap(),
            RequestStatus::Declined
        );
    }

    #[test]
    fn appointment_reads_postgrest_shape_with_embeds() {
        let row = json!({
            "id": "2b1f0a52-3d1c-4c8e-9d0e-5a3a0f5b9c11",
            "patient_id": "7f6c1f4e-9b6a-4b8e-8a43-2f0d6f1e2a10",
            "doctor_id": "0a8e7d56-1c2b-4f3a-9e8d-7c6b5a4f3e21",
            "hospital_id": "5c4b3a29-8f7e-4d6c-b5a4-3f2e1d0c9b32",
            "appointment_date": "2026-10-18",
            "appointment_time": "09:30",
            "status": "in_progress",
            "notes": null,
            "doctors": { "specialty": "Cardiology", "profiles": { "full_name": "Ada Obi" } },
            "hospitals": { "name": "St. Mary" }
        });
        let appointment: Appointment = serde_json::from_value(row).unwrap();
        assert_eq!(appointment.status, AppointmentStatus::InProgress);
        assert!(appointment.status.is_open());
        let doctor = appointment.doctors.unwrap();
        assert_eq!(doctor.profiles.unwrap().full_name, "Ada Obi");
        assert!(appointment.patients.is_none());
    }
}
