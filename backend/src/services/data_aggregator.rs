//! Dashboard aggregation for the three roles.
//!
//! Each dashboard issues its reads concurrently and derives counts from the
//! returned rows or from exact row counts, without caching anything between
//! requests.

use std::collections::HashSet;

use adapters::{DataGateway, Direction, Embed, Query};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{Appointment, AppointmentStatus, Doctor, Invoice, Patient, Prescription};
use crate::database::queries::{fetch_all, profile_embed};
use crate::errors::AppResult;

const RECENT_APPOINTMENTS: usize = 10;
const RECENT_INVOICES: usize = 5;
const RECENT_PRESCRIPTIONS: usize = 5;

fn doctor_embed() -> Embed {
    Embed::one("doctors", "doctor_id")
        .columns(&["specialty"])
        .embed(profile_embed(&["full_name"]))
}

fn patient_embed() -> Embed {
    Embed::one("patients", "patient_id")
        .columns(&["id"])
        .embed(profile_embed(&["full_name"]))
}

fn hospital_name() -> Embed {
    Embed::one("hospitals", "hospital_id").columns(&["name"])
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct PatientDashboard {
    pub appointments: Vec<Appointment>,
    pub invoices: Vec<Invoice>,
    pub prescriptions: Vec<Prescription>,
    pub upcoming: usize,
    pub completed: usize,
}

pub async fn patient_dashboard(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    patient: &Patient,
    today: NaiveDate,
) -> AppResult<PatientDashboard> {
    #[derive(Deserialize)]
    struct ConsultationId {
        id: Uuid,
    }

    let patient_id = patient.id.to_string();
    let appointments = Query::table("appointments")
        .embed(doctor_embed())
        .embed(hospital_name())
        .eq("patient_id", patient_id.clone())
        .order("appointment_date", Direction::Descending)
        .limit(RECENT_APPOINTMENTS);
    let invoices = Query::table("invoices")
        .eq("patient_id", patient_id.clone())
        .order("created_at", Direction::Descending)
        .limit(RECENT_INVOICES);
    let consultations = Query::table("consultations")
        .select(&["id"])
        .eq("patient_id", patient_id);
    let (appointments, invoices, consultations) = tokio::join!(
        fetch_all::<Appointment>(gateway, token, &appointments),
        fetch_all::<Invoice>(gateway, token, &invoices),
        fetch_all::<ConsultationId>(gateway, token, &consultations),
    );
    let (appointments, invoices, consultations) = (appointments?, invoices?, consultations?);

    let prescriptions = if consultations.is_empty() {
        Vec::new()
    } else {
        let ids: Vec<String> = consultations.iter().map(|c| c.id.to_string()).collect();
        let query = Query::table("prescriptions")
            .is_in("consultation_id", ids)
            .order("created_at", Direction::Descending)
            .limit(RECENT_PRESCRIPTIONS);
        fetch_all(gateway, token, &query).await?
    };

    let upcoming = appointments
        .iter()
        .filter(|a| a.appointment_date >= today && a.status.is_open())
        .count();
    let completed = appointments
        .iter()
        .filter(|a| a.status == AppointmentStatus::Completed)
        .count();
    Ok(PatientDashboard {
        appointments,
        invoices,
        prescriptions,
        upcoming,
        completed,
    })
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ScheduledAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    /// Consultation page for appointments that are ready to be seen.
    pub consult_path: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct DoctorDashboard {
    pub appointments: Vec<ScheduledAppointment>,
    pub waiting: usize,
    pub in_progress: usize,
    pub completed: usize,
}

pub async fn doctor_dashboard(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    doctor: &Doctor,
    today: NaiveDate,
) -> AppResult<DoctorDashboard> {
    let query = Query::table("appointments")
        .embed(patient_embed())
        .embed(hospital_name())
        .eq("doctor_id", doctor.id.to_string())
        .eq("appointment_date", today.to_string())
        .order("appointment_time", Direction::Ascending);
    let appointments: Vec<Appointment> = fetch_all(gateway, token, &query).await?;
    let count = |status: AppointmentStatus| appointments.iter().filter(|a| a.status == status).count();
    let (waiting, in_progress, completed) = (
        count(AppointmentStatus::Approved),
        count(AppointmentStatus::InProgress),
        count(AppointmentStatus::Completed),
    );
    let appointments = appointments
        .into_iter()
        .map(|appointment| {
            let consult_path = matches!(
                appointment.status,
                AppointmentStatus::Approved | AppointmentStatus::InProgress
            )
            .then(|| format!("/doctor/consult?appointment={}", appointment.id));
            ScheduledAppointment {
                appointment,
                consult_path,
            }
        })
        .collect();
    Ok(DoctorDashboard {
        appointments,
        waiting,
        in_progress,
        completed,
    })
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct AdminDashboard {
    pub total_appointments: u64,
    pub doctors: u64,
    /// Distinct patients with at least one appointment at the hospital.
    pub patients: usize,
    /// Sum of paid invoice totals.
    pub revenue: f64,
    pub today: Vec<Appointment>,
}

pub async fn admin_dashboard(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    today: NaiveDate,
) -> AppResult<AdminDashboard> {
    #[derive(Deserialize)]
    struct PatientId {
        patient_id: Uuid,
    }
    #[derive(Deserialize)]
    struct Total {
        #[serde(default)]
        total: f64,
    }

    let hospital = hospital_id.to_string();
    let all_appointments = Query::table("appointments").eq("hospital_id", hospital.clone());
    let doctors = Query::table("doctors").eq("hospital_id", hospital.clone());
    let todays = Query::table("appointments")
        .embed(patient_embed())
        .embed(doctor_embed())
        .eq("hospital_id", hospital.clone())
        .eq("appointment_date", today.to_string())
        .order("appointment_time", Direction::Ascending);
    let paid = Query::table("invoices")
        .select(&["total"])
        .eq("hospital_id", hospital.clone())
        .eq("status", "paid");
    let patient_ids = Query::table("appointments")
        .select(&["patient_id"])
        .eq("hospital_id", hospital);

    let (total_appointments, doctors, today, paid, patient_ids) = tokio::join!(
        gateway.count(token, &all_appointments),
        gateway.count(token, &doctors),
        fetch_all::<Appointment>(gateway, token, &todays),
        fetch_all::<Total>(gateway, token, &paid),
        fetch_all::<PatientId>(gateway, token, &patient_ids),
    );
    let patients: HashSet<Uuid> = patient_ids?.into_iter().map(|p| p.patient_id).collect();
    Ok(AdminDashboard {
        total_appointments: total_appointments?,
        doctors: doctors?,
        patients: patients.len(),
        revenue: paid?.iter().map(|i| i.total).sum(),
        today: today?,
    })
}
