//! Hospital billing: invoices for completed appointments.
//!
//! An invoice is a list of charges and a total equal to their sum. It starts
//! as a draft and is moved to sent and paid by explicit status updates; no
//! payment is processed.

use adapters::{DataGateway, Direction, Embed, Filter, Query};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::database::models::{Appointment, AppointmentStatus, Charge, Invoice, InvoiceStatus};
use crate::database::queries::{fetch_all, fetch_optional, profile_embed};
use crate::errors::{AppError, AppResult};

fn patient_name() -> Embed {
    Embed::one("patients", "patient_id")
        .columns(&["id"])
        .embed(profile_embed(&["full_name"]))
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Billing {
    pub invoices: Vec<Invoice>,
    /// Appointments an invoice can be raised for.
    pub completed_appointments: Vec<Appointment>,
}

pub async fn load(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
) -> AppResult<Billing> {
    let hospital = hospital_id.to_string();
    let invoices = Query::table("invoices")
        .embed(patient_name())
        .embed(Embed::one("appointments", "appointment_id").columns(&["appointment_date"]))
        .eq("hospital_id", hospital.clone())
        .order("created_at", Direction::Descending);
    let completed = Query::table("appointments")
        .embed(patient_name())
        .eq("hospital_id", hospital)
        .eq("status", AppointmentStatus::Completed.as_str());
    let (invoices, completed) = tokio::join!(
        fetch_all(gateway, token, &invoices),
        fetch_all(gateway, token, &completed),
    );
    Ok(Billing {
        invoices: invoices?,
        completed_appointments: completed?,
    })
}

pub fn invoice_total(charges: &[Charge]) -> f64 {
    charges.iter().map(|c| c.amount).sum()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub appointment_id: Uuid,
    pub charges: Vec<Charge>,
}

/// Drops untouched charge rows and rejects negative amounts.
fn clean_charges(charges: &[Charge]) -> AppResult<Vec<Charge>> {
    let mut cleaned = Vec::with_capacity(charges.len());
    for charge in charges {
        let description = charge.description.trim();
        if description.is_empty() && charge.amount == 0.0 {
            continue;
        }
        if !charge.amount.is_finite() || charge.amount < 0.0 {
            return Err(AppError::Validation(
                "Charge amounts must be zero or more".to_string(),
            ));
        }
        cleaned.push(Charge {
            description: description.to_string(),
            amount: charge.amount,
        });
    }
    Ok(cleaned)
}

pub async fn create_invoice(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    invoice: &NewInvoice,
) -> AppResult<()> {
    let charges = clean_charges(&invoice.charges)?;
    let query = Query::table("appointments")
        .eq("id", invoice.appointment_id.to_string())
        .eq("hospital_id", hospital_id.to_string());
    let appointment: Appointment = fetch_optional(gateway, token, query)
        .await?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;
    let row = json!({
        "appointment_id": appointment.id.to_string(),
        "hospital_id": hospital_id.to_string(),
        "patient_id": appointment.patient_id.to_string(),
        "total": invoice_total(&charges),
        "charges": charges,
        "status": InvoiceStatus::Draft.as_str(),
    });
    gateway.insert(token, "invoices", vec![row]).await?;
    Ok(())
}

pub async fn set_status(
    gateway: &dyn DataGateway,
    token: Option<&str>,
    hospital_id: Uuid,
    invoice_id: Uuid,
    status: InvoiceStatus,
) -> AppResult<()> {
    let updated = gateway
        .update(
            token,
            "invoices",
            json!({ "status": status.as_str() }),
            &[
                Filter::eq("id", invoice_id.to_string()),
                Filter::eq("hospital_id", hospital_id.to_string()),
            ],
        )
        .await?;
    if updated.is_empty() {
        return Err(AppError::NotFound("Invoice not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;

    fn charge(description: &str, amount: f64) -> Charge {
        Charge {
            description: description.to_string(),
            amount,
        }
    }

    #[test]
    fn total_is_the_sum_of_charges() {
        assert_eq!(invoice_total(&[]), 0.0);
        assert_eq!(
            invoice_total(&[charge("Consultation", 50.0), charge("Lab work", 25.5)]),
            75.5
        );
    }

    #[test]
    fn blank_rows_are_dropped_and_negative_amounts_refused() {
        let cleaned = clean_charges(&[charge(" X-ray ", 40.0), charge("", 0.0)]).unwrap();
        assert_eq!(cleaned, vec![charge("X-ray", 40.0)]);
        assert!(clean_charges(&[charge("Refund", -5.0)]).is_err());
    }

    #[tokio::test]
    async fn invoices_are_created_as_drafts_and_reload_identically() {
        let (gateway, _) = database::memory();
        let hospital = Uuid::new_v4();
        let stored = gateway.seed(
            "appointments",
            vec![json!({
                "patient_id": Uuid::new_v4().to_string(),
                "doctor_id": Uuid::new_v4().to_string(),
                "hospital_id": hospital.to_string(),
                "appointment_date": "2026-10-17",
                "appointment_time": "14:00",
                "status": "completed"
            })],
        );
        let appointment_id: Uuid = stored[0]["id"].as_str().unwrap().parse().unwrap();

        let invoice = NewInvoice {
            appointment_id,
            charges: vec![charge("Consultation", 50.0), charge("Drugs", 12.25)],
        };
        create_invoice(&gateway, None, hospital, &invoice).await.unwrap();

        let first = load(&gateway, None, hospital).await.unwrap();
        let second = load(&gateway, None, hospital).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.invoices.len(), 1);
        assert_eq!(first.invoices[0].status, InvoiceStatus::Draft);
        assert_eq!(first.invoices[0].total, 62.25);
        assert_eq!(first.completed_appointments.len(), 1);

        let id = first.invoices[0].id;
        set_status(&gateway, None, hospital, id, InvoiceStatus::Paid).await.unwrap();
        let reloaded = load(&gateway, None, hospital).await.unwrap();
        assert_eq!(reloaded.invoices[0].status, InvoiceStatus::Paid);
        assert!(set_status(&gateway, None, Uuid::new_v4(), id, InvoiceStatus::Sent)
            .await
            .is_err());
    }
}
