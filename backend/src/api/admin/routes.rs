//! Defines the HTTP routes for the hospital admin screens.

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::handlers::{
    appointments, billing, cancel_request, create_invoice, dashboard, doctors, hospital,
    mark_invoice_paid, save_hospital, send_invoice, send_request, set_appointment_status,
    unlink_doctor, update_specialty,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin", get(dashboard))
        .route("/admin/appointments", get(appointments))
        .route("/admin/appointments/{id}/status", post(set_appointment_status))
        .route("/admin/billing", get(billing))
        .route("/admin/billing/invoices", post(create_invoice))
        .route("/admin/billing/invoices/{id}/send", post(send_invoice))
        .route("/admin/billing/invoices/{id}/paid", post(mark_invoice_paid))
        .route("/admin/doctors", get(doctors))
        .route("/admin/doctors/requests", post(send_request))
        .route("/admin/doctors/requests/{id}", delete(cancel_request))
        .route("/admin/doctors/{id}", delete(unlink_doctor))
        .route("/admin/doctors/{id}/specialty", put(update_specialty))
        .route("/admin/hospital", get(hospital).put(save_hospital))
}
