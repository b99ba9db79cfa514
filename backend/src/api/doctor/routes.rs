//! Defines the HTTP routes for the doctor screens.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    accept_request, consultation, dashboard, decline_request, patient_record, patients, record,
    requests,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/doctor", get(dashboard))
        .route("/doctor/consult", get(consultation).post(record))
        .route("/doctor/records", get(patients))
        .route("/doctor/records/{patient_id}", get(patient_record))
        .route("/doctor/requests", get(requests))
        .route("/doctor/requests/{id}/accept", post(accept_request))
        .route("/doctor/requests/{id}/decline", post(decline_request))
}
