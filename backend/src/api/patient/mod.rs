//! Patient screens: dashboard, booking, medical history and profile.
//!
//! Every handler starts from the caller's `patients` row; a patient whose
//! row does not exist yet gets an empty view with guidance instead of an
//! error.

pub mod handlers;
pub mod routes;
