//! Doctor screens: today's schedule, consultations, patient records and
//! hospital invitations.

pub mod handlers;
pub mod routes;
