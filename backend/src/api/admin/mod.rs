//! Hospital admin screens.
//!
//! The hospital is resolved through the admin's own `doctors` row on every
//! request. Until a hospital exists only the settings screen does anything;
//! the others return empty views pointing there.

pub mod handlers;
pub mod routes;
