//! Module for core business logic services.
//!
//! Services take a `DataGateway` and the caller's access token and perform
//! one screen's reads or one write, returning typed rows. They know nothing
//! about HTTP; handlers in `crate::api` wrap them into screens.

pub mod billing;
pub mod booking;
pub mod consultation;
pub mod data_aggregator;
pub mod hospital;
pub mod records;
