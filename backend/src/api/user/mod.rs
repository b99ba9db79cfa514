//! Module for the session snapshot and navigation shell endpoints.
//!
//! Both are public: anonymous callers get a signed-out snapshot and an empty
//! menu rather than a redirect.

pub mod handlers;
pub mod navigation;
pub mod routes;
