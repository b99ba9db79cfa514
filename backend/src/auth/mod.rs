//! Authentication module for browser sessions, role resolution and access control.
//!
//! This module provides the session/role resolver, the store of browser
//! sessions, the route guard middleware, and the sign-in, sign-up and
//! sign-out endpoints.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod store;

pub use middleware::route_guard;
pub use store::SessionStore;
