//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod dashboard;
pub mod health;
pub mod message;
pub mod session;
