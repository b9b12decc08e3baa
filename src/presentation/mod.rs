//! Presentation Layer
//!
//! HTTP routes, handlers and the optional dashboard page.

pub mod http;
pub mod middleware;
