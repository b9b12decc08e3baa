//! HTTP Interface

pub mod handlers;
pub mod routes;
