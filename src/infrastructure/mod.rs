//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Credential stores (memory, file, PostgreSQL, Redis)
//! - The protocol gateway bridge (HTTP)
//! - Database and Redis connection setup
//! - Prometheus metrics

pub mod cache;
pub mod credentials;
pub mod database;
pub mod metrics;
pub mod protocol;
