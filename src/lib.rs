//! # WA Gateway Library
//!
//! A small REST gateway in front of a WhatsApp protocol client:
//! - pairing code retrieval and connection status
//! - text message delivery to phone numbers
//! - credential persistence (memory, file, PostgreSQL or Redis)
//! - automatic reconnect with backoff and a single clean-slate retry
//!
//! ## Architecture
//!
//! - **Domain Layer**: Session state, credential records, phone numbers and
//!   the protocol client / credential store contracts
//! - **Application Layer**: The connection manager and DTOs
//! - **Infrastructure Layer**: Credential backends, the protocol gateway
//!   bridge, metrics
//! - **Presentation Layer**: HTTP handlers, middleware and the dashboard page
//!
//! ## Module Structure
//!
//! ```text
//! wa_gateway/
//! +-- config/         Configuration management
//! +-- domain/         Entities, value objects and contracts
//! +-- application/    Connection manager and DTOs
//! +-- infrastructure/ Credential stores, protocol bridge, metrics
//! +-- presentation/   HTTP routes and middleware
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer
pub mod domain;

// Application layer
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
