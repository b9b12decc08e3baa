//! Application Layer
//!
//! The connection manager and the DTOs the HTTP layer renders. This layer
//! orchestrates the flow between the presentation layer, the protocol client
//! and the credential store.

pub mod services;
pub mod dto;
