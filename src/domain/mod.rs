//! # Domain Layer
//!
//! The domain layer describes the session the gateway owns, independent of
//! any HTTP, storage or protocol implementation.
//!
//! ## Structure
//!
//! - **entities**: Session state, pairing artifacts, credential records and the
//!   credential store contract
//! - **value_objects**: Immutable value types (PhoneNumber)
//! - **protocol**: The contract of the external messaging client
//!
//! ## Design Principles
//!
//! - No dependencies on the presentation layer
//! - Store and protocol traits define the contracts; infrastructure implements them

pub mod entities;
pub mod protocol;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use protocol::*;
pub use value_objects::*;
