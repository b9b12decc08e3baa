//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **PhoneNumber**: destination number normalized to international digits

mod phone;

pub use phone::*;
