//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::Validate;

/// Send text message request
///
/// Both fields are optional at the serde level so a missing field is reported
/// by the validator like an empty one.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(
        required(message = "Phone number is required"),
        length(min = 1, message = "Phone number is required")
    )]
    pub phone: Option<String>,

    #[validate(
        required(message = "Message is required"),
        length(min = 1, message = "Message is required")
    )]
    pub message: Option<String>,
}
