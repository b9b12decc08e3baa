//! Validation Utilities

use axum::extract::rejection::JsonRejection;
use validator::ValidationErrors;

use super::error::AppError;

/// Convert validation errors to AppError, reporting the first failing field
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut fields: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, message)
            })
        })
        .collect();
    // HashMap iteration order is unstable
    fields.sort();

    let message = fields
        .into_iter()
        .next()
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation(message)
}

/// Turn a body that failed to parse as JSON into a validation error
pub fn json_rejection(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("invalid request body: {}", rejection.body_text()))
}
