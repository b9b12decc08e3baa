//! Message Handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use validator::Validate;

use crate::application::dto::{SendMessageRequest, SendMessageResponse};
use crate::domain::PhoneNumber;
use crate::shared::error::AppError;
use crate::shared::validation::{json_rejection, validation_error};
use crate::startup::AppState;

/// Send a text message to a phone number.
pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let Json(body) = payload.map_err(json_rejection)?;
    body.validate().map_err(validation_error)?;

    let (Some(phone), Some(message)) = (body.phone, body.message) else {
        return Err(AppError::Validation("phone and message are required".into()));
    };

    let destination = PhoneNumber::parse(&phone, &state.settings.http.default_country_code)?;
    let message_id = state.manager.send_text(&destination, &message).await?;

    Ok(Json(SendMessageResponse {
        success: true,
        to: destination.to_string(),
        message_id,
    }))
}
