/*
 * Responsibility
 * - POST /auth/password-reset/request: always 202, whether or not the user exists
 * - POST /auth/password-reset/confirm: consume the token, set the password, revoke sessions
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::dto::auth::{PasswordResetAccepted, PasswordResetConfirmRequest, PasswordResetRequest},
    error::AppError,
    state::AppState,
};

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<(StatusCode, Json<PasswordResetAccepted>), AppError> {
    req.validate().map_err(AppError::invalid_request)?;

    let grant = state
        .sessions
        .request_password_reset(req.tenant_id, &req.email)
        .await?;

    // Delivery of the raw token is up to an out-of-band channel.
    let reset_token = grant
        .filter(|_| state.expose_reset_tokens)
        .map(|grant| grant.token);

    Ok((
        StatusCode::ACCEPTED,
        Json(PasswordResetAccepted {
            status: "accepted",
            reset_token,
        }),
    ))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetConfirmRequest>,
) -> Result<StatusCode, AppError> {
    req.validate().map_err(AppError::invalid_request)?;

    state
        .sessions
        .reset_password(req.token.trim(), &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
