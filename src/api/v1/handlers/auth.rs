/*
 * Responsibility
 * - /auth/login, /auth/refresh (public)
 * - /auth/me, /auth/logout, /auth/logout-all (behind the access middleware)
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::dto::auth::{
        LoginRequest, LoginResponse, MeResponse, RefreshRequest, RevokedResponse, TokenResponse,
    },
    api::v1::extractors::AuthCtxExtractor,
    error::AppError,
    state::AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    req.validate().map_err(AppError::invalid_request)?;

    let outcome = state
        .sessions
        .login(req.tenant_id, &req.email, &req.password)
        .await?;

    Ok(Json(LoginResponse {
        user_id: outcome.user.id,
        tenant_id: outcome.user.tenant_id,
        role: outcome.user.role.to_string(),
        session_id: outcome.session.session_id,
        tokens: outcome.tokens.into(),
    }))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    req.validate().map_err(AppError::invalid_request)?;

    let pair = state.sessions.refresh(req.refresh_token.trim()).await?;
    Ok(Json(pair.into()))
}

pub async fn me(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: ctx.user_id(),
        tenant_id: ctx.tenant_id(),
        role: ctx.role().to_string(),
        session_id: ctx.session_id().to_string(),
        access_expires_at: ctx.claims.expires_at,
    })
}

pub async fn logout(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<StatusCode, AppError> {
    state.sessions.logout(ctx.session_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn logout_all(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<RevokedResponse>, AppError> {
    let revoked = state.sessions.logout_all(ctx.user_id()).await?;
    Ok(Json(RevokedResponse { revoked }))
}
