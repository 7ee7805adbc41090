/*
 * Responsibility
 * - Tenant administration over other users' sessions
 * - Authorization is decided here, before touching the SessionManager
 */
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    api::v1::dto::{auth::RevokedResponse, sessions::CleanupResponse},
    api::v1::extractors::AuthCtxExtractor,
    error::AppError,
    models::Role,
    state::AppState,
};

/// POST /admin/users/{user_id}/logout-all
/// Needs `sessions:revoke_any` and the target user in the caller's tenant.
pub async fn admin_logout_all(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
) -> Result<Json<RevokedResponse>, AppError> {
    state
        .authz
        .require_permission(&ctx.claims, "sessions", "revoke_any")?;

    let user = state
        .sessions
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    state.authz.require_tenant(&ctx.claims, user.tenant_id)?;

    let revoked = state.sessions.logout_all(user.id).await?;
    tracing::info!(
        actor = %ctx.user_id(),
        target = %user.id,
        revoked,
        "administrative logout-all"
    );
    Ok(Json(RevokedResponse { revoked }))
}

/// POST /admin/sessions/cleanup (super_admin only)
pub async fn cleanup_sessions(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<CleanupResponse>, AppError> {
    state.authz.require_role(&ctx.claims, &[Role::SUPER_ADMIN])?;

    let removed = state.sessions.cleanup_expired_sessions().await?;
    Ok(Json(CleanupResponse { removed }))
}
