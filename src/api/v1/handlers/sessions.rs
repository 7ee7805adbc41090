/*
 * Responsibility
 * - GET /sessions: the caller's own sessions (permission sessions:read)
 */
use axum::{
    Json,
    extract::{Query, State},
};

use crate::{
    api::v1::dto::sessions::{ListSessionsQuery, SessionResponse},
    api::v1::extractors::AuthCtxExtractor,
    error::AppError,
    state::AppState,
};

pub async fn list_sessions(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    state
        .authz
        .require_permission(&ctx.claims, "sessions", "read")?;

    let sessions = state
        .sessions
        .list_sessions(ctx.user_id(), query.active_only)
        .await?;

    let now = state.sessions.now();
    let res = sessions
        .iter()
        .map(|s| SessionResponse::from_session(s, ctx.session_id(), now))
        .collect();

    Ok(Json(res))
}
