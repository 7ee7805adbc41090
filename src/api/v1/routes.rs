/*
 * Responsibility
 * - URL structure of v1
 * - Public routes (login/refresh/password reset) vs. routes behind the access middleware
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth::access;
use crate::state::AppState;

use crate::api::v1::handlers::{
    admin::{admin_logout_all, cleanup_sessions},
    auth::{login, logout, logout_all, me, refresh},
    password_reset::{confirm_password_reset, request_password_reset},
    sessions::list_sessions,
};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/password-reset/request", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset));

    let protected = Router::new()
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .route("/auth/logout-all", post(logout_all))
        .route("/sessions", get(list_sessions))
        .route("/admin/users/{user_id}/logout-all", post(admin_logout_all))
        .route("/admin/sessions/cleanup", post(cleanup_sessions));

    public.merge(access::apply(protected, state))
}
