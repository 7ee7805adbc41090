/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - sessions: SessionManager (token + session lifecycle)
 *   - authz: Authorizer (role / permission gate)
 * - Cheap to clone (Arc inside)
 */
use std::sync::Arc;

use crate::services::auth::SessionManager;
use crate::services::authz::Authorizer;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub authz: Arc<Authorizer>,
    // Development only: return raw password reset tokens in the response body.
    pub expose_reset_tokens: bool,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, authz: Arc<Authorizer>) -> Self {
        Self {
            sessions,
            authz,
            expose_reset_tokens: false,
        }
    }

    pub fn with_exposed_reset_tokens(mut self, expose: bool) -> Self {
        self.expose_reset_tokens = expose;
        self
    }
}
