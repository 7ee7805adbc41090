/*
 * Responsibility
 * - The authenticated request context as handlers see it
 * - The access middleware has already verified the token and the session
 */
use uuid::Uuid;

use crate::models::Role;
use crate::services::auth::AccessClaims;

#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub claims: AccessClaims,
}

impl AuthCtx {
    pub fn new(claims: AccessClaims) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> Uuid {
        self.claims.user_id
    }

    pub fn tenant_id(&self) -> Uuid {
        self.claims.tenant_id
    }

    pub fn role(&self) -> &Role {
        &self.claims.role
    }

    pub fn session_id(&self) -> &str {
        &self.claims.session_id
    }
}
