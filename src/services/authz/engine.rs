/*
 * Responsibility
 * - Allow/deny gate over already verified access claims
 * - No IO, no token verification, no panics
 */
use tracing::debug;
use uuid::Uuid;

use crate::models::Role;
use crate::services::auth::{AccessClaims, AuthError};
use crate::services::authz::policy::PermissionPolicy;

#[derive(Debug, Clone)]
pub struct Authorizer {
    policy: PermissionPolicy,
}

impl Authorizer {
    pub fn new(policy: PermissionPolicy) -> Self {
        Self { policy }
    }

    /// Exact membership. No role implies another.
    pub fn require_role(&self, claims: &AccessClaims, allowed: &[Role]) -> Result<(), AuthError> {
        if allowed.contains(&claims.role) {
            return Ok(());
        }
        debug!(user_id = %claims.user_id, role = %claims.role, "role not allowed");
        Err(AuthError::PermissionDenied)
    }

    pub fn require_permission(
        &self,
        claims: &AccessClaims,
        resource: &str,
        action: &str,
    ) -> Result<(), AuthError> {
        if self.is_allowed(&claims.role, resource, action) {
            return Ok(());
        }
        debug!(
            user_id = %claims.user_id,
            role = %claims.role,
            resource,
            action,
            "permission not granted"
        );
        Err(AuthError::PermissionDenied)
    }

    /// Tenant-scoped operations act only inside the caller's own tenant.
    pub fn require_tenant(&self, claims: &AccessClaims, tenant_id: Uuid) -> Result<(), AuthError> {
        if claims.tenant_id == tenant_id {
            return Ok(());
        }
        debug!(user_id = %claims.user_id, "cross-tenant access denied");
        Err(AuthError::PermissionDenied)
    }

    pub fn is_allowed(&self, role: &Role, resource: &str, action: &str) -> bool {
        self.policy.allows(role, resource, action)
    }
}
