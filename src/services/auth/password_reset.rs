use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{NewPasswordResetToken, UserUpdate, normalize_email};
use crate::services::auth::error::AuthError;
use crate::services::auth::secrets::{generate_opaque_token, hash_token};
use crate::services::auth::session_manager::SessionManager;

/// Raw reset token, handed out exactly once for out-of-band delivery.
#[derive(Clone)]
pub struct PasswordResetGrant {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for PasswordResetGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordResetGrant")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// `Ok(None)` when there is no active user for `(tenant_id, email)`.
    pub async fn request_password_reset(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<Option<PasswordResetGrant>, AuthError> {
        let email = normalize_email(email);
        let user = self
            .store_call(
                "find_user_by_tenant_email",
                self.store.find_user_by_tenant_email(tenant_id, &email),
            )
            .await?;
        let Some(user) = user.filter(|u| u.is_active()) else {
            return Ok(None);
        };

        let now = self.clock.now();
        let token = generate_opaque_token()?;
        let expires_at = now + self.password_reset_ttl;
        self.store_call(
            "create_reset_token",
            self.store.create_reset_token(NewPasswordResetToken {
                token_hash: hash_token(&token),
                user_id: user.id,
                expires_at,
            }),
        )
        .await?;

        info!(user_id = %user.id, "password reset requested");
        Ok(Some(PasswordResetGrant {
            token,
            user_id: user.id,
            expires_at,
        }))
    }

    /// Consumes a reset token, sets the new password and revokes every session.
    ///
    /// Returns the number of sessions revoked.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<usize, AuthError> {
        let now = self.clock.now();
        let record = self
            .store_call(
                "find_reset_token",
                self.store.find_reset_token(&hash_token(token)),
            )
            .await?
            .filter(|t| t.is_usable_at(now))
            .ok_or(AuthError::ResetTokenInvalidOrUsed)?;

        let user = self
            .store_call("find_user_by_id", self.store.find_user_by_id(record.user_id))
            .await?
            .filter(|u| u.is_active())
            .ok_or(AuthError::ResetTokenInvalidOrUsed)?;

        let password_hash = self.hash_password(new_password).await?;

        // Sessions go first and the token last: any failure before the token is
        // consumed leaves it usable, and retrying repeats every step.
        let revoked = self.logout_all(user.id).await?;

        let update = UserUpdate {
            password_hash: Some(password_hash),
            ..UserUpdate::default()
        };
        let updated = self
            .store_call("update_user", self.store.update_user(user.id, &update))
            .await?;
        if !updated {
            warn!(user_id = %user.id, "user disappeared during password reset");
            return Err(AuthError::Internal);
        }

        let consumed = self
            .store_call(
                "mark_reset_token_used",
                self.store.mark_reset_token_used(record.id, now),
            )
            .await?;
        if !consumed {
            warn!(user_id = %user.id, "reset token consumed concurrently");
            return Err(AuthError::ResetTokenInvalidOrUsed);
        }

        info!(user_id = %user.id, revoked, "password reset completed");
        Ok(revoked)
    }
}
