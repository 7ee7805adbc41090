//! Credential Store contract consumed by the session lifecycle.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    NewPasswordResetToken, NewSession, PasswordResetToken, Session, User, UserUpdate,
};
use crate::repos::error::RepoResult;

/// Durable record of users, sessions and reset tokens.
///
/// Every lookup returns `Ok(None)` / `Ok(false)` for "not found" so that it stays
/// distinguishable from a transport failure (`Err`).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Only non-deleted users are returned.
    async fn find_user_by_tenant_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<User>>;

    async fn find_user_by_id(&self, user_id: Uuid) -> RepoResult<Option<User>>;

    async fn update_user(&self, user_id: Uuid, update: &UserUpdate) -> RepoResult<bool>;

    async fn create_session(&self, new: NewSession) -> RepoResult<Session>;

    async fn find_session_by_session_id(&self, session_id: &str) -> RepoResult<Option<Session>>;

    async fn find_sessions_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> RepoResult<Vec<Session>>;

    async fn update_session_activity(&self, session_id: &str, now: DateTime<Utc>)
    -> RepoResult<bool>;

    /// Compare-and-swap of the stored refresh token hash.
    ///
    /// Succeeds only if the session is active, unexpired at `now` and still holds
    /// `expected_hash`. Returns `false` when any of those does not hold.
    async fn rotate_refresh_token_hash(
        &self,
        session_id: &str,
        expected_hash: &[u8],
        new_hash: &[u8],
        now: DateTime<Utc>,
    ) -> RepoResult<bool>;

    /// Returns `false` when the session is missing or already inactive.
    async fn deactivate_session(&self, session_id: &str, now: DateTime<Utc>) -> RepoResult<bool>;

    /// Returns the `session_id`s that were active and are now revoked.
    async fn deactivate_all_sessions_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<String>>;

    /// Hard-delete sessions expired at `now`, and inactive sessions whose last
    /// activity is older than `inactive_before`. Returns the number removed.
    async fn delete_expired_sessions(
        &self,
        now: DateTime<Utc>,
        inactive_before: DateTime<Utc>,
    ) -> RepoResult<u64>;

    async fn create_reset_token(&self, new: NewPasswordResetToken)
    -> RepoResult<PasswordResetToken>;

    async fn find_reset_token(&self, token_hash: &[u8]) -> RepoResult<Option<PasswordResetToken>>;

    /// Sets `used_at` only if it is still unset. Returns `false` if the token was
    /// already consumed (or does not exist).
    async fn mark_reset_token_used(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool>;
}
