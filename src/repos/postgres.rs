use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    NewPasswordResetToken, NewSession, PasswordResetToken, Session, User, UserUpdate,
};
use crate::repos::error::RepoResult;
use crate::repos::reset_token_repo::ResetTokenRepo;
use crate::repos::session_repo::SessionRepo;
use crate::repos::store::CredentialStore;
use crate::repos::user_repo::UserRepo;

/// Postgres-backed Credential Store composed from the per-table repos.
#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    users: UserRepo,
    sessions: SessionRepo,
    reset_tokens: ResetTokenRepo,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepo::new(pool.clone()),
            sessions: SessionRepo::new(pool.clone()),
            reset_tokens: ResetTokenRepo::new(pool),
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_tenant_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<User>> {
        self.users.find_by_tenant_email(tenant_id, email).await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        self.users.find_by_id(user_id).await
    }

    async fn update_user(&self, user_id: Uuid, update: &UserUpdate) -> RepoResult<bool> {
        self.users.update(user_id, update).await
    }

    async fn create_session(&self, new: NewSession) -> RepoResult<Session> {
        self.sessions.create(new).await
    }

    async fn find_session_by_session_id(&self, session_id: &str) -> RepoResult<Option<Session>> {
        self.sessions.find_by_session_id(session_id).await
    }

    async fn find_sessions_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> RepoResult<Vec<Session>> {
        self.sessions.find_by_user(user_id, active_only).await
    }

    async fn update_session_activity(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.sessions.touch_last_activity(session_id, now).await
    }

    async fn rotate_refresh_token_hash(
        &self,
        session_id: &str,
        expected_hash: &[u8],
        new_hash: &[u8],
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.sessions
            .rotate_refresh_token_hash(session_id, expected_hash, new_hash, now)
            .await
    }

    async fn deactivate_session(&self, session_id: &str, now: DateTime<Utc>) -> RepoResult<bool> {
        self.sessions.revoke(session_id, now).await
    }

    async fn deactivate_all_sessions_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<String>> {
        self.sessions.revoke_all_for_user(user_id, now).await
    }

    async fn delete_expired_sessions(
        &self,
        now: DateTime<Utc>,
        inactive_before: DateTime<Utc>,
    ) -> RepoResult<u64> {
        self.sessions.delete_expired(now, inactive_before).await
    }

    async fn create_reset_token(
        &self,
        new: NewPasswordResetToken,
    ) -> RepoResult<PasswordResetToken> {
        self.reset_tokens.insert(new).await
    }

    async fn find_reset_token(&self, token_hash: &[u8]) -> RepoResult<Option<PasswordResetToken>> {
        self.reset_tokens.find_by_hash(token_hash).await
    }

    async fn mark_reset_token_used(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool> {
        self.reset_tokens.mark_used(id, now).await
    }
}
