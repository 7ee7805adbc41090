use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::models::{
    NewPasswordResetToken, NewSession, PasswordResetToken, Session, User, UserUpdate,
};
use crate::repos::error::RepoResult;
use crate::repos::store::CredentialStore;

/// Retries idempotent store calls once, without backoff, on transport failure.
///
/// Inserts and the conditional updates (refresh rotation, reset-token consumption)
/// go straight through: replaying them after an ambiguous failure could turn a
/// success into a spurious "already used".
#[derive(Clone, Debug)]
pub struct RetryOnce<S> {
    inner: S,
}

impl<S> RetryOnce<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

async fn retry_once<T, F, Fut>(op: &'static str, mut call: F) -> RepoResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RepoResult<T>>,
{
    match call().await {
        Err(e) if e.is_transient() => {
            warn!(op, error = %e, "store call failed, retrying once");
            call().await
        }
        other => other,
    }
}

#[async_trait]
impl<S: CredentialStore> CredentialStore for RetryOnce<S> {
    async fn find_user_by_tenant_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<User>> {
        retry_once("find_user_by_tenant_email", move || {
            self.inner.find_user_by_tenant_email(tenant_id, email)
        })
        .await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        retry_once("find_user_by_id", move || self.inner.find_user_by_id(user_id)).await
    }

    async fn update_user(&self, user_id: Uuid, update: &UserUpdate) -> RepoResult<bool> {
        retry_once("update_user", move || self.inner.update_user(user_id, update)).await
    }

    async fn create_session(&self, new: NewSession) -> RepoResult<Session> {
        self.inner.create_session(new).await
    }

    async fn find_session_by_session_id(&self, session_id: &str) -> RepoResult<Option<Session>> {
        retry_once("find_session_by_session_id", move || {
            self.inner.find_session_by_session_id(session_id)
        })
        .await
    }

    async fn find_sessions_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> RepoResult<Vec<Session>> {
        retry_once("find_sessions_by_user", move || {
            self.inner.find_sessions_by_user(user_id, active_only)
        })
        .await
    }

    async fn update_session_activity(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        retry_once("update_session_activity", move || {
            self.inner.update_session_activity(session_id, now)
        })
        .await
    }

    async fn rotate_refresh_token_hash(
        &self,
        session_id: &str,
        expected_hash: &[u8],
        new_hash: &[u8],
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.inner
            .rotate_refresh_token_hash(session_id, expected_hash, new_hash, now)
            .await
    }

    async fn deactivate_session(&self, session_id: &str, now: DateTime<Utc>) -> RepoResult<bool> {
        retry_once("deactivate_session", move || {
            self.inner.deactivate_session(session_id, now)
        })
        .await
    }

    async fn deactivate_all_sessions_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<String>> {
        retry_once("deactivate_all_sessions_for_user", move || {
            self.inner.deactivate_all_sessions_for_user(user_id, now)
        })
        .await
    }

    async fn delete_expired_sessions(
        &self,
        now: DateTime<Utc>,
        inactive_before: DateTime<Utc>,
    ) -> RepoResult<u64> {
        retry_once("delete_expired_sessions", move || {
            self.inner.delete_expired_sessions(now, inactive_before)
        })
        .await
    }

    async fn create_reset_token(
        &self,
        new: NewPasswordResetToken,
    ) -> RepoResult<PasswordResetToken> {
        self.inner.create_reset_token(new).await
    }

    async fn find_reset_token(&self, token_hash: &[u8]) -> RepoResult<Option<PasswordResetToken>> {
        retry_once("find_reset_token", move || self.inner.find_reset_token(token_hash)).await
    }

    async fn mark_reset_token_used(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool> {
        self.inner.mark_reset_token_used(id, now).await
    }
}
