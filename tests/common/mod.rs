#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tenant_auth::config::{AuthConfig, SigningConfig};
use tenant_auth::models::{
    NewPasswordResetToken, NewSession, NewUser, PasswordResetToken, Role, Session, User,
    UserUpdate,
};
use tenant_auth::repos::{
    CredentialStore, InMemoryCredentialStore, RepoError, RepoResult, RetryOnce,
};
use tenant_auth::services::auth::{AuthError, LoginOutcome, SessionManager, TokenAuthority};
use tenant_auth::services::cache::InMemoryCache;
use tenant_auth::services::clock::ManualClock;
use tenant_auth::services::password::PasswordHasher;

pub const SECRET: &str = "test-secret-test-secret-test-secret!";
pub const PASSWORD: &str = "correct horse battery";

/// Cheap reversible "hash" so tests do not pay for Argon2.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, password_hash: &str) -> bool {
        password_hash == format!("plain:{password}")
    }
}

/// Store wrapper with per-operation faults: session lookups hang while
/// `stalled` is set, user updates and logout-all fail on demand.
pub struct StallingStore {
    inner: Arc<RetryOnce<InMemoryCredentialStore>>,
    stalled: AtomicBool,
    fail_user_updates: AtomicBool,
    fail_logout_all: AtomicBool,
}

impl StallingStore {
    fn new(inner: Arc<RetryOnce<InMemoryCredentialStore>>) -> Self {
        Self {
            inner,
            stalled: AtomicBool::new(false),
            fail_user_updates: AtomicBool::new(false),
            fail_logout_all: AtomicBool::new(false),
        }
    }

    pub fn stall(&self, on: bool) {
        self.stalled.store(on, Ordering::SeqCst);
    }

    pub fn fail_user_updates(&self, on: bool) {
        self.fail_user_updates.store(on, Ordering::SeqCst);
    }

    pub fn fail_logout_all(&self, on: bool) {
        self.fail_logout_all.store(on, Ordering::SeqCst);
    }
}

fn injected(flag: &AtomicBool, op: &str) -> RepoResult<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(RepoError::Unavailable(format!("{op}: injected failure")));
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for StallingStore {
    async fn find_user_by_tenant_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<User>> {
        self.inner.find_user_by_tenant_email(tenant_id, email).await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        self.inner.find_user_by_id(user_id).await
    }

    async fn update_user(&self, user_id: Uuid, update: &UserUpdate) -> RepoResult<bool> {
        injected(&self.fail_user_updates, "update_user")?;
        self.inner.update_user(user_id, update).await
    }

    async fn create_session(&self, new: NewSession) -> RepoResult<Session> {
        self.inner.create_session(new).await
    }

    async fn find_session_by_session_id(&self, session_id: &str) -> RepoResult<Option<Session>> {
        if self.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.find_session_by_session_id(session_id).await
    }

    async fn find_sessions_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> RepoResult<Vec<Session>> {
        self.inner.find_sessions_by_user(user_id, active_only).await
    }

    async fn update_session_activity(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.inner.update_session_activity(session_id, now).await
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
        self.inner.deactivate_session(session_id, now).await
    }

    async fn deactivate_all_sessions_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<String>> {
        injected(&self.fail_logout_all, "deactivate_all_sessions_for_user")?;
        self.inner.deactivate_all_sessions_for_user(user_id, now).await
    }

    async fn delete_expired_sessions(
        &self,
        now: DateTime<Utc>,
        inactive_before: DateTime<Utc>,
    ) -> RepoResult<u64> {
        self.inner.delete_expired_sessions(now, inactive_before).await
    }

    async fn create_reset_token(
        &self,
        new: NewPasswordResetToken,
    ) -> RepoResult<PasswordResetToken> {
        self.inner.create_reset_token(new).await
    }

    async fn find_reset_token(&self, token_hash: &[u8]) -> RepoResult<Option<PasswordResetToken>> {
        self.inner.find_reset_token(token_hash).await
    }

    async fn mark_reset_token_used(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool> {
        self.inner.mark_reset_token_used(id, now).await
    }
}

pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_900_000_000, 0).unwrap()
}

pub fn auth_config() -> AuthConfig {
    let mut config = AuthConfig::new(
        "https://auth.test",
        "tenant-api",
        SigningConfig::Hs256 {
            secret: SECRET.to_string(),
        },
    );
    config.access_token_ttl_seconds = 900;
    config.refresh_token_ttl_seconds = 7 * 86_400;
    config.token_leeway_seconds = 0;
    config.session_cache_ttl_seconds = 5;
    config.session_retention_seconds = 86_400;
    config.password_reset_ttl_seconds = 1_800;
    config.store_timeout_ms = 500;
    config
}

pub struct Harness {
    pub store: Arc<RetryOnce<InMemoryCredentialStore>>,
    pub stalling: Arc<StallingStore>,
    pub cache: Arc<InMemoryCache>,
    pub clock: Arc<ManualClock>,
    pub sessions: Arc<SessionManager>,
    pub tenant_a: Uuid,
    pub tenant_b: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut AuthConfig)) -> Self {
        let mut config = auth_config();
        tweak(&mut config);

        let store = Arc::new(RetryOnce::new(InMemoryCredentialStore::new()));
        let stalling = Arc::new(StallingStore::new(store.clone()));
        let cache = Arc::new(InMemoryCache::new());
        let clock = Arc::new(ManualClock::new(t0()));

        let sessions = Arc::new(SessionManager::new(
            &config,
            stalling.clone(),
            cache.clone(),
            TokenAuthority::new(&config).unwrap(),
            Arc::new(PlainHasher),
            clock.clone(),
        ));

        Self {
            store,
            stalling,
            cache,
            clock,
            sessions,
            tenant_a: Uuid::new_v4(),
            tenant_b: Uuid::new_v4(),
        }
    }

    pub fn memory(&self) -> &InMemoryCredentialStore {
        self.store.inner()
    }

    pub fn add_user(&self, tenant_id: Uuid, email: &str, role: Role) -> User {
        self.memory()
            .insert_user(NewUser {
                tenant_id,
                email: email.to_string(),
                password_hash: format!("plain:{PASSWORD}"),
                role,
            })
            .unwrap()
    }

    pub async fn login(&self, user: &User) -> LoginOutcome {
        self.sessions
            .login(user.tenant_id, &user.email, PASSWORD)
            .await
            .unwrap()
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }
}
