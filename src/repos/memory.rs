//! In-process Credential Store used by tests and local experiments.
//!
//! Behaves like the Postgres store for every contract the session lifecycle
//! relies on (per-tenant email uniqueness, conditional updates), and can be
//! switched "offline" to exercise transport failures.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    NewPasswordResetToken, NewSession, NewUser, PasswordResetToken, Session, SessionStatus, User,
    UserStatus, UserUpdate, normalize_email,
};
use crate::repos::error::{RepoError, RepoResult};
use crate::repos::store::CredentialStore;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    reset_tokens: HashMap<Uuid, PasswordResetToken>,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    // Number of upcoming calls that fail before the store answers again.
    failures_left: AtomicUsize,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `RepoError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `n` calls, then recover.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn insert_user(&self, new: NewUser) -> RepoResult<User> {
        let email = normalize_email(&new.email);
        let mut tables = self.lock();

        let taken = tables.users.values().any(|u| {
            u.tenant_id == new.tenant_id && u.email == email && u.status != UserStatus::Deleted
        });
        if taken {
            return Err(RepoError::Conflict);
        }

        let user = User {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            email,
            password_hash: new.password_hash,
            role: new.role,
            status: UserStatus::Active,
            last_login_at: None,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn set_user_status(&self, user_id: Uuid, status: UserStatus) -> bool {
        match self.lock().users.get_mut(&user_id) {
            Some(user) => {
                user.status = status;
                true
            }
            None => false,
        }
    }

    pub fn set_user_role(&self, user_id: Uuid, role: crate::models::Role) -> bool {
        match self.lock().users.get_mut(&user_id) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panicked test thread must not wedge the remaining assertions.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_online(&self) -> RepoResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable("in-memory store is offline".to_string()));
        }
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RepoError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_tenant_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<User>> {
        self.check_online()?;
        let user = self
            .lock()
            .users
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email == email && u.status != UserStatus::Deleted)
            .cloned();
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        self.check_online()?;
        let user = self
            .lock()
            .users
            .get(&user_id)
            .filter(|u| u.status != UserStatus::Deleted)
            .cloned();
        Ok(user)
    }

    async fn update_user(&self, user_id: Uuid, update: &UserUpdate) -> RepoResult<bool> {
        self.check_online()?;
        let mut tables = self.lock();
        let Some(user) = tables
            .users
            .get_mut(&user_id)
            .filter(|u| u.status != UserStatus::Deleted)
        else {
            return Ok(false);
        };
        if let Some(hash) = &update.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(at) = update.last_login_at {
            user.last_login_at = Some(at);
        }
        Ok(true)
    }

    async fn create_session(&self, new: NewSession) -> RepoResult<Session> {
        self.check_online()?;
        let mut tables = self.lock();
        if tables.sessions.contains_key(&new.session_id) {
            return Err(RepoError::Conflict);
        }
        let session = Session {
            id: Uuid::new_v4(),
            session_id: new.session_id,
            user_id: new.user_id,
            tenant_id: new.tenant_id,
            refresh_token_hash: new.refresh_token_hash,
            issued_at: new.issued_at,
            expires_at: new.expires_at,
            last_activity_at: new.issued_at,
            status: SessionStatus::Active,
            revoked_at: None,
        };
        tables
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn find_session_by_session_id(&self, session_id: &str) -> RepoResult<Option<Session>> {
        self.check_online()?;
        Ok(self.lock().sessions.get(session_id).cloned())
    }

    async fn find_sessions_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> RepoResult<Vec<Session>> {
        self.check_online()?;
        let mut sessions: Vec<Session> = self
            .lock()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && (!active_only || s.is_active()))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(sessions)
    }

    async fn update_session_activity(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.check_online()?;
        let mut tables = self.lock();
        match tables.sessions.get_mut(session_id).filter(|s| s.is_active()) {
            Some(session) => {
                session.last_activity_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate_refresh_token_hash(
        &self,
        session_id: &str,
        expected_hash: &[u8],
        new_hash: &[u8],
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        self.check_online()?;
        // The table lock makes compare and swap one step.
        let mut tables = self.lock();
        let Some(session) = tables.sessions.get_mut(session_id) else {
            return Ok(false);
        };
        if !session.is_active()
            || session.expires_at <= now
            || session.refresh_token_hash != expected_hash
        {
            return Ok(false);
        }
        session.refresh_token_hash = new_hash.to_vec();
        session.last_activity_at = now;
        Ok(true)
    }

    async fn deactivate_session(&self, session_id: &str, now: DateTime<Utc>) -> RepoResult<bool> {
        self.check_online()?;
        let mut tables = self.lock();
        match tables.sessions.get_mut(session_id).filter(|s| s.is_active()) {
            Some(session) => {
                session.status = SessionStatus::Revoked;
                session.revoked_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate_all_sessions_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<String>> {
        self.check_online()?;
        let mut tables = self.lock();
        let mut revoked = Vec::new();
        for session in tables
            .sessions
            .values_mut()
            .filter(|s| s.user_id == user_id && s.is_active())
        {
            session.status = SessionStatus::Revoked;
            session.revoked_at = Some(now);
            revoked.push(session.session_id.clone());
        }
        Ok(revoked)
    }

    async fn delete_expired_sessions(
        &self,
        now: DateTime<Utc>,
        inactive_before: DateTime<Utc>,
    ) -> RepoResult<u64> {
        self.check_online()?;
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| {
            let expired = s.expires_at <= now;
            let stale = !s.is_active() && s.last_activity_at < inactive_before;
            !(expired || stale)
        });
        Ok((before - tables.sessions.len()) as u64)
    }

    async fn create_reset_token(
        &self,
        new: NewPasswordResetToken,
    ) -> RepoResult<PasswordResetToken> {
        self.check_online()?;
        let mut tables = self.lock();
        if tables
            .reset_tokens
            .values()
            .any(|t| t.token_hash == new.token_hash)
        {
            return Err(RepoError::Conflict);
        }
        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            token_hash: new.token_hash,
            user_id: new.user_id,
            expires_at: new.expires_at,
            used_at: None,
            created_at: Utc::now(),
        };
        tables.reset_tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn find_reset_token(&self, token_hash: &[u8]) -> RepoResult<Option<PasswordResetToken>> {
        self.check_online()?;
        let token = self
            .lock()
            .reset_tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned();
        Ok(token)
    }

    async fn mark_reset_token_used(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool> {
        self.check_online()?;
        let mut tables = self.lock();
        match tables.reset_tokens.get_mut(&id).filter(|t| t.used_at.is_none()) {
            Some(token) => {
                token.used_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
