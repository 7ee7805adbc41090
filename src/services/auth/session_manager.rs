/*
 * Responsibility
 * - Session lifecycle: login, refresh (rotation), authenticate, logout, logout-all,
 *   enumeration, activity tracking, cleanup
 * - Binds sessions to the token pairs the TokenAuthority mints
 * - Store calls run under a deadline; a store failure while authenticating denies
 * - Cache failures never abort a request (see liveness.rs)
 */
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{NewSession, Session, SessionStatus, User, UserUpdate, normalize_email};
use crate::repos::{CredentialStore, RepoResult};
use crate::services::auth::claims::AccessClaims;
use crate::services::auth::error::AuthError;
use crate::services::auth::liveness::{Liveness, LookupTier, SessionLivenessCache};
use crate::services::auth::secrets::{generate_opaque_token, hash_token, hashes_match};
use crate::services::auth::token_authority::{IssuedPair, TokenAuthority, TokenSubject};
use crate::services::cache::CacheClient;
use crate::services::clock::Clock;
use crate::services::password::PasswordHasher;

const DUMMY_PASSWORD: &str = "dummy-password-for-unknown-users";
// Upper bound for configured windows (100 years).
const MAX_WINDOW_SECONDS: i64 = 100 * 365 * 86_400;

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
    pub tokens: IssuedPair,
}

pub struct SessionManager {
    pub(super) store: Arc<dyn CredentialStore>,
    pub(super) liveness: SessionLivenessCache,
    pub(super) tokens: TokenAuthority,
    pub(super) passwords: Arc<dyn PasswordHasher>,
    pub(super) clock: Arc<dyn Clock>,
    store_timeout: Duration,
    revocation_ttl: Duration,
    session_retention: chrono::Duration,
    pub(super) password_reset_ttl: chrono::Duration,
    revoke_on_refresh_reuse: bool,
    dummy_password_hash: OnceCell<String>,
}

impl SessionManager {
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn CacheClient>,
        tokens: TokenAuthority,
        passwords: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store_timeout = Duration::from_millis(config.store_timeout_ms);
        Self {
            store,
            liveness: SessionLivenessCache::new(
                cache,
                store_timeout,
                Duration::from_secs(config.session_cache_ttl_seconds),
            ),
            tokens,
            passwords,
            clock,
            store_timeout,
            // Any access token still in flight expires within this window.
            revocation_ttl: Duration::from_secs(
                config
                    .access_token_ttl_seconds
                    .saturating_add(config.token_leeway_seconds),
            ),
            session_retention: window(config.session_retention_seconds),
            password_reset_ttl: window(config.password_reset_ttl_seconds),
            revoke_on_refresh_reuse: config.revoke_on_refresh_reuse,
            dummy_password_hash: OnceCell::new(),
        }
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Non-deleted user by id (administrative lookups).
    pub async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        self.store_call("find_user_by_id", self.store.find_user_by_id(user_id))
            .await
    }

    /// Password login. A new session per call; existing sessions are left alone.
    pub async fn login(
        &self,
        tenant_id: Uuid,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        let user = self
            .store_call(
                "find_user_by_tenant_email",
                self.store.find_user_by_tenant_email(tenant_id, &email),
            )
            .await?;

        let Some(user) = user else {
            // Same work as a real mismatch so the two cases look alike.
            let dummy = self.dummy_hash().await?;
            let _ = self.verify_password(password, dummy).await?;
            debug!(tenant_id = %tenant_id, "login failed: no such user");
            return Err(AuthError::InvalidCredentials);
        };

        let matches = self.verify_password(password, &user.password_hash).await?;
        if !matches || !user.is_active() {
            debug!(user_id = %user.id, active = user.is_active(), "login failed");
            return Err(AuthError::InvalidCredentials);
        }

        let now = self.clock.now();
        let session_id = generate_opaque_token()?;
        let subject = TokenSubject {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role.clone(),
            session_id: session_id.clone(),
        };
        let tokens = self.tokens.issue_pair(&subject, now)?;

        let session = self
            .store_call(
                "create_session",
                self.store.create_session(NewSession {
                    session_id,
                    user_id: user.id,
                    tenant_id: user.tenant_id,
                    refresh_token_hash: hash_token(&tokens.refresh_token),
                    issued_at: now,
                    expires_at: tokens.refresh_expires_at,
                }),
            )
            .await?;

        let update = UserUpdate {
            last_login_at: Some(now),
            ..UserUpdate::default()
        };
        if let Err(e) = self
            .store_call("update_user", self.store.update_user(user.id, &update))
            .await
        {
            // The session exists already; a stale last_login_at is tolerable.
            warn!(user_id = %user.id, error = %e, "failed to record last login");
        }

        info!(
            user_id = %user.id,
            tenant_id = %user.tenant_id,
            session_id = %session.session_id,
            "login succeeded"
        );

        Ok(LoginOutcome {
            user,
            session,
            tokens,
        })
    }

    /// Exchanges a refresh token for a new pair and rotates the stored hash.
    ///
    /// The rotation is a compare-and-swap on the stored hash: of two concurrent
    /// calls with the same token exactly one succeeds.
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedPair, AuthError> {
        let now = self.clock.now();
        let claims = self.tokens.verify_refresh_token(refresh_token, now)?;

        let session = self
            .store_call(
                "find_session_by_session_id",
                self.store.find_session_by_session_id(&claims.session_id),
            )
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.user_id != claims.user_id || session.tenant_id != claims.tenant_id {
            warn!(session_id = %session.session_id, "refresh token does not match its session");
            return Err(AuthError::TokenInvalid);
        }

        session_status_error(session.status_at(now))?;

        let presented = hash_token(refresh_token);
        if !hashes_match(&presented, &session.refresh_token_hash) {
            warn!(
                session_id = %session.session_id,
                user_id = %session.user_id,
                "superseded refresh token presented"
            );
            if self.revoke_on_refresh_reuse {
                self.revoke_session(&session.session_id).await?;
            }
            return Err(AuthError::TokenInvalid);
        }

        // Role comes from the live user record, not from anything the token carried.
        let user = self
            .store_call("find_user_by_id", self.store.find_user_by_id(session.user_id))
            .await?;
        let user = match user {
            Some(user) if user.is_active() => user,
            _ => {
                info!(session_id = %session.session_id, "user no longer active, revoking session");
                self.revoke_session(&session.session_id).await?;
                return Err(AuthError::SessionRevoked);
            }
        };
        if user.tenant_id != session.tenant_id {
            return Err(AuthError::TokenInvalid);
        }

        let subject = TokenSubject {
            user_id: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
            session_id: session.session_id.clone(),
        };
        let pair = self
            .tokens
            .issue_pair_until(&subject, now, Some(session.expires_at))?;

        let rotated = self
            .store_call(
                "rotate_refresh_token_hash",
                self.store.rotate_refresh_token_hash(
                    &session.session_id,
                    &presented,
                    &hash_token(&pair.refresh_token),
                    now,
                ),
            )
            .await?;

        if !rotated {
            return Err(self.rotation_lost(&session.session_id).await);
        }

        debug!(session_id = %session.session_id, "refresh token rotated");
        Ok(pair)
    }

    /// Verifies an access token and confirms its session is still live.
    ///
    /// Cache first (revocation marker, then positive entry), store on a miss.
    pub async fn authenticate(&self, access_token: &str) -> Result<AccessClaims, AuthError> {
        let now = self.clock.now();
        let claims = self.tokens.verify_access_token(access_token, now)?;

        match self.liveness.cached(&claims.session_id).await {
            Some(Liveness::Revoked) => {
                debug!(session_id = %claims.session_id, "session revoked (cache)");
                return Err(AuthError::SessionRevoked);
            }
            Some(Liveness::Active(user_id)) if user_id == claims.user_id => {
                debug!(session_id = %claims.session_id, tier = ?LookupTier::Cache, "session live");
                return Ok(claims);
            }
            _ => {}
        }

        // Fails closed: a store error or timeout here is never "authenticated".
        let session = self
            .store_call(
                "find_session_by_session_id",
                self.store.find_session_by_session_id(&claims.session_id),
            )
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.user_id != claims.user_id || session.tenant_id != claims.tenant_id {
            warn!(session_id = %session.session_id, "access token does not match its session");
            return Err(AuthError::TokenInvalid);
        }

        match session.status_at(now) {
            SessionStatus::Active => {
                let remaining = (session.expires_at - now).to_std().unwrap_or(Duration::ZERO);
                self.liveness
                    .remember_active(&session.session_id, session.user_id, remaining)
                    .await;
                debug!(session_id = %session.session_id, tier = ?LookupTier::Store, "session live");
                Ok(claims)
            }
            SessionStatus::Revoked => {
                self.liveness
                    .mark_revoked(&session.session_id, self.revocation_ttl)
                    .await;
                Err(AuthError::SessionRevoked)
            }
            SessionStatus::Expired => Err(AuthError::SessionExpired),
        }
    }

    /// Revokes exactly one session. Unknown or already revoked is still `Ok`.
    pub async fn logout(&self, session_id: &str) -> Result<(), AuthError> {
        let revoked = self.revoke_session(session_id).await?;
        info!(session_id = %session_id, revoked, "logout");
        Ok(())
    }

    /// Revokes every active session of the user. Returns how many were revoked.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<usize, AuthError> {
        let now = self.clock.now();
        let revoked = self
            .store_call(
                "deactivate_all_sessions_for_user",
                self.store.deactivate_all_sessions_for_user(user_id, now),
            )
            .await?;

        for session_id in &revoked {
            self.liveness
                .mark_revoked(session_id, self.revocation_ttl)
                .await;
        }

        info!(user_id = %user_id, count = revoked.len(), "logout all");
        Ok(revoked.len())
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Session>, AuthError> {
        self.store_call(
            "find_sessions_by_user",
            self.store.find_sessions_by_user(user_id, active_only),
        )
        .await
    }

    /// Bumps `last_activity_at`. `false` when the session is no longer active.
    pub async fn record_activity(&self, session_id: &str) -> Result<bool, AuthError> {
        let now = self.clock.now();
        self.store_call(
            "update_session_activity",
            self.store.update_session_activity(session_id, now),
        )
        .await
    }

    /// Hard-deletes expired sessions and inactive ones past the retention window.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AuthError> {
        let now = self.clock.now();
        let inactive_before = now
            .checked_sub_signed(self.session_retention)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);
        let removed = self
            .store_call(
                "delete_expired_sessions",
                self.store.delete_expired_sessions(now, inactive_before),
            )
            .await?;

        if removed > 0 {
            info!(removed, "expired sessions removed");
        }
        Ok(removed)
    }

    /// Store revocation plus cache marker. Returns whether a live session was revoked.
    pub(super) async fn revoke_session(&self, session_id: &str) -> Result<bool, AuthError> {
        let now = self.clock.now();
        let revoked = self
            .store_call(
                "deactivate_session",
                self.store.deactivate_session(session_id, now),
            )
            .await?;

        // Marker even when the row was already inactive, to flush stale positives.
        self.liveness
            .mark_revoked(session_id, self.revocation_ttl)
            .await;
        Ok(revoked)
    }

    // The swap was refused: someone rotated or revoked first.
    async fn rotation_lost(&self, session_id: &str) -> AuthError {
        let now = self.clock.now();
        let current = self
            .store_call(
                "find_session_by_session_id",
                self.store.find_session_by_session_id(session_id),
            )
            .await;

        match current {
            Ok(Some(session)) => match session_status_error(session.status_at(now)) {
                Err(e) => e,
                Ok(()) => {
                    warn!(session_id = %session_id, "concurrent refresh lost the rotation race");
                    AuthError::TokenInvalid
                }
            },
            Ok(None) => AuthError::SessionNotFound,
            Err(e) => e,
        }
    }

    pub(super) async fn store_call<T, F>(&self, op: &'static str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = RepoResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(op, error = %e, "credential store call failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "credential store call timed out"
                );
                Err(AuthError::StoreUnavailable)
            }
        }
    }

    pub(super) async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.passwords);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!(error = %e, "password hashing task failed");
                AuthError::Internal
            })?
    }

    async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.passwords);
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &password_hash))
            .await
            .map_err(|e| {
                error!(error = %e, "password verification task failed");
                AuthError::Internal
            })
    }

    async fn dummy_hash(&self) -> Result<&str, AuthError> {
        self.dummy_password_hash
            .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD))
            .await
            .map(String::as_str)
    }
}

fn window(seconds: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX).min(MAX_WINDOW_SECONDS))
}

fn session_status_error(status: SessionStatus) -> Result<(), AuthError> {
    match status {
        SessionStatus::Active => Ok(()),
        SessionStatus::Revoked => Err(AuthError::SessionRevoked),
        SessionStatus::Expired => Err(AuthError::SessionExpired),
    }
}
