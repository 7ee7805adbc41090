use thiserror::Error;
use tracing::warn;

use crate::repos::error::RepoError;

/// Outcome taxonomy of the token/session lifecycle and the authorization gate.
///
/// Business errors are returned to the caller as-is. `StoreUnavailable` and
/// `CacheUnavailable` are transport conditions the caller may retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email and wrong password are deliberately the same signal.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token expired")]
    TokenExpired,

    /// Malformed, bad signature/issuer/audience, wrong token kind, or a
    /// refresh token that is no longer the current one for its session.
    #[error("token invalid")]
    TokenInvalid,

    #[error("session revoked")]
    SessionRevoked,

    #[error("session expired")]
    SessionExpired,

    #[error("session not found")]
    SessionNotFound,

    #[error("password reset token is invalid or already used")]
    ResetTokenInvalidOrUsed,

    #[error("permission denied")]
    PermissionDenied,

    #[error("credential store unavailable")]
    StoreUnavailable,

    #[error("cache unavailable")]
    CacheUnavailable,

    #[error("conflict")]
    Conflict,

    /// Missing or unusable key material. Only reachable through misconfiguration.
    #[error("signing error: {0}")]
    Signing(String),

    #[error("internal error")]
    Internal,
}

impl From<RepoError> for AuthError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => AuthError::Conflict,
            RepoError::InvalidRow(detail) => {
                warn!(detail = %detail, "credential store returned an unreadable row");
                AuthError::Internal
            }
            RepoError::Db(_) | RepoError::Unavailable(_) | RepoError::Timeout => {
                AuthError::StoreUnavailable
            }
        }
    }
}
