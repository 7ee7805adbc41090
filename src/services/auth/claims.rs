use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;
use crate::services::auth::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Wire payload shared by both token kinds.
///
/// `role` is only present on access tokens; refresh never trusts a role it
/// carried itself.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct JwtClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub tid: Uuid,
    pub sid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Verified identity of an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub jti: String,
}

/// Verified refresh token. Carries no role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub session_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub jti: String,
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    DateTime::from_timestamp(secs, 0).ok_or(AuthError::TokenInvalid)
}

fn subject(claims: &JwtClaims) -> Result<Uuid, AuthError> {
    if claims.sid.is_empty() {
        return Err(AuthError::TokenInvalid);
    }
    Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenInvalid)
}

impl TryFrom<JwtClaims> for AccessClaims {
    type Error = AuthError;

    fn try_from(claims: JwtClaims) -> Result<Self, Self::Error> {
        let user_id = subject(&claims)?;
        let role = claims.role.ok_or(AuthError::TokenInvalid)?;
        Ok(Self {
            user_id,
            tenant_id: claims.tid,
            role,
            session_id: claims.sid,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
            jti: claims.jti,
        })
    }
}

impl TryFrom<JwtClaims> for RefreshClaims {
    type Error = AuthError;

    fn try_from(claims: JwtClaims) -> Result<Self, Self::Error> {
        let user_id = subject(&claims)?;
        Ok(Self {
            user_id,
            tenant_id: claims.tid,
            session_id: claims.sid,
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
            jti: claims.jti,
        })
    }
}
