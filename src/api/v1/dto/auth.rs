/*
 * Responsibility
 * - Request/response DTOs for the /auth routes
 * - validate(): shape checks only, credentials are checked by the SessionManager
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::auth::IssuedPair;

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 1024;
const MAX_EMAIL_LEN: usize = 320;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub tenant_id: Uuid,
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err("password is required");
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err("password is too long");
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl RefreshRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.refresh_token.trim().is_empty() {
            return Err("refresh_token is required");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub tenant_id: Uuid,
    pub email: String,
}

impl PasswordResetRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_email(&self.email)
    }
}

#[derive(Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

impl PasswordResetConfirmRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.token.trim().is_empty() {
            return Err("token is required");
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err("new_password must be at least 8 characters");
        }
        if self.new_password.len() > MAX_PASSWORD_LEN {
            return Err("new_password is too long");
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token_type: &'static str,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<IssuedPair> for TokenResponse {
    fn from(pair: IssuedPair) -> Self {
        Self {
            token_type: "Bearer",
            access_token: pair.access_token,
            access_expires_at: pair.access_expires_at,
            refresh_token: pair.refresh_token,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub session_id: String,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub session_id: String,
    pub access_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PasswordResetAccepted {
    pub status: &'static str,
    // Development only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked: usize,
}

fn validate_email(email: &str) -> Result<(), &'static str> {
    let email = email.trim();
    if email.is_empty() {
        return Err("email is required");
    }
    if email.len() > MAX_EMAIL_LEN || !email.contains('@') {
        return Err("email is invalid");
    }
    Ok(())
}
