use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Single-use password reset token. Only the hash is persisted.
#[derive(Clone, Debug)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    /// Once `used_at` is set the token never validates again, expired or not.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

#[derive(Clone, Debug)]
pub struct NewPasswordResetToken {
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
