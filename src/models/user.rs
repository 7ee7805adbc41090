use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active,
    Disabled,
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "disabled" => Some(Self::Disabled),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Identity record. A user belongs to exactly one tenant for its lifetime.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the password hash
        f.debug_struct("User")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("status", &self.status)
            .field("last_login_at", &self.last_login_at)
            .finish()
    }
}

/// Input for inserting a user (seeding / provisioning collaborators).
#[derive(Clone)]
pub struct NewUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Partial update applied by the session lifecycle.
///
/// `None` leaves the column untouched.
#[derive(Clone, Default)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Emails are unique per tenant after trimming and lowercasing.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
