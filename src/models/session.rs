use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Session status as persisted.
///
/// `Revoked` is terminal: nothing ever moves a session back to `Active`.
/// `Expired` is what an active row reads as once `expires_at` has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Revoked,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// One authenticated client instance (device, browser tab group, ...).
///
/// `id` is the row key; `session_id` is the opaque value embedded into tokens.
#[derive(Clone)]
pub struct Session {
    pub id: Uuid,
    pub session_id: String,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub refresh_token_hash: Vec<u8>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Status as observed at `now`, folding expiry into the persisted status.
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        match self.status {
            SessionStatus::Active if now >= self.expires_at => SessionStatus::Expired,
            status => status,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("tenant_id", &self.tenant_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("last_activity_at", &self.last_activity_at)
            .field("status", &self.status)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct NewSession {
    pub session_id: String,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub refresh_token_hash: Vec<u8>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
