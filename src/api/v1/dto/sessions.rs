use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Session;

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    #[serde(default = "default_active_only")]
    pub active_only: bool,
}

fn default_active_only() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: &'static str,
    pub current: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl SessionResponse {
    /// `status` is evaluated at `now`, so an active row past expiry reads as expired.
    pub fn from_session(session: &Session, current_session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session.session_id.clone(),
            status: session.status_at(now).as_str(),
            current: session.session_id == current_session_id,
            issued_at: session.issued_at,
            expires_at: session.expires_at,
            last_activity_at: session.last_activity_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}
