//! Fast tier of the two-tier session liveness lookup.
//!
//! Two keys per session:
//! - `auth:session:revoked:{sid}`: revocation marker. Present means revoked,
//!   the store is not consulted.
//! - `auth:session:active:{sid}`: positive entry written after a store hit.
//!   Its TTL is the staleness bound between a revocation and cache convergence.
//!
//! Every cache failure (error or timeout) degrades to a miss.
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::cache::CacheClient;

const REVOKED_PREFIX: &str = "auth:session:revoked:";
const ACTIVE_PREFIX: &str = "auth:session:active:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Cached positive entry for this user.
    Active(Uuid),
    Revoked,
}

/// Which tier answered a liveness lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupTier {
    Cache,
    Store,
}

#[derive(Clone)]
pub struct SessionLivenessCache {
    cache: Arc<dyn CacheClient>,
    call_timeout: Duration,
    positive_ttl: Duration,
}

impl SessionLivenessCache {
    pub fn new(cache: Arc<dyn CacheClient>, call_timeout: Duration, positive_ttl: Duration) -> Self {
        Self {
            cache,
            call_timeout,
            positive_ttl,
        }
    }

    pub async fn cached(&self, session_id: &str) -> Option<Liveness> {
        if self.get(&revoked_key(session_id)).await.is_some() {
            return Some(Liveness::Revoked);
        }

        let value = self.get(&active_key(session_id)).await?;
        match Uuid::parse_str(&value) {
            Ok(user_id) => Some(Liveness::Active(user_id)),
            Err(_) => {
                warn!(session_id = %session_id, "unreadable session liveness entry, ignoring");
                None
            }
        }
    }

    /// Positive entry, never longer than the configured TTL or `remaining`.
    pub async fn remember_active(&self, session_id: &str, user_id: Uuid, remaining: Duration) {
        let ttl = self.positive_ttl.min(remaining);
        if ttl.is_zero() {
            return;
        }
        self.set(&active_key(session_id), &user_id.to_string(), ttl)
            .await;
    }

    /// Revocation marker plus removal of the positive entry.
    ///
    /// `ttl` should cover the longest remaining lifetime of any access token
    /// bound to the session.
    pub async fn mark_revoked(&self, session_id: &str, ttl: Duration) {
        self.set(&revoked_key(session_id), "1", ttl).await;

        let key = active_key(session_id);
        match tokio::time::timeout(self.call_timeout, self.cache.del(&key)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(
                backend = self.cache.backend_name(),
                key = %key,
                error = %e,
                "cache delete failed"
            ),
            Err(_) => warn!(backend = self.cache.backend_name(), key = %key, "cache delete timed out"),
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        match tokio::time::timeout(self.call_timeout, self.cache.get_string(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(
                    backend = self.cache.backend_name(),
                    key = %key,
                    error = %e,
                    "cache get failed, treating as miss"
                );
                None
            }
            Err(_) => {
                warn!(backend = self.cache.backend_name(), key = %key, "cache get timed out, treating as miss");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) {
        match tokio::time::timeout(self.call_timeout, self.cache.set_with_ttl(key, value, ttl)).await
        {
            Ok(Ok(())) => debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache set"),
            Ok(Err(e)) => warn!(
                backend = self.cache.backend_name(),
                key = %key,
                error = %e,
                "cache set failed"
            ),
            Err(_) => warn!(backend = self.cache.backend_name(), key = %key, "cache set timed out"),
        }
    }
}

fn revoked_key(session_id: &str) -> String {
    format!("{REVOKED_PREFIX}{session_id}")
}

fn active_key(session_id: &str) -> String {
    format!("{ACTIVE_PREFIX}{session_id}")
}
