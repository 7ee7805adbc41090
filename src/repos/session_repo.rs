use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{NewSession, Session, SessionStatus};
use crate::repos::error::{RepoError, RepoResult};

/// DB access for auth sessions.
///
/// Notes:
/// - Only a hash of the current refresh token is stored.
/// - Revocation flips `status` to `revoked`; rows are removed only by the cleanup sweep.
#[derive(Clone, Debug)]
pub struct SessionRepo {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    session_id: String,
    user_id: Uuid,
    tenant_id: Uuid,
    refresh_token_hash: Vec<u8>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    status: String,
    revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRow> for Session {
    type Error = RepoError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = SessionStatus::parse(&row.status).ok_or_else(|| {
            RepoError::InvalidRow(format!("auth_sessions.status = {}", row.status))
        })?;

        Ok(Session {
            id: row.id,
            session_id: row.session_id,
            user_id: row.user_id,
            tenant_id: row.tenant_id,
            refresh_token_hash: row.refresh_token_hash,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            last_activity_at: row.last_activity_at,
            status,
            revoked_at: row.revoked_at,
        })
    }
}

impl SessionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewSession) -> RepoResult<Session> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO auth_sessions (
                session_id, user_id, tenant_id, refresh_token_hash,
                issued_at, expires_at, last_activity_at, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $5, 'active')
            RETURNING
                id, session_id, user_id, tenant_id, refresh_token_hash,
                issued_at, expires_at, last_activity_at, status, revoked_at
            "#,
        )
        .bind(&new.session_id)
        .bind(new.user_id)
        .bind(new.tenant_id)
        .bind(&new.refresh_token_hash)
        .bind(new.issued_at)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Session::try_from(row)
    }

    pub async fn find_by_session_id(&self, session_id: &str) -> RepoResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT
                id, session_id, user_id, tenant_id, refresh_token_hash,
                issued_at, expires_at, last_activity_at, status, revoked_at
            FROM auth_sessions
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        row.map(Session::try_from).transpose()
    }

    pub async fn find_by_user(&self, user_id: Uuid, active_only: bool) -> RepoResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT
                id, session_id, user_id, tenant_id, refresh_token_hash,
                issued_at, expires_at, last_activity_at, status, revoked_at
            FROM auth_sessions
            WHERE user_id = $1
                AND ($2 = false OR status = 'active')
            ORDER BY issued_at DESC
            "#,
        )
        .bind(user_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        rows.into_iter().map(Session::try_from).collect()
    }

    // Update last_activity_at. Caller decides what now is.
    pub async fn touch_last_activity(&self, session_id: &str, now: DateTime<Utc>) -> RepoResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET last_activity_at = $2
            WHERE session_id = $1 AND status = 'active'
            "#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(res.rows_affected() > 0)
    }

    /// Single conditional UPDATE: the hash is swapped only if it still matches.
    pub async fn rotate_refresh_token_hash(
        &self,
        session_id: &str,
        expected_hash: &[u8],
        new_hash: &[u8],
        now: DateTime<Utc>,
    ) -> RepoResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET refresh_token_hash = $3,
                last_activity_at = $4
            WHERE session_id = $1
                AND refresh_token_hash = $2
                AND status = 'active'
                AND expires_at > $4
            "#,
        )
        .bind(session_id)
        .bind(expected_hash)
        .bind(new_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(res.rows_affected() == 1)
    }

    pub async fn revoke(&self, session_id: &str, revoked_at: DateTime<Utc>) -> RepoResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE auth_sessions
            SET status = 'revoked',
                revoked_at = $2
            WHERE session_id = $1 AND status = 'active'
            "#,
        )
        .bind(session_id)
        .bind(revoked_at)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(res.rows_affected() > 0)
    }

    pub async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        revoked_at: DateTime<Utc>,
    ) -> RepoResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE auth_sessions
            SET status = 'revoked',
                revoked_at = $2
            WHERE user_id = $1 AND status = 'active'
            RETURNING session_id
            "#,
        )
        .bind(user_id)
        .bind(revoked_at)
        .fetch_all(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(ids)
    }

    pub async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        inactive_before: DateTime<Utc>,
    ) -> RepoResult<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM auth_sessions
            WHERE expires_at <= $1
                OR (status <> 'active' AND last_activity_at < $2)
            "#,
        )
        .bind(now)
        .bind(inactive_before)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(res.rows_affected())
    }
}
