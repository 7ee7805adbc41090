use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewPasswordResetToken, PasswordResetToken};
use crate::repos::error::{RepoError, RepoResult};

/// DB access for password reset tokens.
///
/// Notes:
/// - Only sha256(token) is stored (bytea, unique).
/// - `used_at` is written once; a set `used_at` makes the token dead forever.
#[derive(Clone, Debug)]
pub struct ResetTokenRepo {
    pool: PgPool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ResetTokenRow {
    id: Uuid,
    token_hash: Vec<u8>,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ResetTokenRow> for PasswordResetToken {
    fn from(row: ResetTokenRow) -> Self {
        PasswordResetToken {
            id: row.id,
            token_hash: row.token_hash,
            user_id: row.user_id,
            expires_at: row.expires_at,
            used_at: row.used_at,
            created_at: row.created_at,
        }
    }
}

impl ResetTokenRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, new: NewPasswordResetToken) -> RepoResult<PasswordResetToken> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            r#"
            INSERT INTO password_reset_tokens (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING id, token_hash, user_id, expires_at, used_at, created_at
            "#,
        )
        .bind(&new.token_hash)
        .bind(new.user_id)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.into())
    }

    pub async fn find_by_hash(&self, token_hash: &[u8]) -> RepoResult<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, ResetTokenRow>(
            r#"
            SELECT id, token_hash, user_id, expires_at, used_at, created_at
            FROM password_reset_tokens
            WHERE token_hash = $1
            LIMIT 1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(row.map(Into::into))
    }

    pub async fn mark_used(&self, id: Uuid, now: DateTime<Utc>) -> RepoResult<bool> {
        let done = sqlx::query(
            r#"
            UPDATE password_reset_tokens
            SET used_at = $2
            WHERE id = $1
                AND used_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(done.rows_affected() == 1)
    }
}
