/*
 * Responsibility
 * - users table access through SQLx
 * - deleted users are invisible to every lookup
 */
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{Role, User, UserStatus, UserUpdate};
use crate::repos::error::{RepoError, RepoResult};

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    tenant_id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    status: String,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepoError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let status = UserStatus::parse(&row.status)
            .ok_or_else(|| RepoError::InvalidRow(format!("users.status = {}", row.status)))?;

        Ok(User {
            id: row.id,
            tenant_id: row.tenant_id,
            email: row.email,
            password_hash: row.password_hash,
            role: Role::from(row.role),
            status,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone, Debug)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_tenant_email(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, tenant_id, email, password_hash, role, status, last_login_at, created_at
            FROM users
            WHERE tenant_id = $1
                AND email = $2
                AND status <> 'deleted'
            "#,
        )
        .bind(tenant_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        row.map(User::try_from).transpose()
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, tenant_id, email, password_hash, role, status, last_login_at, created_at
            FROM users
            WHERE id = $1
                AND status <> 'deleted'
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        row.map(User::try_from).transpose()
    }

    pub async fn update(&self, user_id: Uuid, update: &UserUpdate) -> RepoResult<bool> {
        // None -> keep the current value
        let result = sqlx::query(
            r#"
            UPDATE users
            SET
                password_hash = COALESCE($2, password_hash),
                last_login_at = COALESCE($3, last_login_at),
                updated_at = now()
            WHERE id = $1
                AND status <> 'deleted'
            "#,
        )
        .bind(user_id)
        .bind(update.password_hash.as_deref())
        .bind(update.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(RepoError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
