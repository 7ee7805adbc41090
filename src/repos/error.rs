/*
 * Responsibility
 * - What the store layer tells the layers above it
 * - "not found" is never an error here: lookups return Option / row counts
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error")]
    Db(#[from] sqlx::Error),
    #[error("conflict")]
    Conflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out")]
    Timeout,
    #[error("invalid row: {0}")]
    InvalidRow(String),
}

impl RepoError {
    pub fn from_sqlx(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(dbe) = &e
            && dbe.code().as_deref() == Some("23505")
        {
            return RepoError::Conflict;
        }
        RepoError::Db(e)
    }

    /// Transport-level failures worth one retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepoError::Db(_) | RepoError::Unavailable(_) | RepoError::Timeout
        )
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
