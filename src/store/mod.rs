//! Storage errors shared by the user and token repositories.
//!
//! Every Postgres call goes through [`bounded`] so a stalled connection turns
//! into [`StoreError::Timeout`] instead of holding the request open.

pub mod memory;

use std::{future::Future, time::Duration};
use thiserror::Error;

pub use memory::MemoryStore;

/// Default per-query bound, matching `--db-query-timeout`.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Run a query future with an upper time bound.
pub(crate) async fn bounded<T, F>(limit: Duration, query: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, query).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
