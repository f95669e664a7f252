use super::models::{Scope, Token};
use crate::store::{bounded, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info_span, Instrument};

#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Delete every `(user_id, scope)` token and insert `token` in one unit.
    async fn replace_for_user(&self, token: &Token) -> Result<(), StoreError>;

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError>;

    /// Remove tokens whose expiry is not after `now`. Returns the number removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Clone, Debug)]
pub struct PgTokenRepo {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgTokenRepo {
    #[must_use]
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl TokenRepo for PgTokenRepo {
    async fn replace_for_user(&self, token: &Token) -> Result<(), StoreError> {
        bounded(self.query_timeout, async {
            let mut tx = self.pool.begin().await?;

            let query = "DELETE FROM tokens WHERE scope = $1 AND user_id = $2";
            sqlx::query(query)
                .bind(token.scope.as_str())
                .bind(token.user_id)
                .execute(&mut *tx)
                .instrument(info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "DELETE",
                    db.statement = query
                ))
                .await?;

            let query = "INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)";
            sqlx::query(query)
                .bind(&token.hash)
                .bind(token.user_id)
                .bind(token.expiry)
                .bind(token.scope.as_str())
                .execute(&mut *tx)
                .instrument(info_span!(
                    "db.query",
                    db.system = "postgresql",
                    db.operation = "INSERT",
                    db.statement = query
                ))
                .await?;

            tx.commit().await
        })
        .await
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        let query = "DELETE FROM tokens WHERE scope = $1 AND user_id = $2";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        bounded(
            self.query_timeout,
            sqlx::query(query)
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .instrument(span),
        )
        .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let query = "DELETE FROM tokens WHERE expiry <= $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = bounded(
            self.query_timeout,
            sqlx::query(query).bind(now).execute(&self.pool).instrument(span),
        )
        .await?;
        Ok(result.rows_affected())
    }
}
