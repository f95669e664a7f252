use super::models::{NewUser, User};
use crate::{
    store::{bounded, is_unique_violation, StoreError},
    tokens::models::Scope,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info_span, Instrument};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert an unactivated user at version 1.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;

    /// Resolve the owner of a live token with the given digest and scope.
    async fn get_for_token(
        &self,
        scope: Scope,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<User, StoreError>;

    /// Write `user` if the stored version still equals `user.version`.
    /// Returns the new version.
    async fn update(&self, user: &User) -> Result<i32, StoreError>;
}

#[derive(Clone, Debug)]
pub struct PgUserRepo {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgUserRepo {
    #[must_use]
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        let query = "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        bounded(
            self.query_timeout,
            sqlx::query_scalar::<_, bool>(query)
                .bind(id)
                .fetch_one(&self.pool)
                .instrument(span),
        )
        .await
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let query = r"
            INSERT INTO users (name, email, password_hash, activated)
            VALUES ($1, $2, $3, FALSE)
            RETURNING id, created_at, name, email, password_hash, activated, version
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = bounded(
            self.query_timeout,
            sqlx::query_as::<_, User>(query)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .fetch_one(&self.pool)
                .instrument(span),
        )
        .await;

        match result {
            Err(StoreError::Database(err)) if is_unique_violation(&err) => {
                Err(StoreError::DuplicateEmail)
            }
            other => other,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let query = r"
            SELECT id, created_at, name, email, password_hash, activated, version
            FROM users
            WHERE email = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        bounded(
            self.query_timeout,
            sqlx::query_as::<_, User>(query)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(span),
        )
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn get_for_token(
        &self,
        scope: Scope,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let query = r"
            SELECT users.id, users.created_at, users.name, users.email,
                   users.password_hash, users.activated, users.version
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
              AND tokens.scope = $2
              AND tokens.expiry > $3
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        bounded(
            self.query_timeout,
            sqlx::query_as::<_, User>(query)
                .bind(token_hash)
                .bind(scope.as_str())
                .bind(now)
                .fetch_optional(&self.pool)
                .instrument(span),
        )
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<i32, StoreError> {
        let query = r"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = bounded(
            self.query_timeout,
            sqlx::query_scalar::<_, i32>(query)
                .bind(&user.name)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(user.activated)
                .bind(user.id)
                .bind(user.version)
                .fetch_optional(&self.pool)
                .instrument(span),
        )
        .await;

        match result {
            Ok(Some(version)) => Ok(version),
            // No row matched: either the user is gone or someone else bumped the version.
            Ok(None) => {
                if self.exists(user.id).await? {
                    Err(StoreError::EditConflict)
                } else {
                    Err(StoreError::NotFound)
                }
            }
            Err(StoreError::Database(err)) if is_unique_violation(&err) => {
                Err(StoreError::DuplicateEmail)
            }
            Err(err) => Err(err),
        }
    }
}
