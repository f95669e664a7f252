//! Process-local store backing `--storage memory` and the test suite.
//!
//! One mutex guards users and tokens together so token replacement and the
//! version compare-and-swap are atomic, like their Postgres counterparts.

use super::StoreError;
use crate::{
    tokens::{
        models::{Scope, Token},
        repo::TokenRepo,
    },
    users::{
        models::{normalize_email, NewUser, User},
        repo::UserRepo,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    users: HashMap<i64, User>,
    // normalized email -> user id
    emails: HashMap<String, i64>,
    // digest -> token
    tokens: HashMap<Vec<u8>, Token>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token record as-is. Handy for seeding expired tokens.
    pub fn insert_token(&self, token: Token) {
        self.inner.lock().tokens.insert(token.hash.clone(), token);
    }

    #[must_use]
    pub fn token_count(&self, scope: Scope, user_id: i64) -> usize {
        self.inner
            .lock()
            .tokens
            .values()
            .filter(|token| token.scope == scope && token.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.lock();
        let key = normalize_email(&user.email);
        if inner.emails.contains_key(&key) {
            return Err(StoreError::DuplicateEmail);
        }

        inner.next_id += 1;
        let stored = User {
            id: inner.next_id,
            created_at: Utc::now(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            activated: false,
            version: 1,
        };
        inner.emails.insert(key, stored.id);
        inner.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let inner = self.inner.lock();
        inner
            .emails
            .get(&normalize_email(email))
            .and_then(|id| inner.users.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_for_token(
        &self,
        scope: Scope,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let inner = self.inner.lock();
        inner
            .tokens
            .get(token_hash)
            .filter(|token| token.is_live_at(scope, now))
            .and_then(|token| inner.users.get(&token.user_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, user: &User) -> Result<i32, StoreError> {
        let mut inner = self.inner.lock();
        let key = normalize_email(&user.email);

        let (stored_version, stored_email) = match inner.users.get(&user.id) {
            Some(stored) => (stored.version, normalize_email(&stored.email)),
            None => return Err(StoreError::NotFound),
        };
        if stored_version != user.version {
            return Err(StoreError::EditConflict);
        }
        if key != stored_email {
            if inner.emails.contains_key(&key) {
                return Err(StoreError::DuplicateEmail);
            }
            inner.emails.remove(&stored_email);
            inner.emails.insert(key, user.id);
        }

        let mut updated = user.clone();
        updated.version += 1;
        let version = updated.version;
        inner.users.insert(user.id, updated);
        Ok(version)
    }
}

#[async_trait]
impl TokenRepo for MemoryStore {
    async fn replace_for_user(&self, token: &Token) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner
            .tokens
            .retain(|_, t| !(t.scope == token.scope && t.user_id == token.user_id));
        inner.tokens.insert(token.hash.clone(), token.clone());
        Ok(())
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        self.inner
            .lock()
            .tokens
            .retain(|_, t| !(t.scope == scope && t.user_id == user_id));
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.tokens.len();
        inner.tokens.retain(|_, t| t.expiry > now);
        Ok(u64::try_from(before - inner.tokens.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Bob".to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
        }
    }

    fn token(user_id: i64, scope: Scope, hash: u8, expiry: DateTime<Utc>) -> Token {
        Token {
            hash: vec![hash; 32],
            user_id,
            expiry,
            scope,
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_rejects_duplicate_email() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let first = store.insert(new_user("bob@example.com")).await?;
        let second = store.insert(new_user("alice@example.com")).await?;
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.version, 1);
        assert!(!first.activated);

        let duplicate = store.insert(new_user("BOB@example.com")).await;
        assert!(matches!(duplicate, Err(StoreError::DuplicateEmail)));
        Ok(())
    }

    #[tokio::test]
    async fn get_by_email_is_case_insensitive() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let user = store.insert(new_user("bob@example.com")).await?;
        assert_eq!(store.get_by_email("Bob@Example.com").await?.id, user.id);
        assert!(matches!(
            store.get_by_email("nobody@example.com").await,
            Err(StoreError::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn stale_version_is_an_edit_conflict() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let user = store.insert(new_user("bob@example.com")).await?;

        let mut first = user.clone();
        first.activated = true;
        let mut second = user.clone();
        second.name = "Robert".to_string();

        assert_eq!(store.update(&first).await?, 2);
        assert!(matches!(
            store.update(&second).await,
            Err(StoreError::EditConflict)
        ));

        let mut ghost = user;
        ghost.id = 99;
        assert!(matches!(store.update(&ghost).await, Err(StoreError::NotFound)));
        Ok(())
    }

    #[tokio::test]
    async fn update_guards_email_uniqueness() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        store.insert(new_user("alice@example.com")).await?;
        let mut bob = store.insert(new_user("bob@example.com")).await?;
        bob.email = "alice@example.com".to_string();
        assert!(matches!(
            store.update(&bob).await,
            Err(StoreError::DuplicateEmail)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn token_lookup_checks_scope_and_expiry() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let user = store.insert(new_user("bob@example.com")).await?;
        let now = Utc::now();

        store.insert_token(token(user.id, Scope::Activation, 1, now + Duration::hours(1)));
        store.insert_token(token(user.id, Scope::Activation, 2, now - Duration::seconds(1)));

        assert_eq!(
            store.get_for_token(Scope::Activation, &[1; 32], now).await?.id,
            user.id
        );
        assert!(matches!(
            store.get_for_token(Scope::Authentication, &[1; 32], now).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.get_for_token(Scope::Activation, &[2; 32], now).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.get_for_token(Scope::Activation, &[3; 32], now).await,
            Err(StoreError::NotFound)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn replace_keeps_one_token_per_scope() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let expiry = Utc::now() + Duration::hours(1);

        store.replace_for_user(&token(1, Scope::Activation, 1, expiry)).await?;
        store.replace_for_user(&token(1, Scope::Authentication, 2, expiry)).await?;
        store.replace_for_user(&token(1, Scope::Activation, 3, expiry)).await?;

        assert_eq!(store.token_count(Scope::Activation, 1), 1);
        assert_eq!(store.token_count(Scope::Authentication, 1), 1);

        store.delete_all_for_user(Scope::Activation, 1).await?;
        assert_eq!(store.token_count(Scope::Activation, 1), 0);
        assert_eq!(store.token_count(Scope::Authentication, 1), 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_expired_reaps_only_dead_tokens() -> Result<(), StoreError> {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.insert_token(token(1, Scope::Activation, 1, now - Duration::minutes(1)));
        store.insert_token(token(2, Scope::Activation, 2, now + Duration::minutes(1)));

        assert_eq!(store.delete_expired(now).await?, 1);
        assert_eq!(store.token_count(Scope::Activation, 2), 1);
        Ok(())
    }
}
