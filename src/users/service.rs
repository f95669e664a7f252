use super::{
    models::{normalize_email, NewUser, User},
    password::{self, PasswordError, HASH_COST},
    repo::UserRepo,
};
use crate::{
    store::StoreError,
    tokens::{crypto, models::Scope},
};
use chrono::Utc;
use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Account persistence plus password handling.
#[derive(Clone)]
pub struct CredentialStore {
    repo: Arc<dyn UserRepo>,
    hash_cost: u32,
    // Hash compared against when the email is unknown, so timing matches a real verify.
    dummy_hash: Arc<OnceCell<String>>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(repo: Arc<dyn UserRepo>) -> Self {
        Self {
            repo,
            hash_cost: HASH_COST,
            dummy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// Override the bcrypt cost. Only tests should go below [`HASH_COST`].
    #[must_use]
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Hash the password and persist a new, unactivated user.
    ///
    /// # Errors
    /// `StoreError::DuplicateEmail` when the address is taken, or hashing/storage failures.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        plaintext: &SecretString,
    ) -> Result<User, CredentialError> {
        let password_hash = password::hash(plaintext, self.hash_cost).await?;
        let user = self
            .repo
            .insert(NewUser {
                name: name.to_string(),
                email: normalize_email(email),
                password_hash,
            })
            .await?;
        debug!(user_id = user.id, "user created");
        Ok(user)
    }

    /// # Errors
    /// `StoreError::NotFound` when no user has this email.
    pub async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.repo.get_by_email(&normalize_email(email)).await
    }

    /// Resolve the owner of a live token. Wrong-length plaintexts never reach storage.
    ///
    /// # Errors
    /// `StoreError::NotFound` for unknown, expired, wrong-scope or malformed tokens.
    pub async fn get_for_token(&self, scope: Scope, plaintext: &str) -> Result<User, StoreError> {
        if !crypto::has_valid_length(plaintext) {
            return Err(StoreError::NotFound);
        }
        let hash = crypto::digest(plaintext);
        self.repo.get_for_token(scope, &hash, Utc::now()).await
    }

    /// Persist `user` with an optimistic version check; bumps `user.version` on success.
    ///
    /// # Errors
    /// `StoreError::EditConflict` when the stored version moved on.
    pub async fn update(&self, user: &mut User) -> Result<(), StoreError> {
        user.version = self.repo.update(user).await?;
        Ok(())
    }

    /// Look up a user and check their password. `None` covers both an unknown
    /// email and a wrong password.
    ///
    /// # Errors
    /// Storage or hashing failures.
    pub async fn authenticate(
        &self,
        email: &str,
        plaintext: &SecretString,
    ) -> Result<Option<User>, CredentialError> {
        match self.get_by_email(email).await {
            Ok(user) => {
                if password::matches(plaintext, &user.password_hash).await? {
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            Err(StoreError::NotFound) => {
                let dummy = self
                    .dummy_hash
                    .get_or_try_init(|| async {
                        password::hash(
                            &SecretString::from("relohelper-dummy-password".to_string()),
                            self.hash_cost,
                        )
                        .await
                    })
                    .await?;
                password::matches(plaintext, dummy).await?;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
