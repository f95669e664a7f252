use super::{
    crypto,
    models::{IssuedToken, Scope, Token},
    repo::TokenRepo,
};
use crate::store::StoreError;
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(transparent)]
    Generate(#[from] anyhow::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues and revokes scoped tokens. Validation happens through
/// [`crate::users::service::CredentialStore::get_for_token`].
#[derive(Clone)]
pub struct TokenService {
    repo: Arc<dyn TokenRepo>,
}

impl TokenService {
    #[must_use]
    pub fn new(repo: Arc<dyn TokenRepo>) -> Self {
        Self { repo }
    }

    /// Build a plaintext and its storable record without touching storage.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> anyhow::Result<IssuedToken> {
        let plaintext = crypto::generate_plaintext()?;
        let token = Token {
            hash: crypto::digest(&plaintext),
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        };
        Ok(IssuedToken { plaintext, token })
    }

    /// Replace every `(user_id, scope)` token with a fresh one.
    ///
    /// # Errors
    /// Returns an error if generation or storage fails.
    pub async fn new_for_user(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: Scope,
    ) -> Result<IssuedToken, TokenError> {
        let issued = Self::generate(user_id, ttl, scope)?;
        self.repo.replace_for_user(&issued.token).await?;
        debug!(user_id, scope = %scope, expiry = %issued.token.expiry, "token issued");
        Ok(issued)
    }

    /// # Errors
    /// Returns an error if storage fails.
    pub async fn delete_all_for_user(&self, scope: Scope, user_id: i64) -> Result<(), StoreError> {
        self.repo.delete_all_for_user(scope, user_id).await
    }

    /// Drop tokens that can no longer validate.
    ///
    /// # Errors
    /// Returns an error if storage fails.
    pub async fn delete_expired(&self) -> Result<u64, StoreError> {
        self.repo.delete_expired(Utc::now()).await
    }

    /// Reap expired tokens every `interval` until the handle is aborted.
    #[must_use]
    pub fn spawn_reaper(&self, interval: std::time::Duration) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match service.delete_expired().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "reaped expired tokens"),
                    Err(err) => error!("failed to reap expired tokens: {err}"),
                }
            }
        })
    }
}
