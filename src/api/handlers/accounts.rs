//! Registration, activation and login orchestration.
//!
//! Ties the credential store, token service and mailer together. Handlers
//! stay thin: they decode JSON, call into [`Accounts`] and map the result.

use super::validator::{self, FieldErrors, Validator};
use crate::{
    api::{
        email::{human_duration, BackgroundTasks, Mailer, USER_WELCOME_TEMPLATE},
        errors::ApiError,
    },
    store::StoreError,
    tokens::{IssuedToken, Scope, TokenError, TokenService},
    users::{CredentialError, CredentialStore, User},
};
use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Activation tokens live for 3 days.
pub const DEFAULT_ACTIVATION_TOKEN_TTL_SECONDS: i64 = 3 * 24 * 60 * 60;
/// Authentication tokens live for 24 hours.
pub const DEFAULT_AUTHENTICATION_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

const DUPLICATE_EMAIL_MESSAGE: &str = "a user with this email address already exists";
const INVALID_ACTIVATION_TOKEN_MESSAGE: &str = "invalid or expired activation token";

#[derive(Clone, Copy, Debug)]
pub struct AuthConfig {
    activation_token_ttl_seconds: i64,
    authentication_token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            activation_token_ttl_seconds: DEFAULT_ACTIVATION_TOKEN_TTL_SECONDS,
            authentication_token_ttl_seconds: DEFAULT_AUTHENTICATION_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_activation_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.activation_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_authentication_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.authentication_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn activation_token_ttl(&self) -> Duration {
        Duration::seconds(self.activation_token_ttl_seconds)
    }

    #[must_use]
    pub fn authentication_token_ttl(&self) -> Duration {
        Duration::seconds(self.authentication_token_ttl_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("failed validation")]
    Validation(FieldErrors),
    #[error("edit conflict")]
    EditConflict,
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CredentialError> for AccountError {
    fn from(err: CredentialError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EditConflict => Self::EditConflict,
            other => Self::Internal(other.into()),
        }
    }
}

impl From<TokenError> for AccountError {
    fn from(err: TokenError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(errors) => Self::Validation(errors),
            AccountError::EditConflict => Self::EditConflict,
            AccountError::InvalidCredentials => Self::InvalidCredentials,
            AccountError::Internal(err) => Self::Internal(err),
        }
    }
}

fn single_field_error(key: &str, message: &str) -> AccountError {
    let mut v = Validator::new();
    v.add_error(key, message);
    AccountError::Validation(v.into_errors())
}

#[derive(Clone)]
pub struct Accounts {
    credentials: CredentialStore,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    tasks: BackgroundTasks,
    config: AuthConfig,
}

impl Accounts {
    #[must_use]
    pub fn new(
        credentials: CredentialStore,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        tasks: BackgroundTasks,
        config: AuthConfig,
    ) -> Self {
        Self {
            credentials,
            tokens,
            mailer,
            tasks,
            config,
        }
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Create an unactivated user and mail them an activation token.
    /// Mail goes out in the background; the caller never waits on it.
    ///
    /// # Errors
    /// Validation failures (including a taken email) or internal errors.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<User, AccountError> {
        let email = email.trim();
        let mut v = Validator::new();
        validator::validate_user(&mut v, name, email, password.expose_secret());
        if !v.valid() {
            return Err(AccountError::Validation(v.into_errors()));
        }

        let user = match self.credentials.create(name, email, password).await {
            Ok(user) => user,
            Err(CredentialError::Store(StoreError::DuplicateEmail)) => {
                return Err(single_field_error("email", DUPLICATE_EMAIL_MESSAGE));
            }
            Err(err) => return Err(err.into()),
        };

        let IssuedToken { plaintext, .. } = self
            .tokens
            .new_for_user(user.id, self.config.activation_token_ttl(), Scope::Activation)
            .await?;

        let mailer = Arc::clone(&self.mailer);
        let recipient = user.email.clone();
        let data = json!({
            "activationToken": plaintext,
            "activationTokenTTL": human_duration(self.config.activation_token_ttl()),
            "userID": user.id,
        });
        self.tasks.spawn("send_welcome_email", async move {
            mailer.send(&recipient, USER_WELCOME_TEMPLATE, &data).await
        });

        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Consume an activation token and flip the account to activated.
    ///
    /// # Errors
    /// A `token` field error for malformed, unknown, expired or used tokens;
    /// `EditConflict` if a concurrent write won.
    pub async fn activate(&self, token: &str) -> Result<User, AccountError> {
        let mut v = Validator::new();
        validator::validate_token_plaintext(&mut v, token);
        if !v.valid() {
            return Err(AccountError::Validation(v.into_errors()));
        }

        let mut user = match self
            .credentials
            .get_for_token(Scope::Activation, token)
            .await
        {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                return Err(single_field_error("token", INVALID_ACTIVATION_TOKEN_MESSAGE));
            }
            Err(err) => return Err(err.into()),
        };

        user.activated = true;
        self.credentials.update(&mut user).await?;
        self.tokens
            .delete_all_for_user(Scope::Activation, user.id)
            .await?;

        info!(user_id = user.id, "user activated");
        Ok(user)
    }

    /// Check credentials and issue an authentication token.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or wrong password alike.
    pub async fn create_authentication_token(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<IssuedToken, AccountError> {
        let email = email.trim();
        let mut v = Validator::new();
        validator::validate_email(&mut v, email);
        validator::validate_password(&mut v, password.expose_secret());
        if !v.valid() {
            return Err(AccountError::Validation(v.into_errors()));
        }

        let Some(user) = self.credentials.authenticate(email, password).await? else {
            debug!("authentication token refused");
            return Err(AccountError::InvalidCredentials);
        };

        let issued = self
            .tokens
            .new_for_user(
                user.id,
                self.config.authentication_token_ttl(),
                Scope::Authentication,
            )
            .await?;
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::mpsc;

    struct ChannelMailer {
        sent: mpsc::UnboundedSender<(String, String, Value)>,
    }

    #[async_trait]
    impl Mailer for ChannelMailer {
        async fn send(&self, recipient: &str, template: &str, data: &Value) -> Result<()> {
            self.sent
                .send((recipient.to_string(), template.to_string(), data.clone()))
                .map_err(|_| anyhow!("receiver dropped"))
        }
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _recipient: &str, _template: &str, _data: &Value) -> Result<()> {
            Err(anyhow!("smtp relay unreachable"))
        }
    }

    fn accounts_with(mailer: Arc<dyn Mailer>) -> Accounts {
        let memory = Arc::new(MemoryStore::new());
        Accounts::new(
            CredentialStore::new(memory.clone()).with_hash_cost(4),
            TokenService::new(memory),
            mailer,
            BackgroundTasks::new(),
            AuthConfig::new(),
        )
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    async fn register_bob(
        accounts: &Accounts,
        outbox: &mut mpsc::UnboundedReceiver<(String, String, Value)>,
    ) -> Result<(User, String)> {
        let user = accounts
            .register("Bob", "bob@example.com", &secret("validPa$$word"))
            .await?;
        let (recipient, template, data) = outbox
            .recv()
            .await
            .ok_or_else(|| anyhow!("no welcome email"))?;
        assert_eq!(recipient, "bob@example.com");
        assert_eq!(template, USER_WELCOME_TEMPLATE);
        assert_eq!(data["userID"], json!(user.id));
        let token = data["activationToken"]
            .as_str()
            .ok_or_else(|| anyhow!("token missing from email"))?
            .to_string();
        Ok((user, token))
    }

    #[tokio::test]
    async fn register_activate_and_log_in() -> Result<()> {
        let (tx, mut outbox) = mpsc::unbounded_channel();
        let accounts = accounts_with(Arc::new(ChannelMailer { sent: tx }));

        let (user, token) = register_bob(&accounts, &mut outbox).await?;
        assert!(!user.activated);

        let activated = accounts.activate(&token).await?;
        assert!(activated.activated);
        assert_eq!(activated.version, 2);

        let again = accounts.activate(&token).await;
        match again {
            Err(AccountError::Validation(errors)) => assert_eq!(
                errors.get("token").map(String::as_str),
                Some(INVALID_ACTIVATION_TOKEN_MESSAGE)
            ),
            other => return Err(anyhow!("unexpected reactivation result: {other:?}")),
        }

        let issued = accounts
            .create_authentication_token("bob@example.com", &secret("validPa$$word"))
            .await?;
        assert_eq!(issued.token.user_id, user.id);
        assert_eq!(issued.token.scope, Scope::Authentication);
        Ok(())
    }

    #[tokio::test]
    async fn welcome_email_states_configured_lifetime() -> Result<()> {
        let (tx, mut outbox) = mpsc::unbounded_channel();
        let memory = Arc::new(MemoryStore::new());
        let accounts = Accounts::new(
            CredentialStore::new(memory.clone()).with_hash_cost(4),
            TokenService::new(memory),
            Arc::new(ChannelMailer { sent: tx }),
            BackgroundTasks::new(),
            AuthConfig::new().with_activation_token_ttl_seconds(3600),
        );

        accounts
            .register("Ann", "ann@example.com", &secret("validPa$$word"))
            .await?;
        let (recipient, template, data) = outbox
            .recv()
            .await
            .ok_or_else(|| anyhow!("no welcome email"))?;
        assert_eq!(data["activationTokenTTL"], "1 hour");

        let message = crate::api::email::render(&recipient, &template, &data)?;
        assert!(message.plain_body.contains("it will expire in 1 hour."));
        assert!(!message.plain_body.contains("3 days"));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_credentials_do_not_reveal_which_part_failed() -> Result<()> {
        let (tx, mut outbox) = mpsc::unbounded_channel();
        let accounts = accounts_with(Arc::new(ChannelMailer { sent: tx }));
        register_bob(&accounts, &mut outbox).await?;

        let wrong_password = accounts
            .create_authentication_token("bob@example.com", &secret("wrongPa$$word"))
            .await;
        let unknown_email = accounts
            .create_authentication_token("alice@example.com", &secret("validPa$$word"))
            .await;
        assert!(matches!(wrong_password, Err(AccountError::InvalidCredentials)));
        assert!(matches!(unknown_email, Err(AccountError::InvalidCredentials)));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_is_a_field_error() -> Result<()> {
        let (tx, mut outbox) = mpsc::unbounded_channel();
        let accounts = accounts_with(Arc::new(ChannelMailer { sent: tx }));
        register_bob(&accounts, &mut outbox).await?;

        let again = accounts
            .register("Bobby", "Bob@Example.com", &secret("validPa$$word"))
            .await;
        match again {
            Err(AccountError::Validation(errors)) => assert_eq!(
                errors.get("email").map(String::as_str),
                Some(DUPLICATE_EMAIL_MESSAGE)
            ),
            other => return Err(anyhow!("unexpected duplicate result: {other:?}")),
        }
        Ok(())
    }

    #[tokio::test]
    async fn malformed_token_fails_format_check() {
        let accounts = accounts_with(Arc::new(FailingMailer));
        match accounts.activate("too-short").await {
            Err(AccountError::Validation(errors)) => assert_eq!(
                errors.get("token").map(String::as_str),
                Some("must be 26 bytes long")
            ),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mail_failure_does_not_fail_registration() -> Result<()> {
        let accounts = accounts_with(Arc::new(FailingMailer));
        let user = accounts
            .register("Bob", "bob@example.com", &secret("validPa$$word"))
            .await?;
        assert_eq!(user.email, "bob@example.com");
        assert!(
            accounts
                .tasks()
                .shutdown(std::time::Duration::from_secs(5))
                .await
        );
        Ok(())
    }

    #[tokio::test]
    async fn racing_activations_succeed_once() -> Result<()> {
        let (tx, mut outbox) = mpsc::unbounded_channel();
        let accounts = accounts_with(Arc::new(ChannelMailer { sent: tx }));
        let (_, token) = register_bob(&accounts, &mut outbox).await?;

        let first = tokio::spawn({
            let accounts = accounts.clone();
            let token = token.clone();
            async move { accounts.activate(&token).await }
        });
        let second = tokio::spawn({
            let accounts = accounts.clone();
            async move { accounts.activate(&token).await }
        });
        let outcomes = [first.await?, second.await?];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(AccountError::EditConflict | AccountError::Validation(_))
        )));
        Ok(())
    }
}
