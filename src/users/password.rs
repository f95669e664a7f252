//! bcrypt hashing, run on the blocking pool so request workers stay free.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Work factor used for every stored hash.
pub const HASH_COST: u32 = 12;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("password hashing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Hash a plaintext password with a fresh salt.
///
/// # Errors
/// Returns an error if bcrypt fails or the blocking task is cancelled.
pub async fn hash(plaintext: &SecretString, cost: u32) -> Result<String, PasswordError> {
    let plaintext = SecretString::from(plaintext.expose_secret().to_owned());
    let hashed =
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext.expose_secret(), cost)).await??;
    Ok(hashed)
}

/// Compare a plaintext password against a stored bcrypt hash.
///
/// # Errors
/// Returns an error if the stored hash is malformed or the blocking task is cancelled.
pub async fn matches(plaintext: &SecretString, hashed: &str) -> Result<bool, PasswordError> {
    let plaintext = SecretString::from(plaintext.expose_secret().to_owned());
    let hashed = hashed.to_owned();
    let matched =
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext.expose_secret(), &hashed))
            .await??;
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn hash_is_salted_and_verifies() -> Result<(), PasswordError> {
        let password = SecretString::from("validPa$$word".to_string());
        let first = hash(&password, TEST_COST).await?;
        let second = hash(&password, TEST_COST).await?;

        assert_ne!(first, "validPa$$word");
        assert_ne!(first, second);
        assert!(matches(&password, &first).await?);
        assert!(matches(&password, &second).await?);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_does_not_match() -> Result<(), PasswordError> {
        let hashed = hash(&SecretString::from("validPa$$word".to_string()), TEST_COST).await?;
        let wrong = SecretString::from("wrongPa$$word".to_string());
        assert!(!matches(&wrong, &hashed).await?);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let password = SecretString::from("validPa$$word".to_string());
        assert!(matches(&password, "not-a-bcrypt-hash").await.is_err());
    }
}
