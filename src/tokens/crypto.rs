//! Token plaintext generation and digesting.
//!
//! Plaintexts are 16 bytes from the OS RNG rendered as unpadded base32, which
//! is always 26 characters. Storage only ever sees the SHA-256 digest.

use anyhow::{Context, Result};
use data_encoding::BASE32_NOPAD;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Length in bytes of every valid token plaintext.
pub const TOKEN_LENGTH: usize = 26;

const TOKEN_ENTROPY_BYTES: usize = 16;

/// Draw a new token plaintext.
///
/// # Errors
/// Returns an error if the OS random source is unavailable.
pub fn generate_plaintext() -> Result<String> {
    let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(BASE32_NOPAD.encode(&bytes))
}

/// Digest used as the storage key.
#[must_use]
pub fn digest(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

/// Cheap format check done before any storage lookup.
#[must_use]
pub fn has_valid_length(plaintext: &str) -> bool {
    plaintext.len() == TOKEN_LENGTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_is_26_base32_chars() -> Result<()> {
        let token = generate_plaintext()?;
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c)));
        assert_eq!(BASE32_NOPAD.decode(token.as_bytes())?.len(), 16);
        Ok(())
    }

    #[test]
    fn plaintexts_are_unique() -> Result<()> {
        assert_ne!(generate_plaintext()?, generate_plaintext()?);
        Ok(())
    }

    #[test]
    fn digest_is_stable_sha256() {
        let first = digest("XXXXXXXXXXXXXXXXXXXXXXXXXX");
        assert_eq!(first.len(), 32);
        assert_eq!(first, digest("XXXXXXXXXXXXXXXXXXXXXXXXXX"));
        assert_ne!(first, digest("YYYYYYYYYYYYYYYYYYYYYYYYYY"));
    }

    #[test]
    fn length_check() {
        assert!(has_valid_length("XXXXXXXXXXXXXXXXXXXXXXXXXX"));
        assert!(!has_valid_length("XXXX"));
        assert!(!has_valid_length(""));
    }
}
