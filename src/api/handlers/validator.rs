//! Field-keyed input validation shared by the account handlers.

use crate::tokens::crypto::TOKEN_LENGTH;
use regex::Regex;
use std::{collections::BTreeMap, sync::OnceLock};

pub const NAME_MAX_BYTES: usize = 500;
pub const PASSWORD_MIN_BYTES: usize = 8;
pub const PASSWORD_MAX_BYTES: usize = 72;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";

/// Field name to message. Ordered so responses are stable.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` for `key` unless the field already has an error.
    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    #[must_use]
    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    email_regex().is_some_and(|regex| regex.is_match(email))
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(valid_email(email), "email", "must be a valid email address");
}

pub fn validate_password(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= PASSWORD_MIN_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= PASSWORD_MAX_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

pub fn validate_user(v: &mut Validator, name: &str, email: &str, password: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= NAME_MAX_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
    validate_email(v, email);
    validate_password(v, password);
}

pub fn validate_token_plaintext(v: &mut Validator, token: &str) {
    v.check(!token.is_empty(), "token", "must be provided");
    v.check(
        token.len() == TOKEN_LENGTH,
        "token",
        "must be 26 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_for(f: impl FnOnce(&mut Validator)) -> FieldErrors {
        let mut v = Validator::new();
        f(&mut v);
        v.into_errors()
    }

    #[test]
    fn valid_user_has_no_errors() {
        let errors = errors_for(|v| validate_user(v, "Bob", "bob@example.com", "validPa$$word"));
        assert!(errors.is_empty());
    }

    #[test]
    fn first_error_per_field_wins() {
        let errors = errors_for(|v| validate_user(v, "", "", ""));
        assert_eq!(errors.get("name").map(String::as_str), Some("must be provided"));
        assert_eq!(errors.get("email").map(String::as_str), Some("must be provided"));
        assert_eq!(errors.get("password").map(String::as_str), Some("must be provided"));
    }

    #[test]
    fn length_bounds() {
        let long_name = "a".repeat(NAME_MAX_BYTES + 1);
        let long_password = "p".repeat(PASSWORD_MAX_BYTES + 1);
        let errors = errors_for(|v| validate_user(v, &long_name, "bob@example.com", &long_password));
        assert_eq!(
            errors.get("name").map(String::as_str),
            Some("must not be more than 500 bytes long")
        );
        assert_eq!(
            errors.get("password").map(String::as_str),
            Some("must not be more than 72 bytes long")
        );

        let errors = errors_for(|v| validate_password(v, "short"));
        assert_eq!(
            errors.get("password").map(String::as_str),
            Some("must be at least 8 bytes long")
        );
    }

    #[test]
    fn email_format() {
        assert!(valid_email("bob@example.com"));
        assert!(valid_email("first.last+tag@sub.example.co"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("spaces in@example.com"));
    }

    #[test]
    fn token_length() {
        let errors = errors_for(|v| validate_token_plaintext(v, "ABC"));
        assert_eq!(
            errors.get("token").map(String::as_str),
            Some("must be 26 bytes long")
        );
        let errors = errors_for(|v| validate_token_plaintext(v, "XXXXXXXXXXXXXXXXXXXXXXXXXX"));
        assert!(errors.is_empty());
    }
}
