use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};

/// Purpose a token was issued for. Tokens never validate outside their scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "activation" => Ok(Self::Activation),
            "authentication" => Ok(Self::Authentication),
            other => Err(format!("unknown token scope: {other}")),
        }
    }
}

/// Persisted token record. Only the SHA-256 digest of the plaintext is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: Scope,
}

impl Token {
    #[must_use]
    pub fn is_live_at(&self, scope: Scope, now: DateTime<Utc>) -> bool {
        self.scope == scope && now < self.expiry
    }
}

/// A freshly issued token: the plaintext goes to the caller once, the record
/// goes to storage.
#[derive(Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub token: Token,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"***")
            .field("token", &self.token)
            .finish()
    }
}
