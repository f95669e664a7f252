//! # relohelper
//!
//! Account security for the relohelper relocation API: registration with
//! email activation, bearer-token authentication and per-client rate limiting.
//!
//! ## Flow
//!
//! 1. `POST /v1/users` stores an unactivated user (bcrypt hash) and mails a
//!    one-time activation token from a background task.
//! 2. `PUT /v1/users/activated` consumes that token and flips `activated`,
//!    using an optimistic version check so concurrent writes cannot clobber
//!    each other.
//! 3. `POST /v1/tokens/authentication` trades email and password for a bearer
//!    token. Unknown emails and wrong passwords get the same answer.
//! 4. Every request first passes a token-bucket limiter keyed by client IP,
//!    then the authenticator, which resolves `Authorization: Bearer` into an
//!    identity. Protected routes additionally require an activated account.
//!
//! ## Tokens
//!
//! Plaintext tokens are 26 base32 characters drawn from the OS RNG. Only their
//! SHA-256 digest is stored, so the tokens table is a list of capabilities and
//! not a vault of secrets. Issuing a token replaces every token of the same
//! scope for that user.
//!
//! ## Storage
//!
//! Postgres (`sql/schema.sql`) in production, or a process-local store with
//! `--storage memory` for development and tests. Every query is bounded by
//! `--db-query-timeout`.

pub mod api;
pub mod cli;
pub mod store;
pub mod tokens;
pub mod users;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
