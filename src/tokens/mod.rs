//! Scoped, hashed, expiring single-use tokens.

pub mod crypto;
pub mod models;
pub mod repo;
pub mod service;

pub use models::{IssuedToken, Scope, Token};
pub use service::{TokenError, TokenService};
