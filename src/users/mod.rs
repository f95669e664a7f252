//! Credential store: accounts, password hashes and the activation flag.

pub mod models;
pub mod password;
pub mod repo;
pub mod service;

pub use models::{User, UserResponse};
pub use service::{CredentialError, CredentialStore};
