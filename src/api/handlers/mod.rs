pub mod accounts;
pub mod health;
pub mod metrics;
pub mod tokens;
pub mod types;
pub mod users;
pub mod validator;
