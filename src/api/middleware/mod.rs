pub mod authenticate;
pub mod rate_limit;

pub use authenticate::{authenticate, require_activated_user, Identity};
pub use rate_limit::{rate_limit, LimiterConfig, RateLimiter};
