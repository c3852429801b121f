mod error_handler;
pub mod identity;
mod rate_limit;

pub use error_handler::log_errors;
pub use identity::{Identity, IdentityResolver};
pub use rate_limit::{RateLimiter, rate_limit, with_rate_limit};
