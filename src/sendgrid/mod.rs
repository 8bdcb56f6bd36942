pub mod client;
pub mod rate_limit;

pub use client::{resolve_api_key, SendGridClient};
pub use rate_limit::RateLimiter;
