use std::sync::Arc;

use reqwest::Client;

use crate::auth::TokenVerifier;
use crate::config::Config;
use crate::sendgrid::RateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<TokenVerifier>,
    /// One limiter for the whole process, whichever key a call uses
    pub rate_limiter: Arc<RateLimiter>,
    pub http: Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            verifier: Arc::new(TokenVerifier::new(&config)),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit)),
            http: Client::new(),
            config: Arc::new(config),
        }
    }
}
