use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::error::{AppError, Result};

/// SendGrid API keys look like `SG.<22 chars>.<43 chars>`
pub const API_KEY_PREFIX: &str = "SG.";
pub const API_KEY_LENGTH: usize = 69;

/// Bearer token gatekeeper.
///
/// Only the shape of the token is checked here; SendGrid itself decides
/// whether the key is actually valid when it is used.
#[derive(Clone)]
pub struct TokenVerifier {
    default_token: Option<String>,
}

impl TokenVerifier {
    pub fn new(config: &Config) -> Self {
        Self {
            default_token: config.sendgrid_api_key.clone(),
        }
    }

    /// Accepts well-formed SendGrid keys, or the configured default key even
    /// when it does not match the usual shape.
    pub fn verify(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }

        if token.starts_with(API_KEY_PREFIX) && token.chars().count() == API_KEY_LENGTH {
            return true;
        }

        match &self.default_token {
            Some(default) => default.as_bytes().ct_eq(token.as_bytes()).into(),
            None => false,
        }
    }

    pub fn default_token(&self) -> Option<&str> {
        self.default_token.as_deref()
    }

    /// Resolve the caller's bearer token from request headers.
    ///
    /// Returns `Ok(None)` when no Authorization header was sent and a default
    /// key can be used instead. A header that is not a Bearer credential is
    /// rejected rather than falling back to the default key.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<String>> {
        let sent = headers.contains_key(AUTHORIZATION);
        match headers.typed_get::<Authorization<Bearer>>() {
            Some(Authorization(bearer)) => {
                let token = bearer.token();
                if self.verify(token) {
                    Ok(Some(token.to_string()))
                } else {
                    Err(AppError::Unauthorized(
                        "Invalid SendGrid API key format".to_string(),
                    ))
                }
            }
            None if sent => Err(AppError::Unauthorized(
                "Authorization header must be a Bearer token".to_string(),
            )),
            None if self.default_token.is_some() => Ok(None),
            None => Err(AppError::Unauthorized(
                "No API key provided and no default API key configured".to_string(),
            )),
        }
    }
}
