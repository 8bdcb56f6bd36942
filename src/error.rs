use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::mcp::protocol::JsonRpcError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("SendGrid API error {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Failure raised by a tool handler, wrapping the underlying cause
    #[error("{context}: {source}")]
    Tool {
        context: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),
}

impl AppError {
    pub fn tool(context: impl Into<String>, source: AppError) -> Self {
        AppError::Tool {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Innermost error, skipping any handler wrappers
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Tool { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn to_rpc_error(&self) -> JsonRpcError {
        match self.root() {
            AppError::InvalidParams(_) | AppError::Validation(_) => {
                JsonRpcError::invalid_params(self.to_string())
            }
            AppError::MethodNotFound(_) => JsonRpcError::method_not_found(self.to_string()),
            _ => JsonRpcError::internal_error(self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.root() {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Provider { .. } | AppError::Network(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Network(format!("request timed out: {}", err))
        } else if let Some(status) = err.status() {
            AppError::Provider {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
