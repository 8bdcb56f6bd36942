//! MCP tools backed by the SendGrid API.
//!
//! Every handler follows the same shape: normalize arguments, build a
//! `SendGridClient` for the caller's credential, make exactly one SendGrid
//! call, and wrap any failure with the tool's own error message.

pub mod contact;
pub mod email;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::error::{AppError, Result};
use crate::state::AppState;

pub const SEND_EMAIL: &str = "send_email";
pub const SEND_TEMPLATE_EMAIL: &str = "send_template_email";
pub const GET_TEMPLATE_INFO: &str = "get_template_info";
pub const ADD_CONTACT: &str = "add_contact";
pub const GET_CONTACT_LISTS: &str = "get_contact_lists";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// Progress message a handler reports back to its caller
#[derive(Debug, Clone, PartialEq)]
pub struct LogNotice {
    pub level: LogLevel,
    pub message: String,
}

/// Back-channel to the caller for progress notices
#[derive(Clone)]
pub struct ProgressSink {
    sender: mpsc::UnboundedSender<LogNotice>,
}

impl ProgressSink {
    pub fn new(sender: mpsc::UnboundedSender<LogNotice>) -> Self {
        Self { sender }
    }

    pub fn send(&self, notice: LogNotice) -> std::result::Result<(), mpsc::error::SendError<LogNotice>> {
        self.sender.send(notice)
    }
}

/// Per-invocation context: the caller's credential and an optional progress channel
#[derive(Clone, Default)]
pub struct ToolContext {
    pub credential: Option<String>,
    pub progress: Option<ProgressSink>,
}

impl ToolContext {
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.notify(LogLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.notify(LogLevel::Error, message);
    }

    /// Wrap a handler failure and report it on the progress channel
    pub fn fail(&self, context: impl Into<String>, source: AppError) -> AppError {
        let err = AppError::tool(context, source);
        self.error(err.to_string());
        err
    }

    fn notify(&self, level: LogLevel, message: String) {
        if let Some(progress) = &self.progress {
            // receiver gone means the caller disconnected; nothing to report to
            let _ = progress.send(LogNotice { level, message });
        }
    }
}

/// Tool metadata advertised through `tools/list`
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEND_EMAIL,
            description: "Send an email with text or HTML content to one or more recipients",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to_emails": {"type": "string", "description": "Comma-separated recipient addresses"},
                    "subject": {"type": "string"},
                    "content": {"type": "string"},
                    "content_type": {"type": "string", "default": "text/html"},
                    "from_email": {"type": "string"},
                    "from_name": {"type": "string"},
                    "attachments": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "content": {"type": "string", "description": "Base64-encoded file content"},
                                "filename": {"type": "string"},
                                "type": {"type": "string"},
                                "disposition": {"type": "string"},
                                "content_id": {"type": "string"}
                            },
                            "required": ["content", "filename"]
                        }
                    }
                },
                "required": ["to_emails", "subject", "content"]
            }),
        },
        ToolDefinition {
            name: SEND_TEMPLATE_EMAIL,
            description: "Send an email using a SendGrid dynamic template with personalized data. \
                First use get_template_info to understand the template structure and its required \
                fields ({{name}}, etc), then fill in dynamic_template_data.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "to_emails": {"type": "string", "description": "Comma-separated recipient addresses"},
                    "dynamic_template_data": {"type": "object"},
                    "template_id": {"type": "string"},
                    "subject": {"type": "string"},
                    "from_email": {"type": "string"},
                    "from_name": {"type": "string"}
                },
                "required": ["to_emails", "dynamic_template_data"]
            }),
        },
        ToolDefinition {
            name: GET_TEMPLATE_INFO,
            description: "Get detailed information about a SendGrid template for AI analysis",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "template_id": {"type": "string"}
                }
            }),
        },
        ToolDefinition {
            name: ADD_CONTACT,
            description: "Add or update a contact in your SendGrid account with optional custom fields",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "email": {"type": "string"},
                    "first_name": {"type": "string"},
                    "last_name": {"type": "string"},
                    "custom_fields": {
                        "type": ["string", "object"],
                        "description": "JSON object (or JSON-encoded string) merged into the contact"
                    },
                    "list_ids": {"type": "string", "description": "Comma-separated list ids"}
                },
                "required": ["email"]
            }),
        },
        ToolDefinition {
            name: GET_CONTACT_LISTS,
            description: "Retrieve all contact lists from your SendGrid account",
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}

/// Dispatch a `tools/call` by name
pub async fn call_tool(
    state: &AppState,
    ctx: &ToolContext,
    name: &str,
    arguments: Value,
) -> Result<Value> {
    tracing::debug!(tool = %name, "Calling tool");

    match name {
        SEND_EMAIL => to_json(email::send_email(state, ctx, parse_args(arguments)?).await?),
        SEND_TEMPLATE_EMAIL => {
            to_json(email::send_template_email(state, ctx, parse_args(arguments)?).await?)
        }
        GET_TEMPLATE_INFO => email::get_template_info(state, ctx, parse_args(arguments)?).await,
        ADD_CONTACT => contact::add_contact(state, ctx, parse_args(arguments)?).await,
        GET_CONTACT_LISTS => contact::get_contact_lists(state, ctx).await,
        other => Err(AppError::InvalidParams(format!("Unknown tool: {}", other))),
    }
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| AppError::InvalidParams(format!("Invalid arguments: {}", e)))
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Split a comma-separated string, trimming entries and dropping empty ones
pub fn split_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
