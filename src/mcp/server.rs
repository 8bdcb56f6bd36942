use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::mcp::protocol::{
    methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::state::AppState;
use crate::tools::{self, ToolContext};

pub const SERVER_NAME: &str = "SendGrid MCP Server";

pub const INSTRUCTIONS: &str = "\
SendGrid MCP Server provides email management capabilities through the SendGrid API.

Authentication:
- Uses a SendGrid API key
- Configured on the server through SENDGRID_API_KEY
- Or sent by the client as 'Authorization: Bearer YOUR-API-KEY'

Features:
1. Email: send HTML/text emails, send dynamic template emails, inspect templates
2. Contacts: add/update contacts, list contact lists

To send an email use send_email with recipient(s), subject and content; \
sender and content type are optional.";

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Parse one raw JSON-RPC message, producing the error response to send back on failure
pub fn parse_message(raw: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        JsonRpcResponse::error(None, JsonRpcError::parse_error(format!("Parse error: {}", e)))
    })?;

    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(
            None,
            JsonRpcError::invalid_request(format!("Invalid request: {}", e)),
        )
    })
}

/// Dispatch one request. Notifications yield `None`.
pub async fn handle_request(
    state: &AppState,
    ctx: &ToolContext,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    if request.is_notification() {
        tracing::debug!(method = %request.method, "Notification received");
        return None;
    }
    let id = request.id.clone();

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(JsonRpcResponse::error(
            id,
            JsonRpcError::invalid_request("jsonrpc must be \"2.0\""),
        ));
    }

    let outcome = match request.method.as_str() {
        methods::INITIALIZE => Ok(initialize_result()),
        methods::PING => Ok(json!({})),
        methods::TOOLS_LIST => Ok(json!({ "tools": tools::definitions() })),
        methods::TOOLS_CALL => call_tool(state, ctx, request.params).await,
        other => Err(AppError::MethodNotFound(other.to_string())),
    };

    Some(match outcome {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::error(id, e.to_rpc_error()),
    })
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "logging": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        },
        "instructions": INSTRUCTIONS
    })
}

/// Tool failures become `isError` results; only malformed calls become JSON-RPC errors.
async fn call_tool(
    state: &AppState,
    ctx: &ToolContext,
    params: Option<Value>,
) -> Result<Value, AppError> {
    let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| AppError::InvalidParams(format!("Invalid tools/call params: {}", e)))?;

    tracing::info!(tool = %params.name, "Tool call");

    match tools::call_tool(state, ctx, &params.name, params.arguments).await {
        Ok(value) => {
            let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            Ok(json!({
                "content": [{"type": "text", "text": text}],
                "structuredContent": value,
                "isError": false
            }))
        }
        Err(e @ AppError::Tool { .. }) => {
            tracing::warn!(tool = %params.name, error = %e, "Tool call failed");
            Ok(json!({
                "content": [{"type": "text", "text": e.to_string()}],
                "isError": true
            }))
        }
        Err(e) => Err(e),
    }
}
