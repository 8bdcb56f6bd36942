use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::error::Result;
use crate::mcp::protocol::methods;
use crate::mcp::{handle_request, parse_message};
use crate::state::AppState;
use crate::tools::ToolContext;

pub const SESSION_HEADER: &str = "mcp-session-id";

/// MCP routes
pub fn mcp_routes() -> Router<AppState> {
    Router::new().route("/mcp", post(mcp_endpoint))
}

/// POST /mcp - One JSON-RPC message per request.
///
/// A bearer token, when sent, becomes the SendGrid key for this call.
async fn mcp_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response> {
    let credential = state.verifier.authenticate(&headers)?;

    let request = match parse_message(&body) {
        Ok(request) => request,
        Err(response) => return Ok((StatusCode::BAD_REQUEST, Json(response)).into_response()),
    };

    let is_initialize = request.method == methods::INITIALIZE;
    tracing::debug!(
        method = %request.method,
        caller_key = credential.is_some(),
        "MCP request"
    );

    // plain request/response HTTP has no back-channel for progress notices
    let ctx = ToolContext::new(credential);

    let Some(response) = handle_request(&state, &ctx, request).await else {
        return Ok(StatusCode::ACCEPTED.into_response());
    };

    let mut http_response = Json(response).into_response();
    if is_initialize {
        let session_id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            http_response.headers_mut().insert(SESSION_HEADER, value);
        }
        tracing::info!(session_id = %session_id, "MCP session initialized");
    }

    Ok(http_response)
}
