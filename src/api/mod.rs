pub mod health;
pub mod mcp;

use axum::Router;

use crate::state::AppState;

/// Create the HTTP router: the MCP endpoint plus health
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(mcp::mcp_routes())
        .merge(health::health_routes())
        .with_state(state)
}
