use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sendgrid_mcp::api;
use sendgrid_mcp::config::{Config, Transport};
use sendgrid_mcp::mcp::stdio;
use sendgrid_mcp::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (also reads .env)
    let config = Config::from_env()?;

    // Initialize logging; stdout is reserved for the protocol in stdio mode
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    tracing::info!("SendGrid MCP Server starting...");
    tracing::info!(rate_limit = config.rate_limit, "Rate limit (requests/second)");
    if config.sendgrid_api_key.is_some() {
        tracing::info!("Default API key configured from environment");
    } else {
        tracing::info!("No default API key - clients must provide their own");
    }

    let transport = config.transport;
    let addr = config.server_addr();
    let state = AppState::new(config);

    match transport {
        Transport::Stdio => {
            tracing::info!("Serving MCP over stdio");
            stdio::serve(state).await?;
        }
        Transport::Http => serve_http(state, &addr).await?,
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn serve_http(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = api::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Handle shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down...");
        },
    }
}
