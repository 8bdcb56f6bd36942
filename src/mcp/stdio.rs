//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Each request runs in its own task. A single writer task owns the output
//! stream, so responses and progress notifications never interleave mid-line.

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::mcp::protocol::{methods, JsonRpcNotification, OutboundMessage};
use crate::mcp::server::{handle_request, parse_message};
use crate::state::AppState;
use crate::tools::{LogNotice, ProgressSink, ToolContext};

const LOGGER_NAME: &str = "sendgrid";

pub async fn serve(state: AppState) -> std::io::Result<()> {
    serve_io(state, tokio::io::stdin(), tokio::io::stdout()).await
}

pub async fn serve_io<R, W>(state: AppState, reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let writer_task = tokio::spawn(write_messages(writer, out_rx));

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request = match parse_message(&line) {
            Ok(request) => request,
            Err(response) => {
                tracing::warn!("Rejected malformed message on stdin");
                let _ = out_tx.send(OutboundMessage::Response(response));
                continue;
            }
        };

        let state = state.clone();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            let (notice_tx, notice_rx) = mpsc::unbounded_channel();
            let forwarder = tokio::spawn(forward_notices(notice_rx, out_tx.clone()));

            // stdio has no Authorization header: always the server's default key
            let ctx = ToolContext::new(None).with_progress(ProgressSink::new(notice_tx));
            let response = handle_request(&state, &ctx, request).await;

            // flush this request's notices before its response
            drop(ctx);
            let _ = forwarder.await;

            if let Some(response) = response {
                let _ = out_tx.send(OutboundMessage::Response(response));
            }
        });
    }

    tracing::info!("stdin closed, shutting down");
    drop(out_tx);
    writer_task
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
}

async fn forward_notices(
    mut notices: mpsc::UnboundedReceiver<LogNotice>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
) {
    while let Some(notice) = notices.recv().await {
        let notification = JsonRpcNotification::new(
            methods::LOG_MESSAGE,
            json!({
                "level": notice.level,
                "logger": LOGGER_NAME,
                "data": notice.message
            }),
        );
        if out_tx.send(OutboundMessage::Notification(notification)).is_err() {
            break;
        }
    }
}

async fn write_messages<W>(
    mut writer: W,
    mut messages: mpsc::UnboundedReceiver<OutboundMessage>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = messages.recv().await {
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
