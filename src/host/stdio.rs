//! Stdin/stdout JSON bridge for the host command channel.
//!
//! Reads newline-delimited JSON `CommandEnvelope` messages from stdin,
//! dispatches them through the `HostCommandServer` router, and writes
//! `ResponseEnvelope` and `EventEnvelope` messages as newline-delimited
//! JSON to stdout.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::error::{AuraError, Result};
use crate::host::channel::{HostCommandClient, HostCommandHandler, command_channel_with_events};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

/// Default request channel capacity for the stdio bridge.
const REQUEST_CAPACITY: usize = 64;

/// Default event broadcast channel capacity.
pub const EVENT_CAPACITY: usize = 256;

/// After the reader stops, keep forwarding events until none has arrived
/// for this long.
const EVENT_FLUSH_IDLE: Duration = Duration::from_millis(250);

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;

/// Run the bridge on the process's stdin/stdout.
///
/// # Errors
///
/// Returns an error if stdin or stdout fails.
pub async fn run_stdio_bridge<H: HostCommandHandler>(
    handler: H,
    event_tx: broadcast::Sender<EventEnvelope>,
    shutdown: CancellationToken,
) -> Result<()> {
    run_bridge(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        handler,
        event_tx,
        shutdown,
    )
    .await
}

/// Run the bridge until the input closes, a `runtime.stop` command is
/// handled, or `shutdown` fires.
///
/// Three tasks run concurrently: the reader (this task) dispatching
/// commands and writing responses, an event forwarder writing broadcast
/// events, and the command-router server.
///
/// # Errors
///
/// Returns an error if reading the input or writing the output fails.
pub async fn run_bridge<R, W, H>(
    reader: R,
    writer: W,
    handler: H,
    event_tx: broadcast::Sender<EventEnvelope>,
    shutdown: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    H: HostCommandHandler,
{
    let (client, server) = command_channel_with_events(REQUEST_CAPACITY, event_tx, handler);
    let writer = Arc::new(Mutex::new(BufWriter::new(writer)));

    let server_handle = tokio::spawn(async move {
        server.run().await;
    });

    let stop_events = CancellationToken::new();
    let event_handle = tokio::spawn(forward_events(
        client.subscribe_events(),
        Arc::clone(&writer),
        stop_events.clone(),
    ));

    let reader_result = run_reader(reader, client, Arc::clone(&writer), &shutdown).await;

    let _ = server_handle.await;
    stop_events.cancel();
    let _ = event_handle.await;

    reader_result
}

/// Write broadcast events until `stop` fires, then drain whatever is still
/// arriving (the UI pump's final drain) before returning.
async fn forward_events<W: AsyncWrite + Unpin>(
    mut event_rx: broadcast::Receiver<EventEnvelope>,
    writer: SharedWriter<W>,
    stop: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            () = stop.cancelled() => break,
            received = event_rx.recv() => received,
        };
        if !forward_event(&writer, received).await {
            return;
        }
    }

    while let Ok(received) = tokio::time::timeout(EVENT_FLUSH_IDLE, event_rx.recv()).await {
        if !forward_event(&writer, received).await {
            return;
        }
    }
    tracing::debug!("event forwarder stopped");
}

/// Returns `false` when forwarding should stop.
async fn forward_event<W: AsyncWrite + Unpin>(
    writer: &SharedWriter<W>,
    received: std::result::Result<EventEnvelope, broadcast::error::RecvError>,
) -> bool {
    match received {
        Ok(event_envelope) => match serde_json::to_string(&event_envelope) {
            Ok(json) => {
                if let Err(e) = write_line(writer, &json).await {
                    tracing::warn!(
                        error = %e,
                        "failed to write event envelope; stopping event forwarder"
                    );
                    return false;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize event envelope; skipping");
            }
        },
        Err(broadcast::error::RecvError::Lagged(n)) => {
            tracing::warn!(lagged = n, "event forwarder lagged; some events were dropped");
        }
        Err(broadcast::error::RecvError::Closed) => {
            tracing::info!("event broadcast channel closed; stopping event forwarder");
            return false;
        }
    }
    true
}

/// Read line-by-line, dispatch each command, and write responses.
async fn run_reader<R, W>(
    mut reader: R,
    client: HostCommandClient,
    writer: SharedWriter<W>,
    shutdown: &CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        // Only an idle read is abandoned on shutdown; a command in flight
        // still gets its response.
        let bytes_read = tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("assistant shut down; closing host bridge");
                break;
            }
            read = reader.read_line(&mut line) => {
                read.map_err(|e| AuraError::Channel(format!("failed to read from stdin: {e}")))?
            }
        };

        if bytes_read == 0 {
            tracing::info!("stdin closed (EOF); shutting down host bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse command envelope");
                let response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                write_response(&writer, &response).await?;
                continue;
            }
        };

        let request_id = envelope.request_id.clone();
        let is_stop = envelope.command == CommandName::RuntimeStop;

        let response = match client.send(envelope).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, request_id = %request_id, "host command failed");
                ResponseEnvelope::error(request_id, e.to_string())
            }
        };
        write_response(&writer, &response).await?;

        if is_stop && response.ok {
            tracing::info!("runtime.stop received; shutting down host bridge");
            break;
        }
    }

    Ok(())
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &SharedWriter<W>,
    response: &ResponseEnvelope,
) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| AuraError::Host(format!("failed to serialize response envelope: {e}")))?;
    write_line(writer, &json).await
}

/// Write a single JSON line and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &SharedWriter<W>, json: &str) -> Result<()> {
    let mut w = writer.lock().await;
    w.write_all(json.as_bytes())
        .await
        .map_err(|e| AuraError::Channel(format!("failed to write to stdout: {e}")))?;
    w.write_all(b"\n")
        .await
        .map_err(|e| AuraError::Channel(format!("failed to write newline to stdout: {e}")))?;
    w.flush()
        .await
        .map_err(|e| AuraError::Channel(format!("failed to flush stdout: {e}")))?;
    Ok(())
}
