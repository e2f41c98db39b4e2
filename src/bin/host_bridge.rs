//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Reads `CommandEnvelope` messages as newline-delimited JSON from stdin,
//! dispatches them to the assistant, and writes `ResponseEnvelope` and
//! `EventEnvelope` messages to stdout.
//!
//! All tracing output goes to stderr and the log file so that stdout
//! remains a clean JSON protocol channel.

use aura::host::stdio::EVENT_CAPACITY;
use aura::host::{AssistantHostHandler, HostEventPresenter, run_stdio_bridge};
use aura::logging::{self, ConsoleLog};
use aura::ui::{DEFAULT_TICK, run_ui_pump};
use aura::{Assistant, AssistantParts, ConfigStore, aura_dirs, ui_channel};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast;

/// AURA host bridge: JSON commands on stdin, responses and events on stdout.
#[derive(Parser)]
#[command(name = "aura-host", version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the spoken greeting on start.
    #[arg(long)]
    no_greeting: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(&aura_dirs::logs_dir(), ConsoleLog::Stderr)?;
    tracing::info!("aura-host starting");

    let store = ConfigStore::load(args.config.unwrap_or_else(aura_dirs::config_file));
    let (ui, receiver) = ui_channel();
    let parts = AssistantParts::system(store.data(), &ui);
    let assistant = Assistant::new(store, ui, parts)?;
    let shutdown = assistant.shutdown_token();

    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let pump = tokio::spawn(run_ui_pump(
        receiver,
        HostEventPresenter::new(event_tx.clone()),
        DEFAULT_TICK,
        shutdown.clone(),
    ));

    if !args.no_greeting {
        assistant.greet();
    }

    let result = run_stdio_bridge(
        AssistantHostHandler::new(assistant.clone()),
        event_tx,
        shutdown,
    )
    .await;

    assistant.close();
    let _ = pump.await;

    result.map_err(|e| {
        tracing::error!(error = %e, "aura-host exited with error");
        anyhow::anyhow!("aura-host failed: {e}")
    })?;

    tracing::info!("aura-host shut down cleanly");
    Ok(())
}
