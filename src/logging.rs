//! Tracing setup shared by the binaries.
//!
//! Logs go to stderr (stdout is reserved for the host JSON protocol) and to a
//! daily rolling file `aura.log.YYYY-MM-DD` under [`crate::aura_dirs::logs_dir`].

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "aura=info,reqwest=warn,symphonia=warn";

/// Where console log lines should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLog {
    /// Write formatted lines to stderr.
    Stderr,
    /// File only (keeps an interactive terminal clean).
    Off,
}

/// Install the global subscriber.
///
/// The returned guard must be kept alive for the lifetime of the process,
/// otherwise buffered file lines are lost on exit.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
pub fn init(log_dir: &Path, console: ConsoleLog) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "aura.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);
    let console_layer = match console {
        ConsoleLog::Stderr => Some(fmt::layer().with_writer(std::io::stderr)),
        ConsoleLog::Off => None,
    };

    // A second init (e.g. in tests) is harmless; keep the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    Ok(guard)
}
