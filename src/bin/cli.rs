//! CLI binary for AURA.

use aura::audio::{CpalCapture, CpalMusicPlayer};
use aura::logging::{self, ConsoleLog};
use aura::speech::{SpeechEngine, SystemSpeaker};
use aura::ui::{DEFAULT_TICK, run_ui_pump, terminal::TerminalPresenter};
use aura::{Assistant, AssistantParts, ConfigStore, Intent, aura_dirs, ui_channel};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

const SPEECH_TEST_SENTENCE: &str = "Hello, this is a test of the speech system.";

/// AURA: a voice assistant for elderly users.
#[derive(Parser)]
#[command(name = "aura", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also log to stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Talk to the assistant in the terminal (default).
    Chat,

    /// List available audio devices.
    Devices,

    /// Speak a test sentence with the configured voice.
    SpeechTest,

    /// Print the configuration file path.
    ConfigPath,
}

/// Terminal shortcuts for the quick-action buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shortcut {
    ToggleMic,
    Action(Intent),
    Quit,
}

fn shortcut(line: &str) -> Option<Shortcut> {
    match line.trim() {
        "/mic" => Some(Shortcut::ToggleMic),
        "/weather" => Some(Shortcut::Action(Intent::Weather)),
        "/news" => Some(Shortcut::Action(Intent::News)),
        "/music" => Some(Shortcut::Action(Intent::PlayMusic)),
        "/meds" => Some(Shortcut::Action(Intent::Medication)),
        "/emergency" => Some(Shortcut::Action(Intent::Emergency)),
        "/quit" => Some(Shortcut::Quit),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(aura_dirs::config_file);
    let console = if cli.verbose {
        ConsoleLog::Stderr
    } else {
        ConsoleLog::Off
    };
    let _log_guard = logging::init(&aura_dirs::logs_dir(), console)?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(config_path).await,
        Command::Devices => list_devices(),
        Command::SpeechTest => speech_test(config_path),
        Command::ConfigPath => {
            println!("{}", config_path.display());
            Ok(())
        }
    }
}

async fn run_chat(config_path: PathBuf) -> anyhow::Result<()> {
    println!("AURA v{}", env!("CARGO_PKG_VERSION"));

    let store = ConfigStore::load(config_path);
    let (ui, receiver) = ui_channel();
    let parts = AssistantParts::system(store.data(), &ui);
    let assistant = Assistant::new(store, ui, parts)?;
    let shutdown = assistant.shutdown_token();

    let pump = tokio::spawn(run_ui_pump(
        receiver,
        TerminalPresenter::stdout(),
        DEFAULT_TICK,
        shutdown.clone(),
    ));

    let ctrl_c = assistant.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            ctrl_c.close();
        }
    });

    println!("Type a command, or /mic /weather /news /music /meds /emergency /quit.\n");
    assistant.greet();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        match shortcut(&line) {
            Some(Shortcut::ToggleMic) => {
                assistant.toggle_listening();
            }
            Some(Shortcut::Action(intent)) => {
                assistant.trigger(intent);
            }
            Some(Shortcut::Quit) => break,
            None => {
                assistant.submit_text(&line);
            }
        }
    }

    assistant.close();
    pump.await?;
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in CpalCapture::list_input_devices()? {
        println!("  - {name}");
    }

    println!("\nOutput devices:");
    for name in CpalMusicPlayer::list_output_devices()? {
        println!("  - {name}");
    }

    Ok(())
}

fn speech_test(config_path: PathBuf) -> anyhow::Result<()> {
    let store = ConfigStore::load(config_path);
    let config = store.data();
    let engine = SpeechEngine::detect()?;
    println!("Engine: {}", engine.name());
    println!("Rate: {}", config.voice_rate);
    println!("Volume: {}", config.voice_volume);

    let (ui, receiver) = ui_channel();
    let speaker = SystemSpeaker::spawn(engine, config.voice_rate, config.voice_volume, ui)?;
    aura::speech::Speaker::speak(&speaker, SPEECH_TEST_SENTENCE, false);
    speaker.finish();

    for update in receiver.drain() {
        if let aura::UiUpdate::Append { text, .. } = update {
            eprintln!("{text}");
        }
    }
    println!("Speech test complete.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcuts_map_to_actions() {
        assert_eq!(shortcut(" /mic "), Some(Shortcut::ToggleMic));
        assert_eq!(shortcut("/meds"), Some(Shortcut::Action(Intent::Medication)));
        assert_eq!(shortcut("/quit"), Some(Shortcut::Quit));
        assert_eq!(shortcut("what time is it"), None);
        assert_eq!(shortcut("/unknown"), None);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from(["aura", "--config", "/tmp/c.json", "speech-test"]);
        assert!(matches!(cli.command, Some(Command::SpeechTest)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));

        let cli = Cli::parse_from(["aura"]);
        assert!(cli.command.is_none());
    }
}
