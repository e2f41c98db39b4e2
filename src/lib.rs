//! AURA: a voice assistant for elderly users.
//!
//! Typed or spoken commands are routed by keyword to a fixed set of
//! handlers (time, date, weather, news, jokes, music, reminders, medication
//! schedule, websites, emergency alert) with an LLM and encyclopedia
//! fallback for everything else.
//!
//! # Architecture
//!
//! - **Assistant**: owns the config, services, timers and listener; every
//!   command runs as a background task
//! - **UI mailbox**: background work pushes `UiUpdate`s; a presenter drains
//!   them on a fixed tick (terminal or JSON host bridge)
//! - **Listener**: push-to-talk loop, microphone → energy VAD → speech API
//! - **Speech**: platform TTS command on a worker thread
//! - **Reminders**: one-shot reminders and daily medication timers

pub mod assistant;
pub mod audio;
pub mod aura_dirs;
pub mod config;
pub mod error;
pub mod host;
pub mod listener;
pub mod logging;
pub mod reminders;
pub mod router;
pub mod services;
pub mod settings;
pub mod speech;
pub mod transcript;
pub mod ui;

pub use assistant::{Assistant, AssistantParts, RuntimeStatus, TranscriberSource};
pub use config::{AuraConfig, ConfigStore};
pub use error::{AuraError, Result};
pub use router::{Intent, classify};
pub use settings::SettingsForm;
pub use ui::{Role, UiQueue, UiUpdate, ui_channel};
