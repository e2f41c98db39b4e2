//! Speech output and recognition.

pub mod speaker;
pub mod transcriber;

pub use speaker::{SilentSpeaker, SpeechEngine, Speaker, SystemSpeaker};
pub use transcriber::{ApiTranscriber, SttError, Transcriber};

use crate::ui::UiQueue;
use std::sync::Arc;
use tracing::warn;

/// The platform speaker, or a silent one when no engine is installed.
#[must_use]
pub fn default_speaker(rate: u32, volume: f32, ui: &UiQueue) -> Arc<dyn Speaker> {
    let spawned = SpeechEngine::detect()
        .and_then(|engine| SystemSpeaker::spawn(engine, rate, volume, ui.clone()));
    match spawned {
        Ok(speaker) => Arc::new(speaker),
        Err(e) => {
            warn!("speech output disabled: {e}");
            Arc::new(SilentSpeaker)
        }
    }
}
