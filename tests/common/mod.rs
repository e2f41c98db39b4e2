//! In-memory stand-ins for the assistant's devices.

#![allow(dead_code)]

use async_trait::async_trait;
use aura::audio::{MusicPlayer, PhraseSource, SpeechSegment};
use aura::services::{Endpoints, UrlOpener};
use aura::speech::{Speaker, SttError, Transcriber};
use aura::{AssistantParts, AuraError, TranscriberSource};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Records what would have been spoken.
#[derive(Default)]
pub struct MemorySpeaker {
    pub spoken: Mutex<Vec<String>>,
    pub voice: Mutex<Option<(u32, f32)>>,
}

impl Speaker for MemorySpeaker {
    fn speak(&self, text: &str, _interrupt: bool) {
        self.spoken.lock().expect("lock").push(text.to_owned());
    }

    fn stop(&self) {}

    fn set_voice(&self, rate: u32, volume: f32) {
        *self.voice.lock().expect("lock") = Some((rate, volume));
    }
}

pub struct SilentPlayer;

impl MusicPlayer for SilentPlayer {
    fn play(&self, _path: &Path) -> aura::Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn is_playing(&self) -> bool {
        false
    }
}

pub struct NoBrowser;

impl UrlOpener for NoBrowser {
    fn open(&self, _url: &str) -> aura::Result<()> {
        Ok(())
    }
}

/// Hears audio but never understands it.
pub struct Deaf;

#[async_trait]
impl Transcriber for Deaf {
    async fn transcribe(&self, _segment: &SpeechSegment) -> Result<String, SttError> {
        Err(SttError::Unintelligible)
    }
}

/// Parts with no real devices. Remote services point at a closed port.
pub fn test_parts() -> (AssistantParts, Arc<MemorySpeaker>) {
    let speaker = Arc::new(MemorySpeaker::default());
    let parts = AssistantParts {
        speaker: speaker.clone(),
        player: Arc::new(SilentPlayer),
        opener: Arc::new(NoBrowser),
        microphone: Arc::new(|| -> aura::Result<Box<dyn PhraseSource>> {
            Err(AuraError::Audio("no microphone".into()))
        }),
        transcriber: TranscriberSource::Fixed(Arc::new(Deaf)),
        endpoints: Endpoints::under("http://127.0.0.1:9"),
    };
    (parts, speaker)
}
