//! Microphone capture, phrase detection, and music playback via cpal.

pub mod capture;
pub mod decode;
pub mod playback;
pub mod vad;

pub use capture::{AudioChunk, CpalCapture, TARGET_SAMPLE_RATE};
pub use playback::{CpalMusicPlayer, MusicPlayer};
pub use vad::{MicrophonePhraseSource, PhraseSource, SpeechSegment};
