//! Energy-based phrase detection for push-to-talk.
//!
//! The detector is calibrated against ambient noise, then waits for RMS
//! energy to rise above the threshold, collects the phrase, and ends it
//! after a run of silence or when the phrase limit is reached.

use super::capture::{AudioChunk, CaptureHandle, CpalCapture, TARGET_SAMPLE_RATE};
use crate::config::{AudioConfig, ListeningConfig};
use crate::error::{AuraError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// A captured utterance ready for transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SpeechSegment {
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Source of spoken phrases (normally the microphone).
#[async_trait]
pub trait PhraseSource: Send {
    /// Measure background noise and adjust the speech threshold.
    async fn adjust_for_ambient_noise(&mut self) -> Result<()>;

    /// Wait for one phrase. `Ok(None)` means nobody started speaking
    /// before the wait timeout.
    async fn listen(&mut self) -> Result<Option<SpeechSegment>>;
}

/// Outcome of feeding one chunk to the detector.
#[derive(Debug, PartialEq)]
pub enum Step {
    /// Keep feeding.
    Continue,
    /// A phrase ended (silence or length limit).
    Phrase(Vec<f32>),
    /// No speech started within the wait timeout.
    TimedOut,
}

/// Sample-counting phrase state machine.
#[derive(Debug, Clone)]
pub struct PhraseDetector {
    threshold: f32,
    min_energy: f32,
    energy_ratio: f32,
    wait_samples: usize,
    limit_samples: usize,
    pause_samples: usize,
    waited: usize,
    in_speech: bool,
    silence_run: usize,
    buffer: Vec<f32>,
}

impl PhraseDetector {
    pub fn new(config: &ListeningConfig, sample_rate: u32) -> Self {
        let per_ms = sample_rate as usize / 1000;
        Self {
            threshold: config.min_energy,
            min_energy: config.min_energy,
            energy_ratio: config.energy_ratio,
            wait_samples: config.wait_timeout_secs as usize * sample_rate as usize,
            limit_samples: config.phrase_limit_secs as usize * sample_rate as usize,
            pause_samples: config.pause_ms as usize * per_ms,
            waited: 0,
            in_speech: false,
            silence_run: 0,
            buffer: Vec::new(),
        }
    }

    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Set the threshold from a stretch of background audio.
    pub fn calibrate(&mut self, ambient: &[f32]) {
        let noise = compute_rms_energy(ambient);
        self.threshold = (noise * self.energy_ratio).max(self.min_energy);
        debug!(noise, threshold = self.threshold, "ambient calibration");
    }

    /// Forget any partial phrase and restart the wait timer.
    pub fn reset(&mut self) {
        self.waited = 0;
        self.in_speech = false;
        self.silence_run = 0;
        self.buffer.clear();
    }

    pub fn push(&mut self, samples: &[f32]) -> Step {
        let is_speech = compute_rms_energy(samples) > self.threshold;

        if !self.in_speech {
            if is_speech {
                self.in_speech = true;
                self.silence_run = 0;
                self.buffer.extend_from_slice(samples);
            } else {
                self.waited += samples.len();
                if self.waited >= self.wait_samples {
                    self.reset();
                    return Step::TimedOut;
                }
            }
            return self.check_limit();
        }

        self.buffer.extend_from_slice(samples);
        if is_speech {
            self.silence_run = 0;
        } else {
            self.silence_run += samples.len();
            if self.silence_run >= self.pause_samples {
                return self.finish();
            }
        }
        self.check_limit()
    }

    fn check_limit(&mut self) -> Step {
        if self.in_speech && self.buffer.len() >= self.limit_samples {
            self.buffer.truncate(self.limit_samples);
            return self.finish();
        }
        Step::Continue
    }

    fn finish(&mut self) -> Step {
        let phrase = std::mem::take(&mut self.buffer);
        self.reset();
        Step::Phrase(phrase)
    }
}

/// Compute RMS energy of audio samples.
#[must_use]
pub fn compute_rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// [`PhraseSource`] reading from the system microphone.
pub struct MicrophonePhraseSource {
    capture: CaptureHandle,
    detector: PhraseDetector,
    ambient: Duration,
}

impl MicrophonePhraseSource {
    /// Open the configured input device.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Audio`] if the microphone cannot be opened.
    pub fn open(audio: &AudioConfig, listening: &ListeningConfig) -> Result<Self> {
        let capture = CpalCapture::new(audio).start()?;
        info!("microphone opened");
        Ok(Self {
            capture,
            detector: PhraseDetector::new(listening, TARGET_SAMPLE_RATE),
            ambient: Duration::from_millis(u64::from(listening.ambient_ms)),
        })
    }

    async fn next_chunk(&mut self) -> Result<AudioChunk> {
        self.capture
            .recv()
            .await
            .ok_or_else(|| AuraError::Audio("microphone stream ended".into()))
    }
}

#[async_trait]
impl PhraseSource for MicrophonePhraseSource {
    async fn adjust_for_ambient_noise(&mut self) -> Result<()> {
        self.capture.flush();
        let wanted = (self.ambient.as_secs_f64() * f64::from(TARGET_SAMPLE_RATE)) as usize;
        let mut ambient = Vec::with_capacity(wanted);
        while ambient.len() < wanted {
            let chunk = self.next_chunk().await?;
            ambient.extend_from_slice(&chunk.samples);
        }
        self.detector.calibrate(&ambient);
        Ok(())
    }

    async fn listen(&mut self) -> Result<Option<SpeechSegment>> {
        self.detector.reset();
        loop {
            let chunk = self.next_chunk().await?;
            match self.detector.push(&chunk.samples) {
                Step::Continue => {}
                Step::TimedOut => return Ok(None),
                Step::Phrase(samples) => {
                    return Ok(Some(SpeechSegment {
                        samples,
                        sample_rate: TARGET_SAMPLE_RATE,
                    }));
                }
            }
        }
    }
}
