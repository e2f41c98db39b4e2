//! Speech-to-text through an OpenAI-compatible transcription API.

use crate::audio::SpeechSegment;
use crate::config::SttConfig;
use crate::services::http::{build_client_with_timeout, v1_endpoint};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info};

/// Transcription requests carry up to ten seconds of audio.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a phrase produced no text.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SttError {
    /// Audio was received but nothing intelligible was said.
    #[error("could not understand audio")]
    Unintelligible,
    /// The recognition service is unreachable, refused the request, or is
    /// misconfigured.
    #[error("{0}")]
    Service(String),
}

/// Turns a speech segment into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, segment: &SpeechSegment) -> Result<String, SttError>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// [`Transcriber`] posting WAV audio to `/v1/audio/transcriptions`.
#[derive(Debug, Clone)]
pub struct ApiTranscriber {
    client: reqwest::Client,
    config: SttConfig,
    api_key: String,
}

impl ApiTranscriber {
    /// # Errors
    ///
    /// Returns [`SttError::Service`] if the HTTP client cannot be built.
    pub fn new(config: SttConfig, api_key: impl Into<String>) -> Result<Self, SttError> {
        let client = build_client_with_timeout(TRANSCRIBE_TIMEOUT)
            .map_err(|e| SttError::Service(e.to_string()))?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }
}

/// Encode mono `f32` samples as a 16-bit PCM WAV file in memory.
///
/// # Errors
///
/// Returns an error if the WAV writer fails.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
            writer.write_sample(v)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[async_trait]
impl Transcriber for ApiTranscriber {
    async fn transcribe(&self, segment: &SpeechSegment) -> Result<String, SttError> {
        if segment.samples.is_empty() {
            return Err(SttError::Unintelligible);
        }
        if self.api_key.trim().is_empty() {
            return Err(SttError::Service(
                "speech recognition API key not configured".into(),
            ));
        }

        let wav = encode_wav(&segment.samples, segment.sample_rate)
            .map_err(|e| SttError::Service(format!("failed to encode audio: {e}")))?;
        debug!(
            bytes = wav.len(),
            secs = segment.duration().as_secs_f32(),
            "sending phrase for transcription"
        );

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("phrase.wav")
            .mime_str("audio/wav")
            .map_err(|e| SttError::Service(e.to_string()))?;
        let mut form = reqwest::multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .part("file", part);
        if !self.config.language.is_empty() {
            form = form.text("language", self.config.language.clone());
        }

        let url = v1_endpoint(&self.config.api_url, "audio/transcriptions");
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.trim())
            .multipart(form)
            .send()
            .await
            .map_err(|e| SttError::Service(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SttError::Service(format!(
                "recognition service returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| SttError::Service(format!("malformed response: {e}")))?;
        let text = body.text.trim();
        if text.is_empty() {
            return Err(SttError::Unintelligible);
        }
        info!("transcribed: {text}");
        Ok(text.to_owned())
    }
}
