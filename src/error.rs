//! Error types for the assistant.

/// Top-level error type for the assistant runtime.
#[derive(Debug, thiserror::Error)]
pub enum AuraError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text service error.
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Remote API request error (weather, news, encyclopedia, LLM).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Language model error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Host command routing error (bad payload, unknown key).
    #[error("host error: {0}")]
    Host(String),

    /// Reminder or medication timer error.
    #[error("reminder error: {0}")]
    Reminder(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<reqwest::Error> for AuraError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AuraError>;
