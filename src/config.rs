//! Persistent assistant settings stored as `config.json`.
//!
//! Every field carries a serde default, so a partial or older file loads
//! with the missing sections filled in.

use crate::error::{AuraError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default user name shown in the greeting.
pub const DEFAULT_USER_NAME: &str = "User";
/// Default city for weather lookups.
pub const DEFAULT_CITY: &str = "New York";
/// Allowed font size range for the transcript.
pub const FONT_SIZE_RANGE: (u32, u32) = (12, 24);
/// Allowed speech rate range (words per minute).
pub const VOICE_RATE_RANGE: (u32, u32) = (80, 240);

/// Top-level assistant configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuraConfig {
    /// Name used in greetings.
    pub user_name: String,
    /// City used for weather lookups.
    pub city: String,
    /// Presentation theme.
    pub theme: Theme,
    /// Transcript font size in points.
    pub font_size: u32,
    /// Speech rate in words per minute.
    pub voice_rate: u32,
    /// Speech volume in `[0.0, 1.0]`.
    pub voice_volume: f32,
    /// Third-party API keys.
    pub api_keys: ApiKeys,
    /// Favorite music files and websites.
    pub favorites: Favorites,
    /// People to alert when the emergency protocol runs.
    pub emergency_contacts: Vec<EmergencyContact>,
    /// Medication name to daily `HH:MM` times.
    pub medication_schedule: BTreeMap<String, Vec<String>>,
    /// Language model fallback settings.
    pub llm: LlmConfig,
    /// Speech-to-text service settings.
    pub stt: SttConfig,
    /// Push-to-talk phrase detection settings.
    pub listening: ListeningConfig,
    /// Audio device selection.
    pub audio: AudioConfig,
}

impl Default for AuraConfig {
    fn default() -> Self {
        Self {
            user_name: DEFAULT_USER_NAME.to_owned(),
            city: DEFAULT_CITY.to_owned(),
            theme: Theme::default(),
            font_size: 16,
            voice_rate: 150,
            voice_volume: 1.0,
            api_keys: ApiKeys::default(),
            favorites: Favorites::default(),
            emergency_contacts: Vec::new(),
            medication_schedule: BTreeMap::new(),
            llm: LlmConfig::default(),
            stt: SttConfig::default(),
            listening: ListeningConfig::default(),
            audio: AudioConfig::default(),
        }
    }
}

/// Presentation theme.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    Dark,
    Light,
    System,
}

impl Theme {
    /// Wire/display name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
            Self::System => "System",
        }
    }

    /// Parse a theme name (case-insensitive).
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// API keys for the optional online features. Empty means "not configured".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openweathermap: String,
    pub newsapi: String,
    pub openai: String,
}

/// Favorite media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Favorites {
    /// Paths to local audio files.
    pub music: Vec<String>,
    pub websites: Vec<String>,
}

/// A person to contact in an emergency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relation: String,
}

/// Language model fallback configuration (OpenAI-compatible chat API).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the API server, with or without a trailing `/v1`.
    pub api_url: String,
    /// Model name to request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
    /// System prompt sent before every question.
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            model: "gpt-3.5-turbo".to_owned(),
            temperature: 0.6,
            max_tokens: 200,
            system_prompt: "You are a concise, friendly assistant for an elderly user. \
                            Keep replies short and clear."
                .to_owned(),
        }
    }
}

/// Speech-to-text service configuration (OpenAI-compatible transcription API).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Base URL of the transcription server.
    pub api_url: String,
    /// Model name to request.
    pub model: String,
    /// ISO-639-1 language hint.
    pub language: String,
    /// Dedicated key; when empty the `api_keys.openai` key is used.
    pub api_key: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            model: "whisper-1".to_owned(),
            language: "en".to_owned(),
            api_key: String::new(),
        }
    }
}

/// Phrase detection settings for push-to-talk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListeningConfig {
    /// Ambient-noise calibration window in milliseconds.
    pub ambient_ms: u32,
    /// Seconds to wait for speech to start before trying again.
    pub wait_timeout_secs: u32,
    /// Maximum phrase length in seconds.
    pub phrase_limit_secs: u32,
    /// Silence (ms) that ends a phrase.
    pub pause_ms: u32,
    /// Minimum RMS energy counted as speech, regardless of calibration.
    pub min_energy: f32,
    /// Speech must exceed the calibrated ambient level by this factor.
    pub energy_ratio: f32,
}

impl Default for ListeningConfig {
    fn default() -> Self {
        Self {
            ambient_ms: 500,
            wait_timeout_secs: 5,
            phrase_limit_secs: 10,
            pause_ms: 800,
            min_energy: 0.01,
            energy_ratio: 1.5,
        }
    }
}

/// Audio device selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl AuraConfig {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| AuraError::Config(e.to_string()))
    }

    /// Save configuration as 4-space indented JSON, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)
            .map_err(|e| AuraError::Config(e.to_string()))?;
        std::fs::write(path, buf)?;
        Ok(())
    }

    /// Key used for the LLM fallback, if configured.
    #[must_use]
    pub fn openai_key(&self) -> Option<&str> {
        non_empty(&self.api_keys.openai)
    }

    /// Key used for speech recognition: the dedicated STT key, else the OpenAI key.
    #[must_use]
    pub fn stt_key(&self) -> Option<&str> {
        non_empty(&self.stt.api_key).or_else(|| self.openai_key())
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Owns the on-disk config file and the in-memory copy.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    data: AuraConfig,
}

impl ConfigStore {
    /// Load from `path`. A missing file yields defaults; an unreadable or
    /// invalid file is logged and also yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = if path.exists() {
            match AuraConfig::from_file(&path) {
                Ok(config) => {
                    debug!("loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("error loading config {}: {e}; using defaults", path.display());
                    AuraConfig::default()
                }
            }
        } else {
            AuraConfig::default()
        };
        Self { path, data }
    }

    /// Wrap an in-memory config that will be saved to `path`.
    pub fn with_config(path: impl Into<PathBuf>, data: AuraConfig) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Path this store saves to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration.
    #[must_use]
    pub fn data(&self) -> &AuraConfig {
        &self.data
    }

    /// Mutable access to the configuration (not persisted until [`save`](Self::save)).
    pub fn data_mut(&mut self) -> &mut AuraConfig {
        &mut self.data
    }

    /// Write the current configuration to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.data.save_to_file(&self.path)
    }

    /// Read a value by dotted path (e.g. `api_keys.openai`). `None` when absent.
    #[must_use]
    pub fn get(&self, key_path: &str) -> Option<serde_json::Value> {
        let root = serde_json::to_value(&self.data).ok()?;
        if key_path.trim().is_empty() {
            return Some(root);
        }
        let mut cur = &root;
        for part in key_path.split('.') {
            cur = cur.as_object()?.get(part)?;
        }
        Some(cur.clone())
    }

    /// Set a value by dotted path, creating intermediate objects.
    ///
    /// The change is applied only if the result still deserializes into
    /// [`AuraConfig`] and the path is still present afterwards. The schema
    /// drops unknown fields at any depth, so a misspelled key is rejected
    /// here instead of being silently discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Config`] for an empty or unknown path or a value
    /// of the wrong type.
    pub fn set(&mut self, key_path: &str, value: serde_json::Value) -> Result<()> {
        let parts: Vec<&str> = key_path.split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(AuraError::Config(format!("invalid key path `{key_path}`")));
        }

        let mut root =
            serde_json::to_value(&self.data).map_err(|e| AuraError::Config(e.to_string()))?;
        let top_known = root.get(parts[0]).is_some();
        if !top_known {
            return Err(AuraError::Config(format!("unknown config key `{}`", parts[0])));
        }

        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| AuraError::Config("empty key path".to_owned()))?;
        let mut cur = &mut root;
        for part in parents {
            if !cur.get(*part).is_some_and(serde_json::Value::is_object) {
                cur[*part] = serde_json::json!({});
            }
            cur = &mut cur[*part];
        }
        match cur.as_object_mut() {
            Some(map) => {
                map.insert((*last).to_owned(), value);
            }
            None => {
                return Err(AuraError::Config(format!(
                    "cannot set `{key_path}`: parent is not an object"
                )));
            }
        }

        let updated: AuraConfig = serde_json::from_value(root)
            .map_err(|e| AuraError::Config(format!("invalid value for `{key_path}`: {e}")))?;
        let candidate = Self::with_config(self.path.clone(), updated);
        if candidate.get(key_path).is_none() {
            return Err(AuraError::Config(format!("unknown config key `{key_path}`")));
        }
        self.data = candidate.data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_matches_first_run_values() {
        let config = AuraConfig::default();
        assert_eq!(config.user_name, "User");
        assert_eq!(config.city, "New York");
        assert_eq!(config.theme, Theme::Dark);
        assert_eq!(config.font_size, 16);
        assert_eq!(config.voice_rate, 150);
        assert!((config.voice_volume - 1.0).abs() < f32::EPSILON);
        assert!(config.openai_key().is_none());
        assert!(config.medication_schedule.is_empty());
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
    }

    #[test]
    fn partial_json_fills_missing_sections() {
        let raw = r#"{"user_name": "Margaret", "api_keys": {"newsapi": "abc"}}"#;
        let config: AuraConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.user_name, "Margaret");
        assert_eq!(config.city, "New York");
        assert_eq!(config.api_keys.newsapi, "abc");
        assert_eq!(config.api_keys.openweathermap, "");
        assert!(config.favorites.music.is_empty());
        assert_eq!(config.listening.wait_timeout_secs, 5);
    }

    #[test]
    fn full_settings_file_loads() {
        let raw = r#"{
            "user_name": "Ravi",
            "city": "Pune",
            "theme": "Light",
            "font_size": 20,
            "voice_rate": 120,
            "voice_volume": 0.8,
            "api_keys": {"openweathermap": "w", "newsapi": "", "openai": ""},
            "favorites": {"music": ["/music/a.mp3"], "websites": []},
            "emergency_contacts": [{"name": "Asha", "phone": "123", "relation": "Daughter"}],
            "medication_schedule": {"Aspirin": ["08:00", "20:00"]}
        }"#;
        let config: AuraConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.theme, Theme::Light);
        assert_eq!(config.emergency_contacts[0].relation, "Daughter");
        assert_eq!(config.medication_schedule["Aspirin"], vec!["08:00", "20:00"]);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AuraConfig::default();
        config.city = "Chennai".into();
        config.voice_rate = 180;
        config.save_to_file(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    \"user_name\""), "expected 4-space indent");

        let loaded = AuraConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn store_load_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "this is not json {{{").unwrap();

        let store = ConfigStore::load(&path);
        assert_eq!(store.data(), &AuraConfig::default());
    }

    #[test]
    fn store_load_missing_file_uses_defaults() {
        let store = ConfigStore::load("/nonexistent/aura/config.json");
        assert_eq!(store.data().user_name, "User");
    }

    #[test]
    fn get_dotted_path() {
        let mut config = AuraConfig::default();
        config.api_keys.openai = "sk-test".into();
        let store = ConfigStore::with_config("/tmp/unused.json", config);

        assert_eq!(
            store.get("api_keys.openai"),
            Some(serde_json::json!("sk-test"))
        );
        assert_eq!(store.get("city"), Some(serde_json::json!("New York")));
        assert_eq!(store.get("api_keys.missing"), None);
        assert_eq!(store.get("city.nested"), None);
    }

    #[test]
    fn set_dotted_path_updates_typed_config() {
        let mut store = ConfigStore::with_config("/tmp/unused.json", AuraConfig::default());
        store
            .set("api_keys.newsapi", serde_json::json!("news-key"))
            .unwrap();
        store.set("font_size", serde_json::json!(20)).unwrap();
        store
            .set(
                "medication_schedule",
                serde_json::json!({"Metformin": ["09:00"]}),
            )
            .unwrap();

        assert_eq!(store.data().api_keys.newsapi, "news-key");
        assert_eq!(store.data().font_size, 20);
        assert_eq!(store.data().medication_schedule["Metformin"], vec!["09:00"]);
    }

    #[test]
    fn set_rejects_wrong_type_and_unknown_key() {
        let mut store = ConfigStore::with_config("/tmp/unused.json", AuraConfig::default());
        assert!(store.set("font_size", serde_json::json!("big")).is_err());
        assert!(store.set("no_such_key", serde_json::json!(1)).is_err());
        assert!(store.set("", serde_json::json!(1)).is_err());
        assert_eq!(store.data().font_size, 16);
    }

    #[test]
    fn set_rejects_unknown_nested_key() {
        let mut store = ConfigStore::with_config("/tmp/unused.json", AuraConfig::default());
        let err = store
            .set("api_keys.open_ai", serde_json::json!("sk-typo"))
            .unwrap_err();
        assert!(err.to_string().contains("api_keys.open_ai"));
        assert!(store
            .set("llm.model.name", serde_json::json!("gpt-4"))
            .is_err());
        assert_eq!(store.data(), &AuraConfig::default());

        store
            .set("medication_schedule.Aspirin", serde_json::json!(["08:00"]))
            .unwrap();
        store.set("voice_volume", serde_json::json!(0.8)).unwrap();
        assert_eq!(store.data().medication_schedule["Aspirin"], vec!["08:00"]);
    }

    #[test]
    fn stt_key_falls_back_to_openai_key() {
        let mut config = AuraConfig::default();
        assert!(config.stt_key().is_none());
        config.api_keys.openai = " sk-main ".into();
        assert_eq!(config.stt_key(), Some("sk-main"));
        config.stt.api_key = "sk-stt".into();
        assert_eq!(config.stt_key(), Some("sk-stt"));
    }

    #[test]
    fn theme_parse_is_case_insensitive() {
        assert_eq!(Theme::parse("light"), Some(Theme::Light));
        assert_eq!(Theme::parse(" SYSTEM "), Some(Theme::System));
        assert_eq!(Theme::parse("neon"), None);
        assert_eq!(Theme::Dark.as_str(), "Dark");
    }
}
