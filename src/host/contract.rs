//! Versioned host command/event envelopes for the JSON host bridge.

use serde::{Deserialize, Serialize};

/// Contract version for host command/event envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Command set accepted by the host bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "runtime.status")]
    RuntimeStatus,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
    #[serde(rename = "conversation.send_text")]
    ConversationSendText,
    #[serde(rename = "listening.toggle")]
    ListeningToggle,
    #[serde(rename = "action.weather")]
    ActionWeather,
    #[serde(rename = "action.news")]
    ActionNews,
    #[serde(rename = "action.play_music")]
    ActionPlayMusic,
    #[serde(rename = "action.medications")]
    ActionMedications,
    #[serde(rename = "action.emergency")]
    ActionEmergency,
    #[serde(rename = "config.get")]
    ConfigGet,
    #[serde(rename = "config.patch")]
    ConfigPatch,
    #[serde(rename = "settings.save")]
    SettingsSave,
}

impl CommandName {
    pub const ALL: [Self; 14] = [
        Self::HostPing,
        Self::HostVersion,
        Self::RuntimeStatus,
        Self::RuntimeStop,
        Self::ConversationSendText,
        Self::ListeningToggle,
        Self::ActionWeather,
        Self::ActionNews,
        Self::ActionPlayMusic,
        Self::ActionMedications,
        Self::ActionEmergency,
        Self::ConfigGet,
        Self::ConfigPatch,
        Self::SettingsSave,
    ];

    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::RuntimeStatus => "runtime.status",
            Self::RuntimeStop => "runtime.stop",
            Self::ConversationSendText => "conversation.send_text",
            Self::ListeningToggle => "listening.toggle",
            Self::ActionWeather => "action.weather",
            Self::ActionNews => "action.news",
            Self::ActionPlayMusic => "action.play_music",
            Self::ActionMedications => "action.medications",
            Self::ActionEmergency => "action.emergency",
            Self::ConfigGet => "config.get",
            Self::ConfigPatch => "config.patch",
            Self::SettingsSave => "settings.save",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw)
    }
}

/// A versioned response envelope from backend host -> frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

/// A versioned command envelope from frontend -> backend host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    /// Build a v1 command envelope.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// A versioned event envelope from backend host -> frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub v: u32,
    pub event_id: String,
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Build a v1 event envelope.
    #[must_use]
    pub fn new(
        event_id: impl Into<String>,
        event: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            event_id: event_id.into(),
            event: event.into(),
            payload,
        }
    }

    /// Event with a fresh random id.
    #[must_use]
    pub fn fresh(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), event, payload)
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn command_names_round_trip_through_wire_format() {
        for command in CommandName::ALL {
            assert_eq!(CommandName::parse(command.as_str()), Some(command));
            let json = serde_json::to_value(command).unwrap();
            assert_eq!(json, serde_json::json!(command.as_str()));
        }
        assert_eq!(CommandName::parse("orb.flash"), None);
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let env: CommandEnvelope =
            serde_json::from_str(r#"{"v":1,"request_id":"r1","command":"host.ping"}"#).unwrap();
        assert_eq!(env.command, CommandName::HostPing);
        assert!(env.payload.is_null());
    }

    #[test]
    fn validate_rejects_wrong_version_and_blank_id() {
        let mut env = CommandEnvelope::new("r1", CommandName::HostPing, serde_json::json!({}));
        assert!(env.validate().is_ok());

        env.v = 2;
        let err = env.validate().unwrap_err();
        assert_eq!(err.kind, ContractErrorKind::UnsupportedVersion);

        env.v = EVENT_VERSION;
        env.request_id = "  ".into();
        let err = env.validate().unwrap_err();
        assert_eq!(err.kind, ContractErrorKind::InvalidEnvelope);
    }

    #[test]
    fn error_response_has_null_payload() {
        let resp = ResponseEnvelope::error("r9", "boom");
        assert!(!resp.ok);
        assert_eq!(resp.payload, serde_json::Value::Null);
        assert_eq!(resp.error.as_deref(), Some("boom"));
    }
}
