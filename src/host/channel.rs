//! Host command channel and router for the JSON host bridge.

use crate::error::{AuraError, Result};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Quick actions a host can fire without typing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickAction {
    Weather,
    News,
    PlayMusic,
    Medications,
    Emergency,
}

impl QuickAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::News => "news",
            Self::PlayMusic => "play_music",
            Self::Medications => "medications",
            Self::Emergency => "emergency",
        }
    }

    fn from_command(command: CommandName) -> Option<Self> {
        match command {
            CommandName::ActionWeather => Some(Self::Weather),
            CommandName::ActionNews => Some(Self::News),
            CommandName::ActionPlayMusic => Some(Self::PlayMusic),
            CommandName::ActionMedications => Some(Self::Medications),
            CommandName::ActionEmergency => Some(Self::Emergency),
            _ => None,
        }
    }
}

/// What the router calls into. Every method must return promptly; long work
/// is started in the background and reports through UI events.
pub trait HostCommandHandler: Send + Sync + 'static {
    fn send_text(&self, text: &str) -> Result<()>;
    /// Flip push-to-talk. Returns whether listening is now on.
    fn toggle_listening(&self) -> Result<bool>;
    fn run_action(&self, action: QuickAction) -> Result<()>;
    fn query_runtime_status(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({"status": "unknown"}))
    }
    fn request_runtime_stop(&self) -> Result<()> {
        Ok(())
    }
    fn query_config_get(&self, _key: Option<&str>) -> Result<serde_json::Value> {
        Ok(serde_json::json!({}))
    }
    fn request_config_patch(&self, _key: &str, _value: &serde_json::Value) -> Result<()> {
        Ok(())
    }
    /// Save the settings fields present in `changes`; absent fields keep
    /// their current values.
    fn save_settings(&self, _changes: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

/// Accepts everything and does nothing.
#[derive(Debug, Default)]
pub struct NoopHostHandler;

impl HostCommandHandler for NoopHostHandler {
    fn send_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn toggle_listening(&self) -> Result<bool> {
        Ok(false)
    }

    fn run_action(&self, _action: QuickAction) -> Result<()> {
        Ok(())
    }
}

struct HostCommandRequest {
    envelope: CommandEnvelope,
    response_tx: oneshot::Sender<Result<ResponseEnvelope>>,
}

#[derive(Clone)]
pub struct HostCommandClient {
    request_tx: mpsc::Sender<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostCommandClient {
    pub async fn send(&self, envelope: CommandEnvelope) -> Result<ResponseEnvelope> {
        envelope.validate().map_err(|e| {
            AuraError::Host(format!(
                "invalid host command envelope {}: {}",
                envelope.request_id, e
            ))
        })?;

        let (response_tx, response_rx) = oneshot::channel();
        self.request_tx
            .send(HostCommandRequest {
                envelope,
                response_tx,
            })
            .await
            .map_err(|e| AuraError::Channel(format!("failed to send host command request: {e}")))?;

        response_rx
            .await
            .map_err(|e| AuraError::Channel(format!("host command response dropped: {e}")))?
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }
}

pub struct HostCommandServer<H: HostCommandHandler> {
    request_rx: mpsc::Receiver<HostCommandRequest>,
    event_tx: broadcast::Sender<EventEnvelope>,
    handler: H,
}

#[must_use]
pub fn command_channel<H: HostCommandHandler>(
    request_capacity: usize,
    event_capacity: usize,
    handler: H,
) -> (HostCommandClient, HostCommandServer<H>) {
    let (event_tx, _event_rx) = broadcast::channel(event_capacity.max(1));
    command_channel_with_events(request_capacity, event_tx, handler)
}

/// Create a command channel using an existing event broadcast sender, so
/// UI events and router events reach the host through the same path.
#[must_use]
pub fn command_channel_with_events<H: HostCommandHandler>(
    request_capacity: usize,
    event_tx: broadcast::Sender<EventEnvelope>,
    handler: H,
) -> (HostCommandClient, HostCommandServer<H>) {
    let (request_tx, request_rx) = mpsc::channel(request_capacity.max(1));

    (
        HostCommandClient {
            request_tx,
            event_tx: event_tx.clone(),
        },
        HostCommandServer {
            request_rx,
            event_tx,
            handler,
        },
    )
}

impl<H: HostCommandHandler> HostCommandServer<H> {
    pub async fn run(mut self) {
        while let Some(request) = self.request_rx.recv().await {
            let response = self.route(&request.envelope);
            let _ = request.response_tx.send(response);
        }
    }

    /// Route a command envelope to the handler.
    pub fn route(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        match envelope.command {
            CommandName::HostPing => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({"pong": true}),
            )),
            CommandName::HostVersion => Ok(ResponseEnvelope::ok(
                envelope.request_id.clone(),
                serde_json::json!({
                    "contract_version": crate::host::contract::EVENT_VERSION,
                    "app_version": env!("CARGO_PKG_VERSION"),
                }),
            )),
            CommandName::RuntimeStatus => {
                let status = self.handler.query_runtime_status()?;
                Ok(ResponseEnvelope::ok(envelope.request_id.clone(), status))
            }
            CommandName::RuntimeStop => self.handle_runtime_stop(envelope),
            CommandName::ConversationSendText => self.handle_send_text(envelope),
            CommandName::ListeningToggle => self.handle_listening_toggle(envelope),
            CommandName::ActionWeather
            | CommandName::ActionNews
            | CommandName::ActionPlayMusic
            | CommandName::ActionMedications
            | CommandName::ActionEmergency => self.handle_action(envelope),
            CommandName::ConfigGet => self.handle_config_get(envelope),
            CommandName::ConfigPatch => self.handle_config_patch(envelope),
            CommandName::SettingsSave => self.handle_settings_save(envelope),
        }
    }

    fn handle_runtime_stop(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        self.handler.request_runtime_stop()?;
        self.emit_event(
            "runtime.stopping",
            serde_json::json!({"request_id": envelope.request_id}),
        );
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"accepted": true}),
        ))
    }

    fn handle_send_text(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let text = parse_text(&envelope.payload)?;
        self.handler.send_text(&text)?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"accepted": true}),
        ))
    }

    fn handle_listening_toggle(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let listening = self.handler.toggle_listening()?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"accepted": true, "listening": listening}),
        ))
    }

    fn handle_action(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let action = QuickAction::from_command(envelope.command).ok_or_else(|| {
            AuraError::Host(format!(
                "`{}` is not a quick action",
                envelope.command.as_str()
            ))
        })?;
        self.handler.run_action(action)?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"accepted": true, "action": action.as_str()}),
        ))
    }

    fn handle_config_get(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let key = envelope
            .payload
            .get("key")
            .and_then(serde_json::Value::as_str);
        let config = self.handler.query_config_get(key)?;
        Ok(ResponseEnvelope::ok(envelope.request_id.clone(), config))
    }

    fn handle_config_patch(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        let (key, value) = parse_config_patch(&envelope.payload)?;
        self.handler.request_config_patch(&key, &value)?;
        self.emit_event(
            "config.patched",
            serde_json::json!({"request_id": envelope.request_id, "key": key}),
        );
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"accepted": true, "key": key}),
        ))
    }

    fn handle_settings_save(&self, envelope: &CommandEnvelope) -> Result<ResponseEnvelope> {
        if !envelope.payload.is_object() {
            return Err(AuraError::Host(
                "settings.save requires an object payload".to_owned(),
            ));
        }
        self.handler.save_settings(&envelope.payload)?;
        Ok(ResponseEnvelope::ok(
            envelope.request_id.clone(),
            serde_json::json!({"accepted": true}),
        ))
    }

    fn emit_event(&self, event: &str, payload: serde_json::Value) {
        let _ = self.event_tx.send(EventEnvelope::fresh(event, payload));
    }
}

fn parse_text(payload: &serde_json::Value) -> Result<String> {
    let Some(raw) = payload.get("text").and_then(serde_json::Value::as_str) else {
        return Err(AuraError::Host(
            "conversation.send_text requires payload.text".to_owned(),
        ));
    };
    let text = raw.trim();
    if text.is_empty() {
        return Err(AuraError::Host(
            "conversation.send_text requires non-empty text".to_owned(),
        ));
    }
    Ok(text.to_owned())
}

fn parse_config_patch(payload: &serde_json::Value) -> Result<(String, serde_json::Value)> {
    let Some(key) = payload.get("key").and_then(serde_json::Value::as_str) else {
        return Err(AuraError::Host(
            "config.patch requires payload.key".to_owned(),
        ));
    };
    let Some(value) = payload.get("value") else {
        return Err(AuraError::Host(
            "config.patch requires payload.value".to_owned(),
        ));
    };
    Ok((key.trim().to_owned(), value.clone()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    impl Recording {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl HostCommandHandler for Recording {
        fn send_text(&self, text: &str) -> Result<()> {
            self.record(format!("text:{text}"));
            Ok(())
        }

        fn toggle_listening(&self) -> Result<bool> {
            self.record("toggle".into());
            Ok(true)
        }

        fn run_action(&self, action: QuickAction) -> Result<()> {
            self.record(format!("action:{}", action.as_str()));
            Ok(())
        }

        fn request_config_patch(&self, key: &str, value: &serde_json::Value) -> Result<()> {
            if key == "nope" {
                return Err(AuraError::Config("unknown config key `nope`".into()));
            }
            self.record(format!("patch:{key}={value}"));
            Ok(())
        }

        fn save_settings(&self, changes: &serde_json::Value) -> Result<()> {
            self.record(format!("settings:{changes}"));
            Ok(())
        }
    }

    fn server() -> HostCommandServer<Recording> {
        let (_client, server) = command_channel(4, 8, Recording::default());
        server
    }

    fn env(command: CommandName, payload: serde_json::Value) -> CommandEnvelope {
        CommandEnvelope::new("req-1", command, payload)
    }

    #[test]
    fn ping_and_version() {
        let s = server();
        let resp = s
            .route(&env(CommandName::HostPing, serde_json::Value::Null))
            .unwrap();
        assert_eq!(resp.payload, serde_json::json!({"pong": true}));

        let resp = s
            .route(&env(CommandName::HostVersion, serde_json::Value::Null))
            .unwrap();
        assert_eq!(resp.payload["contract_version"], 1);
    }

    #[test]
    fn send_text_requires_text() {
        let s = server();
        assert!(s
            .route(&env(CommandName::ConversationSendText, serde_json::json!({})))
            .is_err());
        assert!(s
            .route(&env(
                CommandName::ConversationSendText,
                serde_json::json!({"text": "   "})
            ))
            .is_err());
        s.route(&env(
            CommandName::ConversationSendText,
            serde_json::json!({"text": " what time is it "}),
        ))
        .unwrap();
        assert_eq!(
            s.handler.calls.lock().unwrap().as_slice(),
            ["text:what time is it"]
        );
    }

    #[test]
    fn quick_actions_map_to_handler() {
        let s = server();
        for command in [
            CommandName::ActionWeather,
            CommandName::ActionNews,
            CommandName::ActionPlayMusic,
            CommandName::ActionMedications,
            CommandName::ActionEmergency,
        ] {
            let resp = s.route(&env(command, serde_json::Value::Null)).unwrap();
            assert!(resp.ok);
        }
        assert_eq!(
            s.handler.calls.lock().unwrap().as_slice(),
            [
                "action:weather",
                "action:news",
                "action:play_music",
                "action:medications",
                "action:emergency"
            ]
        );
    }

    #[test]
    fn listening_toggle_reports_state() {
        let s = server();
        let resp = s
            .route(&env(CommandName::ListeningToggle, serde_json::Value::Null))
            .unwrap();
        assert_eq!(resp.payload["listening"], true);
    }

    #[test]
    fn config_patch_emits_event_and_propagates_errors() {
        let (client, s) = command_channel(4, 8, Recording::default());
        let mut events = client.subscribe_events();

        let resp = s
            .route(&env(
                CommandName::ConfigPatch,
                serde_json::json!({"key": "city", "value": "Leeds"}),
            ))
            .unwrap();
        assert_eq!(resp.payload["key"], "city");
        let event = events.try_recv().unwrap();
        assert_eq!(event.event, "config.patched");

        assert!(s
            .route(&env(
                CommandName::ConfigPatch,
                serde_json::json!({"key": "nope", "value": 1})
            ))
            .is_err());
        assert!(s
            .route(&env(CommandName::ConfigPatch, serde_json::json!({"key": "city"})))
            .is_err());
    }

    #[test]
    fn settings_save_forwards_only_sent_fields() {
        let s = server();
        s.route(&env(
            CommandName::SettingsSave,
            serde_json::json!({"user_name": "Rose"}),
        ))
        .unwrap();
        assert!(s
            .route(&env(CommandName::SettingsSave, serde_json::json!("Rose")))
            .is_err());
        assert_eq!(
            s.handler.calls.lock().unwrap().as_slice(),
            [r#"settings:{"user_name":"Rose"}"#]
        );
    }

    #[tokio::test]
    async fn client_round_trip_through_server_task() {
        let (client, server) = command_channel(4, 8, NoopHostHandler);
        tokio::spawn(server.run());

        let resp = client
            .send(env(CommandName::HostPing, serde_json::Value::Null))
            .await
            .unwrap();
        assert!(resp.ok);

        let mut bad = env(CommandName::HostPing, serde_json::Value::Null);
        bad.v = 0;
        assert!(client.send(bad).await.is_err());
    }
}
