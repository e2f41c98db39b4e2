//! End-to-end tests of the JSON host bridge driving a real assistant.
//!
//! Devices are replaced by in-memory doubles; everything else (router,
//! timers, config store, UI pump, event presenter) is the production path.

mod common;

use aura::host::stdio::EVENT_CAPACITY;
use aura::host::{AssistantHostHandler, HostEventPresenter, run_bridge};
use aura::ui::run_ui_pump;
use aura::{Assistant, AuraConfig, ConfigStore, ui_channel};
use common::MemorySpeaker;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

struct Session {
    input: DuplexStream,
    output: Lines<BufReader<DuplexStream>>,
    bridge: JoinHandle<aura::Result<()>>,
    assistant: Assistant,
    speaker: Arc<MemorySpeaker>,
    /// Lines read while looking for something else.
    skipped: Vec<Value>,
    _dir: tempfile::TempDir,
}

impl Session {
    async fn start(config: AuraConfig) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::with_config(dir.path().join("config.json"), config);
        let (ui, receiver) = ui_channel();
        let (parts, speaker) = common::test_parts();
        let assistant = Assistant::new(store, ui, parts).expect("assistant");

        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        tokio::spawn(run_ui_pump(
            receiver,
            HostEventPresenter::new(event_tx.clone()),
            Duration::from_millis(10),
            assistant.shutdown_token(),
        ));

        let (input, bridge_in) = tokio::io::duplex(64 * 1024);
        let (bridge_out, output) = tokio::io::duplex(64 * 1024);
        let bridge = tokio::spawn(run_bridge(
            BufReader::new(bridge_in),
            bridge_out,
            AssistantHostHandler::new(assistant.clone()),
            event_tx,
            assistant.shutdown_token(),
        ));

        Self {
            input,
            output: BufReader::new(output).lines(),
            bridge,
            assistant,
            speaker,
            skipped: Vec::new(),
            _dir: dir,
        }
    }

    async fn send(&mut self, request_id: &str, command: &str, payload: Value) {
        let line = json!({
            "v": 1,
            "request_id": request_id,
            "command": command,
            "payload": payload,
        })
        .to_string();
        self.input
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write command");
    }

    /// Next output line satisfying `pred`. Responses and events interleave,
    /// so lines that do not match are kept for later lookups.
    async fn next_where(&mut self, pred: impl Fn(&Value) -> bool) -> Value {
        if let Some(i) = self.skipped.iter().position(&pred) {
            return self.skipped.remove(i);
        }
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let line = self
                    .output
                    .next_line()
                    .await
                    .expect("read output")
                    .expect("bridge closed early");
                let value: Value = serde_json::from_str(&line).expect("json line");
                if pred(&value) {
                    return value;
                }
                self.skipped.push(value);
            }
        })
        .await
        .expect("timed out waiting for output")
    }

    async fn response(&mut self, request_id: &str) -> Value {
        self.next_where(|v| v["request_id"] == request_id && v.get("ok").is_some())
            .await
    }

    async fn event(&mut self, event: &str, pred: impl Fn(&Value) -> bool) -> Value {
        self.next_where(|v| v["event"] == event && pred(&v["payload"]))
            .await
    }
}

#[tokio::test]
async fn ping_and_status() {
    let mut s = Session::start(AuraConfig::default()).await;

    s.send("1", "host.ping", json!({})).await;
    let resp = s.response("1").await;
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["payload"]["pong"], true);

    s.send("2", "runtime.status", Value::Null).await;
    let resp = s.response("2").await;
    assert_eq!(resp["payload"]["listening"], false);
    assert_eq!(resp["payload"]["shutting_down"], false);
}

#[tokio::test]
async fn send_text_streams_transcript_events() {
    let mut s = Session::start(AuraConfig::default()).await;

    s.send("t1", "conversation.send_text", json!({"text": "tell me a joke"}))
        .await;
    assert_eq!(s.response("t1").await["ok"], true);

    let user = s
        .event("ui.append", |p| p["role"] == "user")
        .await;
    assert_eq!(user["payload"]["text"], "tell me a joke");

    let reply = s
        .event("ui.append", |p| p["role"] == "assistant")
        .await;
    let joke = reply["payload"]["text"].as_str().expect("text").to_owned();
    assert!(aura::services::jokes::JOKES.contains(&joke.as_str()));
    assert_eq!(s.speaker.spoken.lock().expect("lock").as_slice(), [joke]);
}

#[tokio::test]
async fn emergency_action_alerts_and_lists_contacts() {
    let mut config = AuraConfig::default();
    config.emergency_contacts = vec![aura::config::EmergencyContact {
        name: "Ann".into(),
        phone: "555-0101".into(),
        relation: "Daughter".into(),
    }];
    let mut s = Session::start(config).await;

    s.send("e1", "action.emergency", Value::Null).await;
    assert_eq!(s.response("e1").await["payload"]["action"], "emergency");

    s.event("ui.append", |p| p["role"] == "emergency").await;
    let call = s.event("ui.append", |p| p["role"] == "system").await;
    assert_eq!(call["payload"]["text"], "Simulating call to Ann (555-0101)...");
}

#[tokio::test]
async fn config_patch_and_get() {
    let mut s = Session::start(AuraConfig::default()).await;

    s.send("p1", "config.patch", json!({"key": "city", "value": "Leeds"}))
        .await;
    assert_eq!(s.response("p1").await["ok"], true);

    s.send("g1", "config.get", json!({"key": "city"})).await;
    assert_eq!(s.response("g1").await["payload"], "Leeds");

    s.send("p2", "config.patch", json!({"key": "nope", "value": 1}))
        .await;
    let resp = s.response("p2").await;
    assert_eq!(resp["ok"], false);
    assert!(resp["error"].as_str().expect("error").contains("nope"));
}

#[tokio::test]
async fn settings_save_applies_and_confirms() {
    let mut s = Session::start(AuraConfig::default()).await;

    s.send(
        "s1",
        "settings.save",
        json!({
            "user_name": "Rose",
            "city": "York",
            "theme": "Light",
            "font_size": 20.0,
            "voice_rate": 130.0,
            "voice_volume": 0.5,
            "medications": [{"name": "Aspirin", "times": "08:00"}]
        }),
    )
    .await;
    assert_eq!(s.response("s1").await["ok"], true);

    let appearance = s.event("ui.appearance", |_| true).await;
    assert_eq!(appearance["payload"]["user_name"], "Rose");
    assert_eq!(appearance["payload"]["theme"], "Light");
    s.event("ui.info_popup", |p| p["message"] == "Settings saved and applied.")
        .await;

    assert_eq!(s.assistant.config().city, "York");
    assert_eq!(s.assistant.status().medication_timers, 1);
}

#[tokio::test]
async fn partial_settings_save_keeps_contacts_and_keys() {
    let mut config = AuraConfig::default();
    config.api_keys.openai = "sk-live".into();
    config.voice_volume = 0.7;
    config.emergency_contacts = vec![aura::config::EmergencyContact {
        name: "Ann".into(),
        phone: "555-0101".into(),
        relation: "Daughter".into(),
    }];
    config
        .medication_schedule
        .insert("Aspirin".into(), vec!["08:00".into()]);
    let mut s = Session::start(config).await;

    s.send("s2", "settings.save", json!({"user_name": "Rose"}))
        .await;
    assert_eq!(s.response("s2").await["ok"], true);

    let saved = s.assistant.config();
    assert_eq!(saved.user_name, "Rose");
    assert_eq!(saved.api_keys.openai, "sk-live");
    assert_eq!(saved.emergency_contacts.len(), 1);
    assert_eq!(saved.medication_schedule["Aspirin"], vec!["08:00"]);
    assert!((saved.voice_volume - 0.7).abs() < 1e-6);
    assert_eq!(saved.font_size, AuraConfig::default().font_size);

    s.send("s3", "settings.save", json!({"font_size": "big"}))
        .await;
    assert_eq!(s.response("s3").await["ok"], false);
    assert_eq!(s.assistant.config().emergency_contacts.len(), 1);
}

#[tokio::test]
async fn runtime_stop_closes_assistant_and_bridge() {
    let mut s = Session::start(AuraConfig::default()).await;

    s.send("x", "runtime.stop", Value::Null).await;
    assert_eq!(s.response("x").await["ok"], true);

    s.bridge
        .await
        .expect("bridge task")
        .expect("bridge result");
    assert!(s.assistant.shutdown_token().is_cancelled());
}
