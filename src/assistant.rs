//! The assistant: command dispatch and the feature handlers.
//!
//! [`Assistant`] is a cheap handle (`Clone`) around shared state. Commands
//! run as tokio tasks and report only through the UI mailbox, so the
//! presentation surface never waits on speech, audio or the network.

use crate::audio::{CpalMusicPlayer, MusicPlayer};
use crate::config::{AuraConfig, ConfigStore};
use crate::error::{AuraError, Result};
use crate::listener::{Listener, MicrophoneOpener, PhraseHandler, system_microphone};
use crate::reminders::{self, Announcer, MedicationTimers, ReminderRequest, ReminderTimers};
use crate::router::{self, Intent};
use crate::services::{Endpoints, NewsOutcome, Services, SystemOpener, UrlOpener, jokes};
use crate::settings::{SAVED_MESSAGE, SettingsForm};
use crate::speech::{ApiTranscriber, Speaker, Transcriber, default_speaker};
use crate::ui::{Role, UiQueue, UiUpdate};
use chrono::{Local, NaiveDateTime, Timelike};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Delay between saying goodbye and shutting down.
pub const EXIT_DELAY: Duration = Duration::from_millis(800);

pub const EMERGENCY_TRIGGER_MESSAGE: &str = "Triggering emergency protocol.";
pub const EMERGENCY_ALERT: &str =
    "Emergency assistance requested! Contacting emergency contacts...";
pub const EMERGENCY_SPOKEN: &str = "Emergency! Assistance requested!";
pub const NO_CONTACTS_MESSAGE: &str =
    "No emergency contacts configured. Please add them in Settings.";
pub const NO_MUSIC_MESSAGE: &str = "No music files configured. Add some in Settings.";
pub const NO_MEDICATIONS_MESSAGE: &str =
    "You don't have any medications scheduled. Add them in Settings.";
pub const HEADLINES_SPOKEN: &str = "Here are the top headlines.";
pub const NO_ANSWER_MESSAGE: &str = "Sorry, I couldn't find an answer.";
pub const NO_ANSWER_SPOKEN: &str = "Sorry, I couldn't find an answer to that.";
pub const GOODBYE: &str = "Goodbye!";

/// Where speech recognition comes from.
pub enum TranscriberSource {
    /// Build an [`ApiTranscriber`] from the `stt` config section, and
    /// rebuild it whenever settings change.
    FromConfig,
    /// Use this transcriber as is.
    Fixed(Arc<dyn Transcriber>),
}

/// Collaborators the assistant drives.
pub struct AssistantParts {
    pub speaker: Arc<dyn Speaker>,
    pub player: Arc<dyn MusicPlayer>,
    pub opener: Arc<dyn UrlOpener>,
    pub microphone: MicrophoneOpener,
    pub transcriber: TranscriberSource,
    pub endpoints: Endpoints,
}

impl AssistantParts {
    /// Real devices: the platform speech engine, the default audio devices,
    /// the system URL opener and API speech recognition.
    #[must_use]
    pub fn system(config: &AuraConfig, ui: &UiQueue) -> Self {
        Self {
            speaker: default_speaker(config.voice_rate, config.voice_volume, ui),
            player: Arc::new(CpalMusicPlayer::new(&config.audio)),
            opener: Arc::new(SystemOpener),
            microphone: system_microphone(config.audio.clone(), config.listening.clone()),
            transcriber: TranscriberSource::FromConfig,
            endpoints: Endpoints::default(),
        }
    }
}

/// Snapshot reported by `runtime.status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeStatus {
    pub listening: bool,
    pub music_playing: bool,
    pub medication_timers: usize,
    pub pending_reminders: usize,
    pub shutting_down: bool,
}

struct Inner {
    config: RwLock<ConfigStore>,
    ui: UiQueue,
    speaker: Arc<dyn Speaker>,
    player: Arc<dyn MusicPlayer>,
    opener: Arc<dyn UrlOpener>,
    services: RwLock<Services>,
    listener: Arc<Listener>,
    stt_from_config: bool,
    medications: MedicationTimers,
    reminders: ReminderTimers,
    runtime: Handle,
    shutdown: CancellationToken,
}

/// Handle to the running assistant.
#[derive(Clone)]
pub struct Assistant {
    inner: Arc<Inner>,
}

fn transcriber_from_config(config: &AuraConfig) -> Result<Arc<dyn Transcriber>> {
    let key = config.stt_key().unwrap_or_default();
    let transcriber = ApiTranscriber::new(config.stt.clone(), key)
        .map_err(|e| AuraError::Stt(e.to_string()))?;
    Ok(Arc::new(transcriber))
}

impl Assistant {
    /// Wire everything up and arm the medication timers. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no runtime or an HTTP client cannot be
    /// built.
    pub fn new(store: ConfigStore, ui: UiQueue, parts: AssistantParts) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| AuraError::Channel(format!("no tokio runtime: {e}")))?;
        let config = store.data().clone();

        let services = Services::new(&parts.endpoints, config.llm.clone())?;
        let (transcriber, stt_from_config) = match parts.transcriber {
            TranscriberSource::FromConfig => (transcriber_from_config(&config)?, true),
            TranscriberSource::Fixed(t) => (t, false),
        };
        let listener = Arc::new(Listener::new(ui.clone(), parts.microphone, transcriber));

        let announce: Announcer = {
            let ui = ui.clone();
            let speaker = Arc::clone(&parts.speaker);
            Arc::new(move |message: String, interrupt: bool| {
                ui.append(Role::Assistant, message.clone());
                speaker.speak(&message, interrupt);
            })
        };

        parts
            .speaker
            .set_voice(config.voice_rate, config.voice_volume);

        let inner = Inner {
            config: RwLock::new(store),
            speaker: parts.speaker,
            player: parts.player,
            opener: parts.opener,
            services: RwLock::new(services),
            listener,
            stt_from_config,
            medications: MedicationTimers::new(runtime.clone(), Arc::clone(&announce)),
            reminders: ReminderTimers::new(runtime.clone(), announce),
            runtime,
            shutdown: CancellationToken::new(),
            ui,
        };
        inner.medications.reschedule(&config.medication_schedule);

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    fn read_config(&self) -> RwLockReadGuard<'_, ConfigStore> {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, ConfigStore> {
        self.inner
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current configuration.
    #[must_use]
    pub fn config(&self) -> AuraConfig {
        self.read_config().data().clone()
    }

    /// Dotted-path read of the configuration.
    #[must_use]
    pub fn config_value(&self, key_path: &str) -> Option<serde_json::Value> {
        self.read_config().get(key_path)
    }

    fn services(&self) -> Services {
        self.inner
            .services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn ui(&self) -> &UiQueue {
        &self.inner.ui
    }

    /// Fires once [`close`](Self::close) has run.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.inner.listener.is_listening()
    }

    #[must_use]
    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            listening: self.is_listening(),
            music_playing: self.inner.player.is_playing(),
            medication_timers: self.inner.medications.armed(),
            pending_reminders: self.inner.reminders.pending(),
            shutting_down: self.inner.shutdown.is_cancelled(),
        }
    }

    /// Append an assistant line and speak it.
    fn reply(&self, text: &str) {
        self.inner.ui.append(Role::Assistant, text);
        self.inner.speaker.speak(text, false);
    }

    fn say(&self, text: &str) {
        self.inner.ui.append(Role::Assistant, text);
    }

    // ── Greeting ──────────────────────────────────────────────

    /// Time-of-day greeting, appended and spoken.
    pub fn greet(&self) -> String {
        let greeting = greeting_for(Local::now().hour(), &self.read_config().data().user_name);
        self.reply(&greeting);
        greeting
    }

    // ── Command entry points ──────────────────────────────────

    /// Handle typed or recognized text: record it and dispatch in the
    /// background. Blank input is ignored.
    pub fn submit_text(&self, text: &str) -> Option<JoinHandle<()>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.inner.ui.append(Role::User, text);
        Some(self.dispatch(text.to_owned()))
    }

    /// Handle a phrase recognized from the microphone. Same as
    /// [`submit_text`](Self::submit_text), but the line is marked as heard.
    pub fn submit_heard(&self, text: &str) -> Option<JoinHandle<()>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.inner.ui.heard(text);
        Some(self.dispatch(text.to_owned()))
    }

    /// Run a command on the runtime without recording it.
    pub fn dispatch(&self, command: String) -> JoinHandle<()> {
        let this = self.clone();
        self.inner.runtime.spawn(async move {
            this.handle_command(&command).await;
        })
    }

    /// Run one handler directly, as the quick-action buttons do.
    ///
    /// Emergency skips the spoken-command preamble and the medication
    /// schedule is shown without being spoken.
    pub fn trigger(&self, intent: Intent) -> JoinHandle<()> {
        let this = self.clone();
        self.inner.runtime.spawn(async move {
            match intent {
                Intent::Emergency => this.emergency_protocol(),
                Intent::Medication => {
                    let text = this.show_medication_schedule();
                    this.say(&text);
                }
                _ => this.handle_intent(intent, "").await,
            }
        })
    }

    /// Route and execute one command, reporting any failure to the
    /// transcript.
    pub async fn handle_command(&self, command: &str) {
        self.handle_intent(router::classify(command), command).await;
    }

    async fn handle_intent(&self, intent: Intent, command: &str) {
        debug!(?intent, "routing command");
        if let Err(e) = self.execute(intent, command).await {
            error!("command failed: {e}");
            self.say(&format!("An error occurred: {e}"));
        }
    }

    async fn execute(&self, intent: Intent, command: &str) -> Result<()> {
        match intent {
            Intent::Emergency => {
                self.say(EMERGENCY_TRIGGER_MESSAGE);
                self.emergency_protocol();
            }
            Intent::Time => self.reply(&time_sentence(Local::now().naive_local())),
            Intent::Date => self.reply(&date_sentence(Local::now().naive_local())),
            Intent::Weather => {
                let text = self.weather_report().await;
                self.reply(&text);
            }
            Intent::News => self.read_news().await,
            Intent::Joke => self.reply(jokes::random_joke()),
            Intent::PlayMusic => self.play_music_from_favorites().await,
            Intent::Reminder => {
                let text = self.add_reminder(&router::normalize(command));
                self.reply(&text);
            }
            Intent::Medication => {
                let text = self.show_medication_schedule();
                self.reply(&text);
            }
            Intent::OpenWebsite => self.open_website(command).await?,
            Intent::Exit => {
                self.reply(GOODBYE);
                tokio::time::sleep(EXIT_DELAY).await;
                self.close();
            }
            Intent::Fallback => self.answer_question(command).await,
        }
        Ok(())
    }

    // ── Handlers ──────────────────────────────────────────────

    /// Current weather sentence (or the reason there is none).
    pub async fn weather_report(&self) -> String {
        let (city, key) = {
            let config = self.read_config();
            let data = config.data();
            (data.city.clone(), data.api_keys.openweathermap.clone())
        };
        self.services().weather.report(&city, &key).await
    }

    /// Show the headlines; speak a short lead-in when there are any.
    pub async fn read_news(&self) {
        let key = self.read_config().data().api_keys.newsapi.clone();
        let outcome = self.services().news.report(&key).await;
        self.say(outcome.text());
        match &outcome {
            NewsOutcome::Headlines(_) => self.inner.speaker.speak(HEADLINES_SPOKEN, false),
            NewsOutcome::Message(text) => self.inner.speaker.speak(text, false),
        }
    }

    /// Alert the user and simulate calling every emergency contact.
    pub fn emergency_protocol(&self) {
        warn!("emergency protocol triggered");
        self.inner.ui.append(Role::Emergency, EMERGENCY_ALERT);
        self.inner.speaker.speak(EMERGENCY_SPOKEN, true);

        let contacts = self.read_config().data().emergency_contacts.clone();
        if contacts.is_empty() {
            self.say(NO_CONTACTS_MESSAGE);
            return;
        }
        for contact in contacts {
            info!(contact = %contact.name, "simulating emergency call");
            self.inner.ui.append(
                Role::System,
                format!("Simulating call to {} ({})...", contact.name, contact.phone),
            );
        }
    }

    /// Play a random favorite track.
    pub async fn play_music_from_favorites(&self) {
        let choice = {
            let config = self.read_config();
            let mut rng = rand::thread_rng();
            config.data().favorites.music.choose(&mut rng).cloned()
        };
        let Some(track) = choice else {
            self.say(NO_MUSIC_MESSAGE);
            return;
        };

        let player = Arc::clone(&self.inner.player);
        let path = track.clone();
        let started = tokio::task::spawn_blocking(move || player.play(Path::new(&path)))
            .await
            .map_err(|e| AuraError::Audio(e.to_string()))
            .and_then(|r| r);
        match started {
            Ok(()) => {
                let name = Path::new(&track)
                    .file_name()
                    .map_or_else(|| track.clone(), |n| n.to_string_lossy().into_owned());
                self.say(&format!("Now playing: {name}"));
            }
            Err(e) => {
                warn!(track = %track, "music playback failed: {e}");
                self.say(&format!("Could not play music: {e}"));
            }
        }
    }

    /// Medication schedule as shown to the user.
    #[must_use]
    pub fn show_medication_schedule(&self) -> String {
        medication_schedule_text(&self.read_config().data().medication_schedule)
    }

    /// Parse a reminder command, arm its timer, and return the reply.
    pub fn add_reminder(&self, command: &str) -> String {
        let request = reminders::parse_reminder(command);
        if let ReminderRequest::Timed { task, time, .. } = &request {
            let delay = reminders::delay_until(Local::now().naive_local(), *time);
            self.inner.reminders.arm(delay, task);
        }
        request.reply()
    }

    async fn open_website(&self, command: &str) -> Result<()> {
        let target = router::website_target(command);
        let opener = Arc::clone(&self.inner.opener);
        let url = target.clone();
        tokio::task::spawn_blocking(move || opener.open(&url))
            .await
            .map_err(|e| AuraError::Channel(e.to_string()))??;
        self.say(&format!("Opening {target}"));
        Ok(())
    }

    /// LLM first (when a key is configured), then the encyclopedia.
    async fn answer_question(&self, command: &str) {
        let services = self.services();
        let key = self.read_config().data().openai_key().map(str::to_owned);
        if let Some(key) = key {
            match services.llm.ask(&key, command).await {
                Ok(answer) => {
                    self.reply(&answer);
                    return;
                }
                Err(e) => warn!("llm fallback failed: {e}"),
            }
        }

        match services.encyclopedia.summary(command.trim()).await {
            Ok(summary) => self.reply(&summary),
            Err(e) => {
                debug!("encyclopedia lookup failed: {e}");
                self.say(NO_ANSWER_MESSAGE);
                self.inner.speaker.speak(NO_ANSWER_SPOKEN, false);
            }
        }
    }

    // ── Listening ─────────────────────────────────────────────

    /// Start or stop push-to-talk. Returns whether listening is now on.
    pub fn toggle_listening(&self) -> bool {
        let this = self.clone();
        let on_phrase: PhraseHandler = Arc::new(move |text: String| {
            this.submit_heard(&text);
        });
        self.inner
            .listener
            .toggle(&self.inner.runtime, on_phrase)
    }

    // ── Settings ──────────────────────────────────────────────

    /// Push the current settings to the surface, the speaker, the timers and
    /// the remote services.
    pub fn apply_settings_changes(&self) {
        let config = self.config();
        self.inner.ui.push(UiUpdate::Appearance {
            user_name: config.user_name.clone(),
            theme: config.theme,
            font_size: config.font_size,
        });
        self.inner
            .speaker
            .set_voice(config.voice_rate, config.voice_volume);
        self.inner
            .medications
            .reschedule(&config.medication_schedule);
        self.inner
            .services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .llm
            .set_config(config.llm.clone());
        if self.inner.stt_from_config {
            match transcriber_from_config(&config) {
                Ok(t) => self.inner.listener.set_transcriber(t),
                Err(e) => warn!("keeping previous transcriber: {e}"),
            }
        }
        info!("settings applied");
    }

    /// Fold the settings form into the config, save it, and apply it.
    ///
    /// # Errors
    ///
    /// Returns an error (also shown as an error popup) if the file cannot
    /// be written. The in-memory config is left unchanged in that case.
    pub fn save_settings(&self, form: &SettingsForm) -> Result<()> {
        self.commit_settings(|_| Ok(form.clone()))
    }

    /// Like [`save_settings`](Self::save_settings), but only the fields
    /// present in `changes` are replaced; the rest keep their saved values.
    ///
    /// # Errors
    ///
    /// Returns an error if `changes` is not a valid partial form or the file
    /// cannot be written.
    pub fn update_settings(&self, changes: &serde_json::Value) -> Result<()> {
        self.commit_settings(|current| SettingsForm::from_config(current).merged_with(changes))
    }

    fn commit_settings(
        &self,
        form_for: impl FnOnce(&AuraConfig) -> Result<SettingsForm>,
    ) -> Result<()> {
        {
            let mut store = self.write_config();
            let form = form_for(store.data())?;
            let mut updated = store.data().clone();
            form.apply_to(&mut updated);
            let candidate = ConfigStore::with_config(store.path().to_path_buf(), updated);
            if let Err(e) = candidate.save() {
                error!("saving settings failed: {e}");
                self.inner
                    .ui
                    .error_popup(format!("Error saving settings: {e}"));
                return Err(e);
            }
            *store = candidate;
        }
        self.apply_settings_changes();
        self.inner.ui.info_popup(SAVED_MESSAGE);
        Ok(())
    }

    /// Set one dotted config key, save, and apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or value is invalid or the file cannot
    /// be written.
    pub fn patch_config(&self, key_path: &str, value: serde_json::Value) -> Result<()> {
        {
            let mut store = self.write_config();
            let mut candidate = store.clone();
            candidate.set(key_path, value)?;
            candidate.save()?;
            *store = candidate;
        }
        self.apply_settings_changes();
        Ok(())
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Stop listening, speech, music and timers, then signal the surface.
    pub fn close(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        info!("assistant closing");
        self.inner.listener.stop();
        self.inner.speaker.stop();
        self.inner.player.stop();
        self.inner.medications.cancel_all();
        self.inner.reminders.cancel_all();
        self.inner.shutdown.cancel();
    }
}

/// `"{part}, {name}. I'm AURA, how can I help you today?"`
#[must_use]
pub fn greeting_for(hour: u32, name: &str) -> String {
    let part = match hour {
        5..=11 => "Good morning",
        12..=17 => "Good afternoon",
        _ => "Good evening",
    };
    format!("{part}, {name}. I'm AURA, how can I help you today?")
}

/// `"The time is 03:07 PM."`
#[must_use]
pub fn time_sentence(now: NaiveDateTime) -> String {
    format!("The time is {}.", now.format("%I:%M %p"))
}

/// `"Today is Monday, March 04, 2024."`
#[must_use]
pub fn date_sentence(now: NaiveDateTime) -> String {
    format!("Today is {}.", now.format("%A, %B %d, %Y"))
}

/// The medication schedule listing, or the empty-schedule message.
#[must_use]
pub fn medication_schedule_text(
    schedule: &std::collections::BTreeMap<String, Vec<String>>,
) -> String {
    if schedule.is_empty() {
        return NO_MEDICATIONS_MESSAGE.to_owned();
    }
    let mut text = String::from("Your medication schedule:");
    for (med, times) in schedule {
        text.push_str(&format!("\n - {med}: {}", times.join(", ")));
    }
    text
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::audio::PhraseSource;
    use crate::audio::playback::testing::RecordingPlayer;
    use crate::config::EmergencyContact;
    use crate::services::browser::testing::RecordingOpener;
    use crate::speech::speaker::testing::RecordingSpeaker;
    use crate::speech::SttError;
    use crate::ui::{UiReceiver, ui_channel};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    struct NoTranscriber;

    #[async_trait]
    impl Transcriber for NoTranscriber {
        async fn transcribe(
            &self,
            _segment: &crate::audio::SpeechSegment,
        ) -> std::result::Result<String, SttError> {
            Err(SttError::Unintelligible)
        }
    }

    struct Harness {
        assistant: Assistant,
        rx: UiReceiver,
        speaker: Arc<RecordingSpeaker>,
        player: Arc<RecordingPlayer>,
        opener: Arc<RecordingOpener>,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(config: AuraConfig) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = ConfigStore::with_config(dir.path().join("config.json"), config);
            let (ui, rx) = ui_channel();
            let speaker = Arc::new(RecordingSpeaker::default());
            let player = Arc::new(RecordingPlayer::default());
            let opener = Arc::new(RecordingOpener::default());
            let parts = AssistantParts {
                speaker: speaker.clone(),
                player: player.clone(),
                opener: opener.clone(),
                microphone: Arc::new(|| -> Result<Box<dyn PhraseSource>> {
                    Err(AuraError::Audio("no microphone".into()))
                }),
                transcriber: TranscriberSource::Fixed(Arc::new(NoTranscriber)),
                endpoints: Endpoints::under("http://127.0.0.1:9"),
            };
            let assistant = Assistant::new(store, ui, parts).unwrap();
            Self {
                assistant,
                rx,
                speaker,
                player,
                opener,
                dir,
            }
        }

        async fn run(&self, command: &str) -> Vec<UiUpdate> {
            self.assistant.handle_command(command).await;
            self.rx.drain()
        }
    }

    fn assistant_lines(updates: &[UiUpdate]) -> Vec<String> {
        updates
            .iter()
            .filter_map(|u| match u {
                UiUpdate::Append {
                    role: Role::Assistant,
                    text,
                } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn greeting_by_hour() {
        assert_eq!(
            greeting_for(5, "Rose"),
            "Good morning, Rose. I'm AURA, how can I help you today?"
        );
        assert!(greeting_for(11, "R").starts_with("Good morning"));
        assert!(greeting_for(12, "R").starts_with("Good afternoon"));
        assert!(greeting_for(17, "R").starts_with("Good afternoon"));
        assert!(greeting_for(18, "R").starts_with("Good evening"));
        assert!(greeting_for(4, "R").starts_with("Good evening"));
    }

    #[test]
    fn time_and_date_formats() {
        assert_eq!(time_sentence(at(15, 7)), "The time is 03:07 PM.");
        assert_eq!(time_sentence(at(0, 30)), "The time is 12:30 AM.");
        assert_eq!(date_sentence(at(9, 0)), "Today is Monday, March 04, 2024.");
    }

    #[test]
    fn schedule_text() {
        let mut schedule = BTreeMap::new();
        assert_eq!(medication_schedule_text(&schedule), NO_MEDICATIONS_MESSAGE);
        schedule.insert("Aspirin".to_owned(), vec!["08:00".to_owned(), "20:00".to_owned()]);
        schedule.insert("Vitamin D".to_owned(), vec!["09:00".to_owned()]);
        assert_eq!(
            medication_schedule_text(&schedule),
            "Your medication schedule:\n - Aspirin: 08:00, 20:00\n - Vitamin D: 09:00"
        );
    }

    #[tokio::test]
    async fn submit_text_records_user_line_and_ignores_blank() {
        let h = Harness::new(AuraConfig::default());
        assert!(h.assistant.submit_text("   ").is_none());
        assert!(h.rx.drain().is_empty());

        let handle = h.assistant.submit_text("  tell me a joke ").unwrap();
        handle.await.unwrap();
        let updates = h.rx.drain();
        assert_eq!(
            updates[0],
            UiUpdate::Append {
                role: Role::User,
                text: "tell me a joke".into()
            }
        );
        let lines = assistant_lines(&updates);
        assert_eq!(lines.len(), 1);
        assert!(jokes::JOKES.contains(&lines[0].as_str()));
        assert_eq!(h.speaker.texts(), lines);
    }

    #[tokio::test]
    async fn emergency_with_contacts_simulates_calls() {
        let mut config = AuraConfig::default();
        config.emergency_contacts = vec![EmergencyContact {
            name: "Ann".into(),
            phone: "555-0101".into(),
            relation: "Daughter".into(),
        }];
        let h = Harness::new(config);
        let updates = h.run("I had a fall").await;

        assert_eq!(
            updates,
            vec![
                UiUpdate::Append {
                    role: Role::Assistant,
                    text: EMERGENCY_TRIGGER_MESSAGE.into()
                },
                UiUpdate::Append {
                    role: Role::Emergency,
                    text: EMERGENCY_ALERT.into()
                },
                UiUpdate::Append {
                    role: Role::System,
                    text: "Simulating call to Ann (555-0101)...".into()
                },
            ]
        );
        let spoken = h.speaker.spoken.lock().unwrap().clone();
        assert_eq!(spoken, vec![(EMERGENCY_SPOKEN.to_owned(), true)]);
    }

    #[tokio::test]
    async fn emergency_without_contacts() {
        let h = Harness::new(AuraConfig::default());
        let updates = h.run("help").await;
        assert_eq!(
            assistant_lines(&updates),
            vec![EMERGENCY_TRIGGER_MESSAGE, NO_CONTACTS_MESSAGE]
        );
    }

    #[tokio::test]
    async fn weather_without_key_says_so() {
        let h = Harness::new(AuraConfig::default());
        let updates = h.run("what's the weather like").await;
        assert_eq!(
            assistant_lines(&updates),
            vec![crate::services::weather::NO_KEY_MESSAGE]
        );
        assert_eq!(
            h.speaker.texts(),
            vec![crate::services::weather::NO_KEY_MESSAGE]
        );
    }

    #[tokio::test]
    async fn news_without_key_speaks_the_message() {
        let h = Harness::new(AuraConfig::default());
        h.run("any news").await;
        assert_eq!(h.speaker.texts(), vec![crate::services::news::NO_KEY_MESSAGE]);
    }

    #[tokio::test]
    async fn music_without_favorites() {
        let h = Harness::new(AuraConfig::default());
        let updates = h.run("play music").await;
        assert_eq!(assistant_lines(&updates), vec![NO_MUSIC_MESSAGE]);
        assert!(h.player.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn music_plays_a_favorite() {
        let mut config = AuraConfig::default();
        config.favorites.music = vec!["/music/moon river.mp3".into()];
        let h = Harness::new(config);
        let updates = h.run("play song").await;
        assert_eq!(
            assistant_lines(&updates),
            vec!["Now playing: moon river.mp3"]
        );
        assert_eq!(h.player.played.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn music_failure_is_reported() {
        let mut config = AuraConfig::default();
        config.favorites.music = vec!["/music/broken.mp3".into()];
        let h = Harness::new(config);
        let updates = h.run("play music").await;
        let lines = assistant_lines(&updates);
        assert!(lines[0].starts_with("Could not play music: "));
    }

    #[tokio::test]
    async fn reminder_replies() {
        let h = Harness::new(AuraConfig::default());
        let updates = h.run("Remind me to call Sam at 18:00").await;
        assert_eq!(
            assistant_lines(&updates),
            vec!["Okay, I'll remind you to call sam at 18:00."]
        );
        assert_eq!(h.assistant.status().pending_reminders, 1);

        let updates = h.run("set a reminder").await;
        assert_eq!(assistant_lines(&updates), vec![reminders::USAGE_MESSAGE]);
    }

    #[tokio::test]
    async fn medication_schedule_is_shown_once() {
        let mut config = AuraConfig::default();
        config
            .medication_schedule
            .insert("Aspirin".into(), vec!["08:00".into()]);
        let h = Harness::new(config);
        let updates = h.run("which pills today").await;
        assert_eq!(
            assistant_lines(&updates),
            vec!["Your medication schedule:\n - Aspirin: 08:00"]
        );
        assert_eq!(h.assistant.status().medication_timers, 1);
    }

    #[tokio::test]
    async fn open_website_uses_opener() {
        let h = Harness::new(AuraConfig::default());
        let updates = h.run("open example.com").await;
        assert_eq!(
            assistant_lines(&updates),
            vec!["Opening https://example.com"]
        );
        assert_eq!(
            h.opener.opened.lock().unwrap().as_slice(),
            ["https://example.com"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exit_says_goodbye_then_closes() {
        let h = Harness::new(AuraConfig::default());
        let token = h.assistant.shutdown_token();
        let updates = h.run("goodbye").await;
        assert_eq!(assistant_lines(&updates), vec![GOODBYE]);
        assert!(token.is_cancelled());
        assert_eq!(*h.player.stops.lock().unwrap(), 1);
        assert!(h.assistant.status().shutting_down);
    }

    #[tokio::test]
    async fn trigger_runs_handler_without_user_line() {
        let h = Harness::new(AuraConfig::default());
        h.assistant.trigger(Intent::Medication).await.unwrap();
        let updates = h.rx.drain();
        assert_eq!(
            updates,
            vec![UiUpdate::Append {
                role: Role::Assistant,
                text: NO_MEDICATIONS_MESSAGE.into()
            }]
        );
        assert!(h.speaker.texts().is_empty());
    }

    #[tokio::test]
    async fn emergency_button_alerts_without_preamble() {
        let h = Harness::new(AuraConfig::default());
        h.assistant.trigger(Intent::Emergency).await.unwrap();
        let updates = h.rx.drain();
        assert_eq!(
            updates.first(),
            Some(&UiUpdate::Append {
                role: Role::Emergency,
                text: EMERGENCY_ALERT.into()
            })
        );
        assert!(!updates.iter().any(|u| matches!(
            u,
            UiUpdate::Append { text, .. } if text == EMERGENCY_TRIGGER_MESSAGE
        )));
        assert_eq!(
            *h.speaker.spoken.lock().unwrap(),
            vec![(EMERGENCY_SPOKEN.to_owned(), true)]
        );
    }

    #[tokio::test]
    async fn heard_phrase_is_marked_and_dispatched() {
        let h = Harness::new(AuraConfig::default());
        h.assistant
            .submit_heard(" tell me a joke ")
            .unwrap()
            .await
            .unwrap();
        let updates = h.rx.drain();
        assert_eq!(updates[0], UiUpdate::Heard("tell me a joke".into()));
        assert_eq!(assistant_lines(&updates).len(), 1);
        assert!(h.assistant.submit_heard("   ").is_none());
    }

    #[tokio::test]
    async fn unanswerable_question_falls_back_to_sorry() {
        let h = Harness::new(AuraConfig::default());
        let updates = h.run("who was the first person on mars").await;
        assert_eq!(assistant_lines(&updates), vec![NO_ANSWER_MESSAGE]);
        assert_eq!(h.speaker.texts(), vec![NO_ANSWER_SPOKEN]);
    }

    #[tokio::test]
    async fn save_settings_persists_and_applies() {
        let h = Harness::new(AuraConfig::default());
        let mut form = SettingsForm::from_config(&h.assistant.config());
        form.user_name = "Rose".into();
        form.voice_rate = 120.0;
        form.medications = vec![crate::settings::MedicationRow {
            name: "Insulin".into(),
            times: "07:30, 19:30".into(),
        }];

        h.assistant.save_settings(&form).unwrap();

        let config = h.assistant.config();
        assert_eq!(config.user_name, "Rose");
        let path = h.dir.path().join("config.json");
        let on_disk = AuraConfig::from_file(&path).unwrap();
        assert_eq!(on_disk, config);

        let updates = h.rx.drain();
        assert!(updates.iter().any(|u| matches!(
            u,
            UiUpdate::Appearance { user_name, .. } if user_name == "Rose"
        )));
        assert_eq!(
            updates.last(),
            Some(&UiUpdate::InfoPopup(SAVED_MESSAGE.into()))
        );
        assert_eq!(*h.speaker.voice.lock().unwrap(), Some((120, 1.0)));
        assert_eq!(h.assistant.status().medication_timers, 2);
    }

    #[tokio::test]
    async fn patch_config_rejects_unknown_keys() {
        let h = Harness::new(AuraConfig::default());
        assert!(h.assistant.patch_config("nope", serde_json::json!(1)).is_err());
        h.assistant
            .patch_config("city", serde_json::json!("Leeds"))
            .unwrap();
        assert_eq!(h.assistant.config().city, "Leeds");
    }

    #[tokio::test]
    async fn toggle_listening_reports_microphone_error() {
        let h = Harness::new(AuraConfig::default());
        assert!(h.assistant.toggle_listening());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!h.assistant.is_listening());
        let updates = h.rx.drain();
        assert!(updates.iter().any(|u| matches!(u, UiUpdate::ErrorPopup(m) if m.starts_with("Microphone error"))));
    }
}
