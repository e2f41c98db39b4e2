//! Push-to-talk listening loop.
//!
//! Toggling on starts a session: open the microphone, then repeatedly
//! calibrate, wait for a phrase, and transcribe it until the session is
//! toggled off or the recognition service fails. Each session has an id so
//! a session that is still winding down never clobbers a newer one.

use crate::audio::{MicrophonePhraseSource, PhraseSource};
use crate::config::{AudioConfig, ListeningConfig};
use crate::error::Result;
use crate::speech::{SttError, Transcriber};
use crate::ui::{ListenState, Role, UiQueue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const STATUS_LISTENING: &str = "Listening...";
pub const STATUS_RECOGNIZING: &str = "Recognizing...";
pub const STATUS_READY: &str = "Ready";
pub const UNINTELLIGIBLE_MESSAGE: &str = "Could not understand audio.";

/// Opens the phrase source for a new session. Called on a blocking thread.
pub type MicrophoneOpener = Arc<dyn Fn() -> Result<Box<dyn PhraseSource>> + Send + Sync>;

/// Receives each recognized phrase.
pub type PhraseHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Opener for the system microphone.
#[must_use]
pub fn system_microphone(audio: AudioConfig, listening: ListeningConfig) -> MicrophoneOpener {
    Arc::new(move || {
        let source = MicrophonePhraseSource::open(&audio, &listening)?;
        Ok(Box::new(source) as Box<dyn PhraseSource>)
    })
}

struct Session {
    id: u64,
    cancel: CancellationToken,
}

/// The listening flag and the loop it controls.
pub struct Listener {
    ui: UiQueue,
    open_mic: MicrophoneOpener,
    transcriber: RwLock<Arc<dyn Transcriber>>,
    session: Mutex<Option<Session>>,
    next_id: AtomicU64,
}

impl Listener {
    pub fn new(ui: UiQueue, open_mic: MicrophoneOpener, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            ui,
            open_mic,
            transcriber: RwLock::new(transcriber),
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.lock().is_some()
    }

    /// Swap the recognizer. Takes effect from the next phrase.
    pub fn set_transcriber(&self, transcriber: Arc<dyn Transcriber>) {
        *self
            .transcriber
            .write()
            .unwrap_or_else(PoisonError::into_inner) = transcriber;
    }

    fn transcriber(&self) -> Arc<dyn Transcriber> {
        Arc::clone(&self.transcriber.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flip listening. Returns the new state.
    pub fn toggle(self: &Arc<Self>, runtime: &Handle, on_phrase: PhraseHandler) -> bool {
        if self.stop() {
            self.ui.listen_button(ListenState::Idle);
            self.ui.status(STATUS_READY);
            return false;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        *self.lock() = Some(Session {
            id,
            cancel: cancel.clone(),
        });
        self.ui.listen_button(ListenState::Listening);
        self.ui.status(STATUS_LISTENING);
        info!(session = id, "listening started");

        let this = Arc::clone(self);
        runtime.spawn(async move {
            this.run_session(id, cancel, on_phrase).await;
        });
        true
    }

    /// Cancel the current session, if any. Returns whether one was active.
    pub fn stop(&self) -> bool {
        match self.lock().take() {
            Some(session) => {
                session.cancel.cancel();
                info!(session = session.id, "listening stopped");
                true
            }
            None => false,
        }
    }

    /// Clear the session if it is still `id`. Returns whether it was.
    fn end_session(&self, id: u64) -> bool {
        let mut session = self.lock();
        if session.as_ref().is_some_and(|s| s.id == id) {
            session.take();
            return true;
        }
        false
    }

    async fn run_session(&self, id: u64, cancel: CancellationToken, on_phrase: PhraseHandler) {
        let opener = Arc::clone(&self.open_mic);
        let opened = tokio::task::spawn_blocking(move || opener()).await;
        match opened {
            Ok(Ok(source)) => self.listen_loop(source, &cancel, &on_phrase).await,
            Ok(Err(e)) => {
                warn!("microphone unavailable: {e}");
                self.ui.error_popup(format!("Microphone error: {e}"));
            }
            Err(e) => {
                warn!("microphone open task failed: {e}");
                self.ui.error_popup(format!("Microphone error: {e}"));
            }
        }

        if self.end_session(id) {
            self.ui.listen_button(ListenState::Idle);
            self.ui.status(STATUS_READY);
        }
        debug!(session = id, "listen loop exited");
    }

    async fn listen_loop(
        &self,
        mut source: Box<dyn PhraseSource>,
        cancel: &CancellationToken,
        on_phrase: &PhraseHandler,
    ) {
        while !cancel.is_cancelled() {
            self.ui.status(STATUS_LISTENING);

            let heard = tokio::select! {
                () = cancel.cancelled() => break,
                heard = async {
                    source.adjust_for_ambient_noise().await?;
                    source.listen().await
                } => heard,
            };
            let segment = match heard {
                Ok(Some(segment)) => segment,
                Ok(None) => continue,
                Err(e) => {
                    warn!("microphone failed: {e}");
                    self.ui.error_popup(format!("Microphone error: {e}"));
                    break;
                }
            };

            self.ui.status(STATUS_RECOGNIZING);
            let transcriber = self.transcriber();
            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = transcriber.transcribe(&segment) => result,
            };
            match result {
                Ok(text) => on_phrase(text),
                Err(SttError::Unintelligible) => {
                    self.ui.append(Role::System, UNINTELLIGIBLE_MESSAGE);
                }
                Err(SttError::Service(e)) => {
                    warn!("speech service failed: {e}");
                    self.ui
                        .append(Role::System, format!("Speech service error: {e}"));
                    break;
                }
            }
        }
    }
}
