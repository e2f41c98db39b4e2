//! Text-to-speech through the platform speech command.
//!
//! Utterances run one at a time on a dedicated worker thread, so callers
//! never block and speech never overlaps.

use crate::error::{AuraError, Result};
use crate::ui::{Role, UiQueue};
use crossbeam_channel::{Receiver, Sender};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Speech output.
pub trait Speaker: Send + Sync {
    /// Queue `text`. With `interrupt`, the current utterance is cut off and
    /// anything still queued is dropped first.
    fn speak(&self, text: &str, interrupt: bool);

    /// Silence the current utterance and drop the queue.
    fn stop(&self);

    /// Words per minute and volume (0.0-1.0) for following utterances.
    fn set_voice(&self, rate: u32, volume: f32);
}

/// A speech command found on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEngine {
    EspeakNg(PathBuf),
    Espeak(PathBuf),
    SpdSay(PathBuf),
    Say(PathBuf),
}

impl SpeechEngine {
    /// First available engine, in order `espeak-ng`, `espeak`, `spd-say`,
    /// `say`.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Tts`] when none is installed.
    pub fn detect() -> Result<Self> {
        let candidates: [(&str, fn(PathBuf) -> Self); 4] = [
            ("espeak-ng", Self::EspeakNg),
            ("espeak", Self::Espeak),
            ("spd-say", Self::SpdSay),
            ("say", Self::Say),
        ];
        for (name, make) in candidates {
            if let Ok(path) = which::which(name) {
                return Ok(make(path));
            }
        }
        Err(AuraError::Tts(
            "no speech engine found (install espeak-ng, espeak or speech-dispatcher)".into(),
        ))
    }

    fn program(&self) -> &Path {
        match self {
            Self::EspeakNg(p) | Self::Espeak(p) | Self::SpdSay(p) | Self::Say(p) => p,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::EspeakNg(_) => "espeak-ng",
            Self::Espeak(_) => "espeak",
            Self::SpdSay(_) => "spd-say",
            Self::Say(_) => "say",
        }
    }

    /// Arguments for one utterance.
    #[must_use]
    pub fn args(&self, text: &str, rate: u32, volume: f32) -> Vec<String> {
        let volume = volume.clamp(0.0, 1.0);
        match self {
            Self::EspeakNg(_) | Self::Espeak(_) => vec![
                "-s".into(),
                rate.to_string(),
                "-a".into(),
                ((volume * 100.0).round() as u32).to_string(),
                "--".into(),
                text.into(),
            ],
            Self::SpdSay(_) => {
                // spd-say takes -100..100 for both; 160 wpm maps to 0.
                let rate = ((i64::from(rate) - 160) * 100 / 80).clamp(-100, 100);
                let volume = ((volume * 200.0).round() as i64 - 100).clamp(-100, 100);
                vec![
                    "-w".into(),
                    "-r".into(),
                    rate.to_string(),
                    "-i".into(),
                    volume.to_string(),
                    "--".into(),
                    text.into(),
                ]
            }
            Self::Say(_) => vec![
                "-r".into(),
                rate.to_string(),
                format!("[[volm {volume:.2}]] {text}"),
            ],
        }
    }
}

struct Job {
    text: String,
    generation: u64,
}

struct Shared {
    generation: AtomicU64,
    rate: AtomicU32,
    /// Volume in hundredths.
    volume: AtomicU32,
    current: Mutex<Option<Child>>,
}

impl Shared {
    fn kill_current(&self) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(child) = current.as_mut() {
            let _ = child.kill();
        }
    }
}

/// [`Speaker`] running a [`SpeechEngine`] on a worker thread.
pub struct SystemSpeaker {
    tx: Option<Sender<Job>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    engine: &'static str,
}

impl SystemSpeaker {
    /// Start the worker. Failed utterances are reported to `ui` as
    /// `"Speech error: {e}"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn spawn(engine: SpeechEngine, rate: u32, volume: f32, ui: UiQueue) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            rate: AtomicU32::new(rate),
            volume: AtomicU32::new(to_hundredths(volume)),
            current: Mutex::new(None),
        });
        let name = engine.name();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("aura-tts".into())
            .spawn(move || run_worker(&engine, &rx, &worker_shared, &ui))?;
        info!(engine = name, "speech worker started");
        Ok(Self {
            tx: Some(tx),
            shared,
            worker: Some(worker),
            engine: name,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &'static str {
        self.engine
    }

    /// Let every queued utterance finish, then stop the worker.
    pub fn finish(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn to_hundredths(volume: f32) -> u32 {
    (volume.clamp(0.0, 1.0) * 100.0).round() as u32
}

fn run_worker(engine: &SpeechEngine, rx: &Receiver<Job>, shared: &Shared, ui: &UiQueue) {
    while let Ok(job) = rx.recv() {
        if job.generation < shared.generation.load(Ordering::SeqCst) {
            continue;
        }
        let rate = shared.rate.load(Ordering::Relaxed);
        let volume = shared.volume.load(Ordering::Relaxed) as f32 / 100.0;
        if let Err(e) = say(engine, &job, rate, volume, shared) {
            warn!("speech failed: {e}");
            ui.append(Role::System, format!("Speech error: {e}"));
        }
    }
    debug!("speech worker stopped");
}

fn say(engine: &SpeechEngine, job: &Job, rate: u32, volume: f32, shared: &Shared) -> Result<()> {
    let child = Command::new(engine.program())
        .args(engine.args(&job.text, rate, volume))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| AuraError::Tts(format!("failed to start {}: {e}", engine.name())))?;
    let generation = job.generation;
    {
        let mut current = shared.current.lock().unwrap_or_else(PoisonError::into_inner);
        let child = current.insert(child);
        // A stop() that ran before the child was stored found nothing to kill.
        if shared.generation.load(Ordering::SeqCst) != generation {
            let _ = child.kill();
        }
    }

    loop {
        let status = {
            let mut current = shared.current.lock().unwrap_or_else(PoisonError::into_inner);
            match current.as_mut() {
                Some(child) => child.try_wait()?,
                None => return Ok(()),
            }
        };
        if let Some(status) = status {
            shared
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            let interrupted = shared.generation.load(Ordering::SeqCst) != generation;
            if !status.success() && !interrupted {
                let code = status.code().unwrap_or(-1);
                return Err(AuraError::Tts(format!(
                    "{} exited with code {code}",
                    engine.name()
                )));
            }
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

impl Speaker for SystemSpeaker {
    fn speak(&self, text: &str, interrupt: bool) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if interrupt {
            self.stop();
        }
        let job = Job {
            text: text.to_owned(),
            generation: self.shared.generation.load(Ordering::SeqCst),
        };
        if let Some(tx) = &self.tx
            && tx.send(job).is_err()
        {
            warn!("speech worker gone; utterance dropped");
        }
    }

    fn stop(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.kill_current();
    }

    fn set_voice(&self, rate: u32, volume: f32) {
        self.shared.rate.store(rate, Ordering::Relaxed);
        self.shared
            .volume
            .store(to_hundredths(volume), Ordering::Relaxed);
        debug!(rate, volume, "voice updated");
    }
}

impl Drop for SystemSpeaker {
    fn drop(&mut self) {
        self.stop();
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// [`Speaker`] that only logs. Used when no speech engine is installed.
#[derive(Debug, Default)]
pub struct SilentSpeaker;

impl Speaker for SilentSpeaker {
    fn speak(&self, text: &str, interrupt: bool) {
        debug!(interrupt, "silent speaker: {text}");
    }

    fn stop(&self) {}

    fn set_voice(&self, _rate: u32, _volume: f32) {}
}
