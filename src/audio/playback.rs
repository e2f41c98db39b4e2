//! Music playback to system speakers via cpal.

use super::capture::resample;
use super::decode::decode_file;
use crate::config::AudioConfig;
use crate::error::{AuraError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

/// Plays one local audio file at a time.
pub trait MusicPlayer: Send + Sync {
    /// Start playing `path`, replacing whatever is playing. Returns once
    /// playback has started.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be decoded or the output device
    /// cannot be opened.
    fn play(&self, path: &Path) -> Result<()>;

    /// Stop playback. No-op when idle.
    fn stop(&self);

    fn is_playing(&self) -> bool;
}

struct Playing {
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Playing {
    fn halt(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// [`MusicPlayer`] decoding with symphonia and playing through cpal.
pub struct CpalMusicPlayer {
    device_name: Option<String>,
    current: Mutex<Option<Playing>>,
}

impl CpalMusicPlayer {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device_name: config.output_device.clone(),
            current: Mutex::new(None),
        }
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| AuraError::Audio(format!("cannot enumerate devices: {e}")))?;
        Ok(devices
            .filter_map(|d| d.description().ok().map(|desc| desc.name().to_owned()))
            .collect())
    }
}

impl MusicPlayer for CpalMusicPlayer {
    fn play(&self, path: &Path) -> Result<()> {
        let audio = decode_file(path)?;
        self.stop();

        let stop = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let device_name = self.device_name.clone();
        let stop_flag = Arc::clone(&stop);
        let done_flag = Arc::clone(&done);
        let label = path.display().to_string();

        let thread = std::thread::Builder::new()
            .name("aura-music".into())
            .spawn(move || {
                let stream = match open_output(
                    device_name.as_deref(),
                    audio.samples,
                    audio.sample_rate,
                    Arc::clone(&done_flag),
                ) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                while !stop_flag.load(Ordering::Relaxed) && !done_flag.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(20));
                }
                drop(stream);
                done_flag.store(true, Ordering::Relaxed);
                debug!(track = %label, "playback ended");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(AuraError::Audio("playback thread exited early".into()));
            }
        }

        info!(track = %path.display(), "playback started");
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Playing {
            stop,
            done,
            thread: Some(thread),
        });
        Ok(())
    }

    fn stop(&self) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut playing) = previous {
            playing.halt();
        }
    }

    fn is_playing(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|p| !p.done.load(Ordering::Relaxed))
    }
}

impl Drop for CpalMusicPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn find_output_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| AuraError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .is_some_and(|desc| desc.name() == name)
            })
            .ok_or_else(|| AuraError::Audio(format!("output device '{name}' not found"))),
        None => host
            .default_output_device()
            .ok_or_else(|| AuraError::Audio("no default output device".into())),
    }
}

fn open_output(
    device_name: Option<&str>,
    samples: Vec<f32>,
    sample_rate: u32,
    done: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let device = find_output_device(device_name)?;
    let default_config = device
        .default_output_config()
        .map_err(|e| AuraError::Audio(format!("no default output config: {e}")))?;
    let device_rate = default_config.sample_rate();
    let channels = default_config.channels();
    let stream_config = StreamConfig {
        channels,
        sample_rate: device_rate,
        buffer_size: cpal::BufferSize::Default,
    };

    let track = resample(&samples, sample_rate, device_rate);
    let mut position = 0usize;
    let ch = usize::from(channels.max(1));

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(ch) {
                    let value = track.get(position).copied().unwrap_or(0.0);
                    frame.fill(value);
                    position += 1;
                }
                if position >= track.len() {
                    done.store(true, Ordering::Relaxed);
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
            },
            None,
        )
        .map_err(|e| AuraError::Audio(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AuraError::Audio(format!("failed to start output stream: {e}")))?;
    Ok(stream)
}
