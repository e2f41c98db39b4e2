//! Microphone capture using cpal.
//!
//! Captures at the device's native rate on a dedicated thread (cpal streams
//! are not `Send`) and delivers 16 kHz mono chunks over a tokio channel.

use crate::config::AudioConfig;
use crate::error::{AuraError, Result};
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Sample rate delivered to phrase detection and transcription.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Chunks buffered between the audio thread and the consumer.
const CHANNEL_CAPACITY: usize = 256;

/// A block of mono samples at [`TARGET_SAMPLE_RATE`].
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Microphone selection. Opening happens in [`CpalCapture::start`].
#[derive(Debug, Clone, Default)]
pub struct CpalCapture {
    device_name: Option<String>,
}

impl CpalCapture {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device_name: config.input_device.clone(),
        }
    }

    /// Open the microphone and start streaming.
    ///
    /// Returns once the stream is running, or with the reason it could not
    /// be opened.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Audio`] if the device cannot be found or the
    /// stream cannot be built or started.
    pub fn start(&self) -> Result<CaptureHandle> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let device_name = self.device_name.clone();

        let thread = std::thread::Builder::new()
            .name("aura-capture".into())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), tx) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                while !stop_flag.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
                info!("audio capture stopped");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CaptureHandle {
                rx,
                stop,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AuraError::Audio("capture thread exited early".into()))
            }
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AuraError::Audio(format!("cannot enumerate devices: {e}")))?;
        Ok(devices
            .filter_map(|d| d.description().ok().map(|desc| desc.name().to_owned()))
            .collect())
    }
}

fn find_input_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| AuraError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .is_some_and(|desc| desc.name() == name)
            })
            .ok_or_else(|| AuraError::Audio(format!("input device '{name}' not found"))),
        None => host
            .default_input_device()
            .ok_or_else(|| AuraError::Audio("no default input device".into())),
    }
}

fn open_stream(device_name: Option<&str>, tx: mpsc::Sender<AudioChunk>) -> Result<cpal::Stream> {
    let device = find_input_device(device_name)?;
    let label = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());

    let default_config = device
        .default_input_config()
        .map_err(|e| AuraError::Audio(format!("no default input config: {e}")))?;
    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();
    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    info!("using input device: {label} ({native_rate}Hz, {native_channels} ch)");

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = to_mono(data, native_channels);
                let samples = resample(&mono, native_rate, TARGET_SAMPLE_RATE);
                let chunk = AudioChunk {
                    samples,
                    sample_rate: TARGET_SAMPLE_RATE,
                };
                if tx.try_send(chunk).is_err() {
                    debug!("audio channel full, dropping chunk");
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
            },
            None,
        )
        .map_err(|e| AuraError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AuraError::Audio(format!("failed to start input stream: {e}")))?;
    Ok(stream)
}

/// A running microphone stream. Dropping it stops capture.
pub struct CaptureHandle {
    rx: mpsc::Receiver<AudioChunk>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Next chunk, or `None` once capture has stopped.
    pub async fn recv(&mut self) -> Option<AudioChunk> {
        self.rx.recv().await
    }

    /// Discard chunks captured so far.
    pub fn flush(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Convert interleaved multi-channel audio to mono by averaging channels.
pub(crate) fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    let ch = channels as usize;
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation resampler.
///
/// Good enough for speech (48 kHz to 16 kHz) and for playing music files on
/// a device running at a different rate.
pub(crate) fn resample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() || src_rate == 0 || dst_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(src_rate) / f64::from(dst_rate);
    let out_len = (samples.len() as f64 / ratio) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let src_pos = i as f64 * ratio;
            let idx = src_pos as usize;
            let frac = src_pos - idx as f64;
            if idx < last {
                (f64::from(samples[idx]) * (1.0 - frac) + f64::from(samples[idx + 1]) * frac) as f32
            } else {
                samples[idx.min(last)]
            }
        })
        .collect()
}
