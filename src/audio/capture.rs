//! Microphone capture via `cpal`.
//!
//! [`CpalInput`] opens an input device on a dedicated thread (the cpal stream
//! is not `Send` on every platform, so the thread owns it for its whole
//! life).  Raw callback buffers travel to that thread as [`AudioChunk`]s; the
//! thread runs them through a [`CapturePipeline`] and pushes finished
//! [`AudioFrame`]s into a tokio channel with `try_send`.
//!
//! ```text
//! cpal callback ──AudioChunk──▶ capture thread
//!                                 stereo_to_mono → StreamResampler (16 kHz)
//!                                 → FrameBuffer (4096) → AudioFrame (base64)
//!                                 ──try_send──▶ session controller
//! ```
//!
//! The returned [`CaptureHandle`] stops the thread on [`CaptureHandle::stop`]
//! or on drop; the thread then drops the stream, releasing the device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc;

use super::frame::FrameBuffer;
use super::pcm::AudioFrame;
use super::resample::{stereo_to_mono, StreamResampler};
use crate::config::AudioConfig;

/// How often the capture thread checks its stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long `start` waits for the device to open.
const START_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up the audio capture.
///
/// None of these are fatal to a session: the controller logs them and
/// continues text-only.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to set up resampler: {0}")]
    Resampler(#[from] rubato::ResamplerConstructionError),

    #[error("failed to spawn capture thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("input device did not open within {0:?}")]
    StartTimeout(Duration),
}

// ---------------------------------------------------------------------------
// CaptureHandle
// ---------------------------------------------------------------------------

/// Keeps a capture running.  Stopping (or dropping) signals the capture
/// thread, which exits within one poll interval and drops the cpal stream.
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Wrap a stop flag and, optionally, the thread observing it.
    pub fn new(stop: Arc<AtomicBool>, thread: Option<JoinHandle<()>>) -> Self {
        Self { stop, thread }
    }

    /// Signal the capture to stop.  Idempotent.
    pub fn stop(&mut self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            log::debug!("capture: stop requested");
        }
        // Detach; the thread observes the flag on its next poll.
        self.thread.take();
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// AudioInput
// ---------------------------------------------------------------------------

/// A microphone source.
///
/// Implemented by [`CpalInput`]; tests substitute a channel-backed double.
pub trait AudioInput: Send + Sync {
    /// Begin capturing.  Encoded frames are pushed into `frames` with
    /// `try_send`; a full channel drops the frame.
    fn start(&self, frames: mpsc::Sender<AudioFrame>) -> Result<CaptureHandle, CaptureError>;
}

// ---------------------------------------------------------------------------
// CapturePipeline
// ---------------------------------------------------------------------------

/// Downmix → resample → frame → encode, independent of any device.
pub struct CapturePipeline {
    channels: u16,
    target_rate: u32,
    resampler: StreamResampler,
    framer: FrameBuffer,
}

impl CapturePipeline {
    pub fn new(
        device_rate: u32,
        channels: u16,
        target_rate: u32,
        frame_size: usize,
    ) -> Result<Self, CaptureError> {
        Ok(Self {
            channels,
            target_rate,
            resampler: StreamResampler::new(device_rate, target_rate)?,
            framer: FrameBuffer::new(frame_size),
        })
    }

    /// Process one interleaved callback buffer into zero or more frames.
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<AudioFrame> {
        let mono = stereo_to_mono(interleaved, self.channels);
        let resampled = match self.resampler.process(&mono) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("capture: resampler error, dropping buffer: {e}");
                return Vec::new();
            }
        };
        self.framer
            .push(&resampled)
            .iter()
            .map(|frame| AudioFrame::encode(frame, self.target_rate))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CpalInput
// ---------------------------------------------------------------------------

/// Microphone capture built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use zamzami_assistant::audio::{AudioInput, CpalInput};
/// use zamzami_assistant::config::AudioConfig;
///
/// # async fn example() {
/// let (tx, mut rx) = tokio::sync::mpsc::channel(64);
/// let input = CpalInput::new(&AudioConfig::default());
/// let _handle = input.start(tx).unwrap(); // drop to stop recording
/// while let Some(frame) = rx.recv().await {
///     println!("{} ({} base64 chars)", frame.mime_type, frame.data.len());
/// }
/// # }
/// ```
pub struct CpalInput {
    device_name: Option<String>,
    target_rate: u32,
    frame_size: usize,
}

impl CpalInput {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device_name: config.input_device.clone(),
            target_rate: config.capture_sample_rate,
            frame_size: config.frame_size,
        }
    }
}

impl AudioInput for CpalInput {
    fn start(&self, frames: mpsc::Sender<AudioFrame>) -> Result<CaptureHandle, CaptureError> {
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(), CaptureError>>(1);

        let device_name = self.device_name.clone();
        let target_rate = self.target_rate;
        let frame_size = self.frame_size;
        let stop_flag = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let (chunk_tx, chunk_rx) = std_mpsc::channel::<AudioChunk>();

                let opened = open_input(device_name.as_deref(), chunk_tx).and_then(
                    |(stream, rate, channels)| {
                        let pipeline = CapturePipeline::new(rate, channels, target_rate, frame_size)?;
                        Ok((stream, pipeline))
                    },
                );
                let (_stream, mut pipeline) = match opened {
                    Ok(v) => {
                        let _ = ready_tx.send(Ok(()));
                        v
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                run_capture_loop(&stop_flag, &chunk_rx, &mut pipeline, &frames);
                log::info!("capture: stopped, releasing input device");
            })?;

        match ready_rx.recv_timeout(START_TIMEOUT) {
            Ok(Ok(())) => Ok(CaptureHandle::new(stop, Some(thread))),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                stop.store(true, Ordering::SeqCst);
                Err(CaptureError::StartTimeout(START_TIMEOUT))
            }
        }
    }
}

fn run_capture_loop(
    stop: &AtomicBool,
    chunks: &std_mpsc::Receiver<AudioChunk>,
    pipeline: &mut CapturePipeline,
    frames: &mpsc::Sender<AudioFrame>,
) {
    while !stop.load(Ordering::SeqCst) {
        let chunk = match chunks.recv_timeout(POLL_INTERVAL) {
            Ok(c) => c,
            Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        };

        for frame in pipeline.push(&chunk.samples) {
            match frames.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::debug!("capture: frame channel full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return,
            }
        }
    }
}

/// Open the named (or default) input device and start a stream forwarding
/// callback buffers to `tx`.
fn open_input(
    device_name: Option<&str>,
    tx: std_mpsc::Sender<AudioChunk>,
) -> Result<(cpal::Stream, u32, u16), CaptureError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
        None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
    };

    let supported = device.default_input_config()?;
    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    log::info!(
        "capture: opening {} @ {sample_rate} Hz, {channels} channel(s)",
        device.name().unwrap_or_else(|_| "<unnamed>".into())
    );

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let chunk = AudioChunk {
                samples: data.to_vec(),
                sample_rate,
                channels,
            };
            // The receiver goes away when capture stops.
            let _ = tx.send(chunk);
        },
        |err: cpal::StreamError| {
            log::error!("capture: cpal stream error: {err}");
        },
        None,
    )?;

    stream.play()?;
    Ok((stream, sample_rate, channels))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
