//! Gapless playback of synthesized speech.
//!
//! The endpoint streams speech as many small base64 PCM chunks (16-bit LE
//! mono, 24 kHz).  Each chunk becomes a *unit* on a [`Timeline`]: it is
//! scheduled at `max(next_start_time, current_time)` and `next_start_time`
//! advances by the chunk's duration, so consecutive chunks play back to back
//! without gaps or overlap.
//!
//! ```text
//! enqueue(b64) ─▶ decode i16 LE ─▶ resample 24k → device rate
//!               ─▶ Timeline::schedule  (start = max(next_start, now))
//!
//! cpal output callback ─▶ Timeline::render ─▶ finished units drop out
//!
//! flush() ─▶ all units removed, next_start_time = 0
//! ```
//!
//! The output clock (`current_time`) is the number of frames rendered so far
//! divided by the device rate.  A detached handle (no output device) has no
//! renderer: its clock follows wall time and chunks only reserve their slot,
//! so no samples are retained.

use std::collections::VecDeque;
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::pcm::{decode_pcm16, PcmError};
use super::resample::resample_linear;
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to decode speech chunk: {0}")]
    Decode(#[from] PcmError),

    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("output device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate output devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn playback thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("playback thread exited before the device opened")]
    ThreadExited,
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// A chunk scheduled on the output clock.
#[derive(Debug)]
struct ScheduledUnit {
    id: u64,
    start_frame: u64,
    samples: Vec<f32>,
}

impl ScheduledUnit {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Output clock plus the set of scheduled or playing units.
#[derive(Debug)]
pub struct Timeline {
    sample_rate: u32,
    rendered_frames: u64,
    next_start_time: f64,
    units: VecDeque<ScheduledUnit>,
    next_id: u64,
}

impl Timeline {
    /// A fresh timeline for a device running at `sample_rate` Hz.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            rendered_frames: 0,
            next_start_time: 0.0,
            units: VecDeque::new(),
            next_id: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.rendered_frames as f64 / self.sample_rate as f64
    }

    /// Where the next chunk will start unless the clock has moved past it.
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    /// Units still scheduled or playing.
    pub fn active_units(&self) -> usize {
        self.units.len()
    }

    /// Claim the next `duration` seconds of the clock without scheduling
    /// any samples.  Returns the start time.
    pub fn reserve(&mut self, duration: f64) -> f64 {
        let start = self.next_start_time.max(self.current_time());
        self.next_start_time = start + duration;
        start
    }

    /// Schedule `samples` (already at the device rate) lasting `duration`
    /// seconds.  Returns `(unit id, start time)`.
    pub fn schedule(&mut self, samples: Vec<f32>, duration: f64) -> (u64, f64) {
        let start = self.reserve(duration);

        let id = self.next_id;
        self.next_id += 1;

        let start_frame = (start * self.sample_rate as f64).round() as u64;
        self.units.push_back(ScheduledUnit {
            id,
            start_frame,
            samples,
        });

        (id, start)
    }

    /// Stop every unit, forget them all and reset `next_start_time` to 0.
    pub fn flush(&mut self) {
        if !self.units.is_empty() {
            log::debug!("playback: flushing {} unit(s)", self.units.len());
        }
        self.units.clear();
        self.next_start_time = 0.0;
    }

    /// Fill an interleaved output buffer and advance the clock.
    ///
    /// Mono unit samples are copied to every channel.  Units whose last
    /// sample has been rendered are removed.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        let base = self.rendered_frames;

        for (i, frame) in out.chunks_mut(channels).enumerate() {
            let t = base + i as u64;
            let mut value = 0.0_f32;
            for unit in &self.units {
                if t >= unit.start_frame && t < unit.end_frame() {
                    value += unit.samples[(t - unit.start_frame) as usize];
                }
            }
            frame.fill(value);
        }

        self.rendered_frames += frames as u64;
        self.drop_finished();
    }

    /// Move the clock forward to `frames` without producing output.
    pub fn advance_to(&mut self, frames: u64) {
        if frames > self.rendered_frames {
            self.rendered_frames = frames;
            self.drop_finished();
        }
    }

    fn drop_finished(&mut self) {
        let now = self.rendered_frames;
        self.units.retain(|u| {
            let done = u.end_frame() <= now;
            if done {
                log::trace!("playback: unit {} finished", u.id);
            }
            !done
        });
    }
}

// ---------------------------------------------------------------------------
// PlaybackOutput
// ---------------------------------------------------------------------------

/// Where the session controller sends synthesized speech.
pub trait PlaybackOutput: Send + Sync {
    /// Decode and schedule one base64 chunk.  Undecodable chunks are logged
    /// and dropped.
    fn enqueue(&self, encoded: &str);

    /// Stop everything that is playing or scheduled.
    fn flush(&self);
}

// ---------------------------------------------------------------------------
// PlaybackHandle
// ---------------------------------------------------------------------------

/// Cloneable handle onto the shared [`Timeline`].
#[derive(Clone)]
pub struct PlaybackHandle {
    timeline: Arc<Mutex<Timeline>>,
    source_rate: u32,
    /// Wall-clock origin of a handle with no device behind it.
    detached_since: Option<Instant>,
}

impl PlaybackHandle {
    /// A handle whose timeline is not attached to any device.
    ///
    /// Used when no output device can be opened.  The clock runs on wall
    /// time and chunks keep their timing, but nothing is buffered.
    pub fn detached(source_rate: u32, device_rate: u32) -> Self {
        Self {
            detached_since: Some(Instant::now()),
            ..Self::attached(source_rate, device_rate)
        }
    }

    /// A handle whose timeline is rendered by an output stream.
    fn attached(source_rate: u32, device_rate: u32) -> Self {
        Self {
            timeline: Arc::new(Mutex::new(Timeline::new(device_rate))),
            source_rate,
            detached_since: None,
        }
    }

    /// Open the output device on a dedicated thread that renders the
    /// timeline for the rest of the process.
    pub fn start(config: &AudioConfig) -> Result<Self, PlaybackError> {
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<Self, PlaybackError>>(1);
        let device_name = config.output_device.clone();
        let source_rate = config.playback_sample_rate;

        std::thread::Builder::new()
            .name("audio-playback".into())
            .spawn(move || {
                let (_stream, handle) = match open_output(device_name.as_deref(), source_rate) {
                    Ok(v) => v,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(handle));
                // The stream lives as long as this thread.
                loop {
                    std::thread::park();
                }
            })?;

        ready_rx.recv().map_err(|_| PlaybackError::ThreadExited)?
    }

    /// Decode, resample and schedule a chunk.  Returns the unit's start time.
    pub fn schedule_chunk(&self, encoded: &str) -> Result<f64, PlaybackError> {
        let samples = decode_pcm16(encoded)?;
        if samples.is_empty() {
            return Ok(self.timeline.lock().unwrap().next_start_time());
        }
        let duration = samples.len() as f64 / self.source_rate as f64;

        if let Some(since) = self.detached_since {
            let mut timeline = self.timeline.lock().unwrap();
            let elapsed = since.elapsed().as_secs_f64() * timeline.sample_rate() as f64;
            timeline.advance_to(elapsed as u64);
            return Ok(timeline.reserve(duration));
        }

        // Resample without holding the lock the output callback renders under.
        let device_rate = self.timeline.lock().unwrap().sample_rate();
        let device = resample_linear(&samples, self.source_rate, device_rate);
        let (_, start) = self.timeline.lock().unwrap().schedule(device, duration);
        Ok(start)
    }

    /// Shared timeline, for inspection.
    pub fn timeline(&self) -> Arc<Mutex<Timeline>> {
        Arc::clone(&self.timeline)
    }
}

impl PlaybackOutput for PlaybackHandle {
    fn enqueue(&self, encoded: &str) {
        if let Err(e) = self.schedule_chunk(encoded) {
            log::warn!("playback: dropping chunk: {e}");
        }
    }

    fn flush(&self) {
        self.timeline.lock().unwrap().flush();
    }
}

fn open_output(
    device_name: Option<&str>,
    source_rate: u32,
) -> Result<(cpal::Stream, PlaybackHandle), PlaybackError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .output_devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| PlaybackError::DeviceNotFound(name.to_string()))?,
        None => host.default_output_device().ok_or(PlaybackError::NoDevice)?,
    };

    let supported = device.default_output_config()?;
    let channels = supported.channels() as usize;
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    log::info!(
        "playback: opening {} @ {sample_rate} Hz, {channels} channel(s)",
        device.name().unwrap_or_else(|_| "<unnamed>".into())
    );

    let handle = PlaybackHandle::attached(source_rate, sample_rate);
    let timeline = handle.timeline();

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| match timeline.lock() {
            Ok(mut t) => t.render(data, channels),
            Err(_) => data.fill(0.0),
        },
        |err: cpal::StreamError| {
            log::error!("playback: cpal stream error: {err}");
        },
        None,
    )?;

    stream.play()?;
    Ok((stream, handle))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
