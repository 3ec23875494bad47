//! Audio relay — microphone capture upstream, synthesized speech downstream.
//!
//! # Capture
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (std mpsc) → stereo_to_mono
//!           → StreamResampler (16 kHz) → FrameBuffer (4096)
//!           → AudioFrame (base64 i16 LE) → tokio mpsc (try_send)
//! ```
//!
//! # Playback
//!
//! ```text
//! base64 chunk → decode_pcm16 (24 kHz) → resample_linear (device rate)
//!             → Timeline::schedule → cpal output callback → Timeline::render
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use zamzami_assistant::audio::{AudioInput, CpalInput, PlaybackHandle, PlaybackOutput};
//! use zamzami_assistant::config::AudioConfig;
//!
//! let config = AudioConfig::default();
//! let playback = PlaybackHandle::start(&config).unwrap();
//!
//! let (tx, _rx) = tokio::sync::mpsc::channel(config.frame_queue);
//! let _capture = CpalInput::new(&config).start(tx).unwrap(); // drop → stops
//!
//! playback.flush();
//! ```

pub mod capture;
pub mod frame;
pub mod pcm;
pub mod playback;
pub mod resample;

pub use capture::{AudioChunk, AudioInput, CaptureError, CaptureHandle, CapturePipeline, CpalInput};
pub use frame::FrameBuffer;
pub use pcm::{decode_pcm16, encode_pcm16, AudioFrame, PcmError};
pub use playback::{PlaybackError, PlaybackHandle, PlaybackOutput, Timeline};
pub use resample::{resample_linear, stereo_to_mono, StreamResampler};
