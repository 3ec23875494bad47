//! 16-bit PCM wire encoding.
//!
//! The remote endpoint exchanges audio as base64 strings of little-endian
//! signed 16-bit mono samples.  Upstream frames are tagged with a MIME type
//! carrying their rate (`audio/pcm;rate=16000`).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Errors raised while decoding an inbound PCM chunk.
#[derive(Debug, Error)]
pub enum PcmError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("PCM payload has odd length {0}; expected 16-bit samples")]
    OddLength(usize),
}

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One encoded capture frame, ready to be sent as realtime audio input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Base64 of little-endian `i16` samples.
    pub data: String,
    /// e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
}

impl AudioFrame {
    /// Encode `samples` (mono, `[-1.0, 1.0]`) recorded at `sample_rate` Hz.
    pub fn encode(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            data: encode_pcm16(samples),
            mime_type: pcm_mime_type(sample_rate),
        }
    }
}

/// MIME tag for raw PCM at `sample_rate`.
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

// ---------------------------------------------------------------------------
// Sample conversion
// ---------------------------------------------------------------------------

/// Scale by 32768 and clamp into the `i16` range.
///
/// ```
/// use zamzami_assistant::audio::pcm::f32_to_i16;
///
/// assert_eq!(f32_to_i16(0.0), 0);
/// assert_eq!(f32_to_i16(1.0), i16::MAX);
/// assert_eq!(f32_to_i16(-1.0), i16::MIN);
/// assert_eq!(f32_to_i16(0.5), 16384);
/// ```
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Inverse of [`f32_to_i16`] (without the clamp).
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// `f32` samples → base64 of little-endian `i16`.
pub fn encode_pcm16(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        bytes.extend_from_slice(&f32_to_i16(s).to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Base64 of little-endian `i16` → `f32` samples in `[-1.0, 1.0)`.
pub fn decode_pcm16(data: &str) -> Result<Vec<f32>, PcmError> {
    let bytes = STANDARD.decode(data.trim())?;
    if bytes.len() % 2 != 0 {
        return Err(PcmError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16_to_f32(i16::from_le_bytes([b[0], b[1]])))
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
