//! Audio resampling and channel mixing utilities.
//!
//! The realtime endpoint expects **16 kHz mono** input and emits **24 kHz
//! mono** speech, while audio devices usually run at 44.1 or 48 kHz with two
//! channels.  This module provides the conversion steps:
//!
//! 1. [`stereo_to_mono`] — downmix any number of interleaved channels to mono.
//! 2. [`StreamResampler`] — band-limited streaming resampler (`rubato`
//!    `FftFixedIn`) used on the capture path, where audio arrives in
//!    arbitrary callback-sized pieces.
//! 3. [`resample_linear`] — linear interpolation for whole playback chunks,
//!    where each chunk is converted independently.

use rubato::{FftFixedIn, Resampler};

// ---------------------------------------------------------------------------
// stereo_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec` with no
///   averaging.
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use zamzami_assistant::audio::stereo_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = stereo_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn stereo_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample_linear
// ---------------------------------------------------------------------------

/// Resample `samples` from `source_rate` to `target_rate` Hz using linear
/// interpolation.
///
/// * Equal rates return the input unchanged.
/// * Empty input returns an empty vector.
///
/// The output length is `round(samples.len() * target_rate / source_rate)`.
///
/// # Example
///
/// ```rust
/// use zamzami_assistant::audio::resample_linear;
///
/// // 24 kHz speech → 48 kHz device
/// let speech = vec![0.25_f32; 240];
/// let out = resample_linear(&speech, 24_000, 48_000);
/// assert_eq!(out.len(), 480);
/// ```
pub fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples[samples.len() - 1]
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Input chunk handed to `rubato` on each call.
const RESAMPLER_CHUNK: usize = 1024;

/// Streaming mono resampler for the capture path.
///
/// Samples are buffered until the inner `FftFixedIn` has a full input chunk;
/// the output therefore lags the input by at most one chunk plus the filter
/// delay.  When the rates match the resampler is a pass-through.
pub struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
}

impl StreamResampler {
    /// Build a resampler from `source_rate` to `target_rate` Hz.
    pub fn new(
        source_rate: u32,
        target_rate: u32,
    ) -> Result<Self, rubato::ResamplerConstructionError> {
        let inner = if source_rate == target_rate {
            None
        } else {
            Some(FftFixedIn::<f32>::new(
                source_rate as usize,
                target_rate as usize,
                RESAMPLER_CHUNK,
                2,
                1,
            )?)
        };
        Ok(Self {
            inner,
            pending: Vec::new(),
        })
    }

    /// Feed mono samples; returns whatever resampled output is ready.
    pub fn process(&mut self, mono: &[f32]) -> Result<Vec<f32>, rubato::ResampleError> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(mono.to_vec());
        };

        self.pending.extend_from_slice(mono);
        let mut output = Vec::new();

        loop {
            let needed = inner.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let input = vec![self.pending.drain(..needed).collect::<Vec<f32>>()];
            let mut resampled = inner.process(&input, None)?;
            if let Some(channel) = resampled.pop() {
                output.extend(channel);
            }
        }

        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
