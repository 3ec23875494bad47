//! Fixed-size frame accumulator for captured audio.
//!
//! The capture callback delivers buffers of whatever size the hardware
//! chooses.  [`FrameBuffer`] collects those samples and hands out frames of
//! exactly `frame_size` samples, keeping the remainder for the next push.
//!
//! # Example
//!
//! ```rust
//! use zamzami_assistant::audio::FrameBuffer;
//!
//! let mut buf = FrameBuffer::new(4);
//! assert!(buf.push(&[1.0, 2.0, 3.0]).is_empty());
//! let frames = buf.push(&[4.0, 5.0]);
//! assert_eq!(frames, vec![vec![1.0, 2.0, 3.0, 4.0]]);
//! assert_eq!(buf.pending(), 1);
//! ```

// ---------------------------------------------------------------------------
// FrameBuffer
// ---------------------------------------------------------------------------

/// Accumulates mono samples into frames of a fixed length.
pub struct FrameBuffer {
    frame_size: usize,
    pending: Vec<f32>,
}

impl FrameBuffer {
    /// Create a buffer emitting frames of `frame_size` samples.
    ///
    /// # Panics
    ///
    /// Panics if `frame_size == 0`.
    pub fn new(frame_size: usize) -> Self {
        assert!(frame_size > 0, "FrameBuffer frame_size must be > 0");
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Append `samples` and return every frame completed by them, in order.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<f32>> {
        let mut frames = Vec::new();
        let mut rest = samples;

        while !rest.is_empty() {
            let want = self.frame_size - self.pending.len();
            let take = want.min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.pending.len() == self.frame_size {
                let full = std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
                frames.push(full);
            }
        }

        frames
    }

    /// Samples held back waiting for a full frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
