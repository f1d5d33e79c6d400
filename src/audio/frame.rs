// ABOUTME: Audio frame type and PCM wire codec
// ABOUTME: Volume estimation and fixed-size frame slicing

use crate::FRAME_SAMPLES;

/// One fixed-length chunk of mono f32 linear PCM.
///
/// Frames carry no header or sequence number; per-sender ordering is
/// preserved by the transport and that is the only ordering relied upon.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// PCM samples, nominally [-1.0, 1.0]
    pub samples: Vec<f32>,
}

impl AudioFrame {
    /// Create a frame from raw samples.
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Frame duration in samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the frame carries no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Encode to the wire form: the raw sample buffer as little-endian f32.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 4);
        for sample in &self.samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }

    /// Decode from the wire form.
    ///
    /// A trailing partial sample is truncated and an empty payload yields
    /// an empty frame; both degrade to silence downstream rather than
    /// erroring, since malformed frames are relayed unvalidated.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self { samples }
    }
}

/// Coarse volume estimate for UI feedback: mean absolute amplitude scaled
/// into 0-100. Deterministic and bounded; silence maps to 0 and full-scale
/// input saturates at 100.
pub fn volume_estimate(samples: &[f32]) -> u8 {
    if samples.is_empty() {
        return 0;
    }
    let sum: f32 = samples.iter().map(|s| s.abs()).sum();
    let scaled = (sum / samples.len() as f32) * 5000.0;
    scaled.round().min(100.0) as u8
}

/// Accumulates capture callback buffers into exactly [`FRAME_SAMPLES`]-long
/// frames, independent of the device's own buffer sizing.
#[derive(Debug)]
pub struct FrameSlicer {
    pending: Vec<f32>,
    frame_len: usize,
}

impl FrameSlicer {
    /// Create a slicer producing frames of the default size.
    pub fn new() -> Self {
        Self::with_frame_len(FRAME_SAMPLES)
    }

    /// Create a slicer with a custom frame length (in samples).
    pub fn with_frame_len(frame_len: usize) -> Self {
        Self {
            pending: Vec::with_capacity(frame_len),
            frame_len,
        }
    }

    /// Feed captured samples, returning every completed frame.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_len {
            let rest = self.pending.split_off(self.frame_len);
            let full = std::mem::replace(&mut self.pending, rest);
            frames.push(AudioFrame::new(full));
        }
        frames
    }
}

impl Default for FrameSlicer {
    fn default() -> Self {
        Self::new()
    }
}
