// ABOUTME: Audio module for the client-side pipeline
// ABOUTME: Frames, microphone capture, and scheduled playback

/// Microphone capture pipeline
pub mod capture;
/// Audio frames and volume estimation
pub mod frame;
/// Scheduled playback of received frames
pub mod playback;

pub use capture::CapturePipeline;
pub use frame::{volume_estimate, AudioFrame, FrameSlicer};
pub use playback::{FrameScheduler, PlaybackEngine, Timeline};
