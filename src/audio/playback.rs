// ABOUTME: Playback scheduling for received audio frames
// ABOUTME: Jitter-absorbing cursor, sample timeline mixer, and cpal output

use crate::audio::frame::{volume_estimate, AudioFrame};
use crate::SAMPLE_RATE;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Playback lookahead re-established after an underrun, in milliseconds.
pub const LOOKAHEAD_MS: u64 = 50;

fn lookahead_samples() -> u64 {
    LOOKAHEAD_MS * SAMPLE_RATE as u64 / 1000
}

/// The scheduling cursor for incoming frames, in samples of the output
/// device's clock.
///
/// Frames are laid down back to back at the cursor. If the cursor has
/// fallen behind the device (an underrun: nothing arrived in time), it is
/// reset to `now + lookahead`, which re-buffers a bounded ~50 ms instead
/// of accumulating unbounded delay.
#[derive(Debug)]
pub struct FrameScheduler {
    cursor: u64,
    lookahead: u64,
}

impl FrameScheduler {
    /// Create a scheduler with the default 50 ms lookahead.
    pub fn new() -> Self {
        Self::with_lookahead(lookahead_samples())
    }

    /// Create a scheduler with a custom lookahead, in samples.
    pub fn with_lookahead(lookahead: u64) -> Self {
        Self {
            cursor: 0,
            lookahead,
        }
    }

    /// Compute the start position for a frame of `frame_len` samples
    /// arriving when the device clock reads `now`, and advance the cursor
    /// past it.
    pub fn schedule(&mut self, now: u64, frame_len: u64) -> u64 {
        // cursor == now means nothing is buffered, which is the same
        // underrun condition as having fallen behind.
        if self.cursor <= now {
            self.cursor = now + self.lookahead;
        }
        let start = self.cursor;
        self.cursor += frame_len;
        start
    }

    /// Device-clock position at which all scheduled audio ends.
    pub fn scheduled_end(&self) -> u64 {
        self.cursor
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// A mix buffer addressed in absolute device-clock samples.
///
/// Scheduled frames are add-assigned at their target offset, so bursts
/// from different senders that overlap in time sum exactly as a shared
/// output device would sum them. Unscheduled stretches render as silence.
#[derive(Debug)]
pub struct Timeline {
    /// Absolute sample index of `pending[0]`
    head: u64,
    pending: VecDeque<f32>,
}

impl Timeline {
    /// Create an empty timeline at device position 0.
    pub fn new() -> Self {
        Self {
            head: 0,
            pending: VecDeque::new(),
        }
    }

    /// Current device-clock position.
    pub fn position(&self) -> u64 {
        self.head
    }

    /// Mix `samples` into the timeline starting at absolute sample
    /// `start`. A start already behind the head is clamped to the head.
    pub fn mix(&mut self, start: u64, samples: &[f32]) {
        let offset = start.saturating_sub(self.head) as usize;
        let needed = offset + samples.len();
        if self.pending.len() < needed {
            self.pending.resize(needed, 0.0);
        }
        for (i, sample) in samples.iter().enumerate() {
            self.pending[offset + i] += sample;
        }
    }

    /// Drain the next `out.len()` samples into the output buffer,
    /// advancing the device clock. Empty stretches yield zeros.
    pub fn fill(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            *slot = self.pending.pop_front().unwrap_or(0.0);
        }
        self.head += out.len() as u64;
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

struct PlaybackState {
    timeline: Timeline,
    scheduler: FrameScheduler,
}

struct PlaybackShared {
    state: Mutex<PlaybackState>,
    /// Device-clock position at which the current burst ends
    active_until: AtomicU64,
    /// Volume of the most recent frame, for "receiving" UI feedback
    level: AtomicU8,
}

/// Scheduled playback onto the default output device.
///
/// The cpal stream lives on a dedicated thread (streams are not `Send`);
/// its callback drains the shared timeline. Frames arriving from any
/// sender are scheduled independently and summed on the timeline, with no
/// explicit anti-clipping gain.
pub struct PlaybackEngine {
    shared: Arc<PlaybackShared>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    /// Open the default output device at 16 kHz mono and start the output
    /// stream. Fails if no device is available or the stream cannot be
    /// built, leaving nothing open.
    pub fn start() -> crate::Result<Self> {
        let shared = Arc::new(PlaybackShared {
            state: Mutex::new(PlaybackState {
                timeline: Timeline::new(),
                scheduler: FrameScheduler::new(),
            }),
            active_until: AtomicU64::new(0),
            level: AtomicU8::new(0),
        });

        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = crossbeam::channel::bounded::<Result<(), String>>(1);

        let shared_cb = Arc::clone(&shared);
        let running_thread = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("ptt-playback".to_string())
            .spawn(move || {
                let host = cpal::default_host();
                let device = match host.default_output_device() {
                    Some(device) => device,
                    None => {
                        let _ = ready_tx.send(Err("no output device available".to_string()));
                        return;
                    }
                };

                let config = StreamConfig {
                    channels: 1,
                    sample_rate: cpal::SampleRate(SAMPLE_RATE),
                    buffer_size: cpal::BufferSize::Default,
                };

                let stream = device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        shared_cb.state.lock().timeline.fill(data);
                    },
                    |err| {
                        log::warn!("Playback stream error: {}", err);
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }

                let _ = ready_tx.send(Ok(()));

                while running_thread.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }

                // Stream drops here, releasing the device
            })
            .map_err(|e| crate::error::Error::Playback(e.to_string()))?;

        let mut engine = Self {
            shared,
            running,
            thread_handle: Some(handle),
        };

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(engine),
            Ok(Err(e)) => {
                engine.stop();
                Err(crate::error::Error::Playback(e))
            }
            Err(_) => {
                engine.stop();
                Err(crate::error::Error::Playback(
                    "timed out opening output device".to_string(),
                ))
            }
        }
    }

    /// Schedule one received frame for playback and update the receiving
    /// level indicator. Empty frames schedule nothing (silent playback).
    pub fn play_frame(&self, frame: &AudioFrame) {
        self.shared
            .level
            .store(volume_estimate(&frame.samples), Ordering::Relaxed);

        if frame.is_empty() {
            return;
        }

        let mut state = self.shared.state.lock();
        let now = state.timeline.position();
        let start = state.scheduler.schedule(now, frame.len() as u64);
        state.timeline.mix(start, &frame.samples);

        self.shared
            .active_until
            .store(state.scheduler.scheduled_end(), Ordering::Relaxed);
    }

    /// Whether scheduled audio is still pending or playing. Falls back to
    /// false on its own once the device clock passes the last scheduled
    /// end.
    pub fn is_playing(&self) -> bool {
        let position = self.shared.state.lock().timeline.position();
        position < self.shared.active_until.load(Ordering::Relaxed)
    }

    /// Receiving volume level (0-100); 0 when nothing is playing.
    pub fn level(&self) -> u8 {
        if self.is_playing() {
            self.shared.level.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Stop the output stream and release the device.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_monotonic_without_underrun() {
        let mut scheduler = FrameScheduler::with_lookahead(800);

        // Device at 0, frames arriving in time: back to back, no overlap.
        let start_a = scheduler.schedule(0, 4096);
        let start_b = scheduler.schedule(3000, 4096);
        let start_c = scheduler.schedule(7000, 4096);

        assert_eq!(start_b, start_a + 4096);
        assert_eq!(start_c, start_b + 4096);
    }

    #[test]
    fn underrun_resets_cursor_to_bounded_lookahead() {
        let mut scheduler = FrameScheduler::with_lookahead(800);

        let start_a = scheduler.schedule(0, 4096);
        assert_eq!(start_a, 800);

        // Device clock has run far past the scheduled end: the next frame
        // re-buffers at now + lookahead instead of catching up from the
        // stale cursor.
        let start_b = scheduler.schedule(100_000, 4096);
        assert_eq!(start_b, 100_800);
        assert_eq!(scheduler.scheduled_end(), 100_800 + 4096);
    }

    #[test]
    fn first_frame_starts_behind_lookahead() {
        let mut scheduler = FrameScheduler::with_lookahead(800);
        assert_eq!(scheduler.schedule(0, 100), 800);
    }

    #[test]
    fn timeline_fills_gaps_with_silence() {
        let mut timeline = Timeline::new();
        timeline.mix(4, &[1.0, 1.0]);

        let mut out = [9.9f32; 8];
        timeline.fill(&mut out);
        assert_eq!(out, [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(timeline.position(), 8);
    }

    #[test]
    fn timeline_sums_overlapping_frames() {
        let mut timeline = Timeline::new();
        timeline.mix(0, &[0.5, 0.5, 0.5]);
        timeline.mix(1, &[0.25, 0.25]);

        let mut out = [0.0f32; 4];
        timeline.fill(&mut out);
        assert_eq!(out, [0.5, 0.75, 0.75, 0.0]);
    }

    #[test]
    fn timeline_clamps_late_frames_to_head() {
        let mut timeline = Timeline::new();
        let mut out = [0.0f32; 10];
        timeline.fill(&mut out);
        assert_eq!(timeline.position(), 10);

        // Scheduled start is already in the past; samples land at the head.
        timeline.mix(5, &[1.0, 2.0]);
        let mut out = [0.0f32; 2];
        timeline.fill(&mut out);
        assert_eq!(out, [1.0, 2.0]);
    }
}
