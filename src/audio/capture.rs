// ABOUTME: Microphone capture pipeline for push-to-talk
// ABOUTME: Thread-owned cpal input stream sliced into fixed frames

use crate::audio::frame::{volume_estimate, AudioFrame, FrameSlicer};
use crate::SAMPLE_RATE;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;

/// Live microphone capture for one talk burst.
///
/// The cpal input stream is owned by a dedicated thread (streams are not
/// `Send`). Captured buffers are sliced into fixed 4096-sample frames and
/// handed to the frame sink; the capture side never monitors its own
/// input, so a talker cannot hear their own loopback.
///
/// [`CapturePipeline::start`] is synchronous with respect to device
/// acquisition: it only returns `Ok` once the input stream is built and
/// playing, and on any failure it returns `Err` with the thread joined
/// and no stream or device left open.
pub struct CapturePipeline {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    level: Arc<AtomicU8>,
}

impl CapturePipeline {
    /// Acquire the default input device at 16 kHz mono and start
    /// streaming frames into `frame_tx`.
    pub fn start(frame_tx: mpsc::UnboundedSender<AudioFrame>) -> crate::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let level = Arc::new(AtomicU8::new(0));
        let (ready_tx, ready_rx) = crossbeam::channel::bounded::<Result<(), String>>(1);

        let running_cb = Arc::clone(&running);
        let running_thread = Arc::clone(&running);
        let level_cb = Arc::clone(&level);

        let handle = thread::Builder::new()
            .name("ptt-capture".to_string())
            .spawn(move || {
                let host = cpal::default_host();
                let device = match host.default_input_device() {
                    Some(device) => device,
                    None => {
                        let _ = ready_tx.send(Err("no input device available".to_string()));
                        return;
                    }
                };

                let config = StreamConfig {
                    channels: 1,
                    sample_rate: cpal::SampleRate(SAMPLE_RATE),
                    buffer_size: cpal::BufferSize::Default,
                };

                let mut slicer = FrameSlicer::new();
                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !running_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        for frame in slicer.push(data) {
                            level_cb.store(volume_estimate(&frame.samples), Ordering::Relaxed);
                            // Receiver gone means the burst is over; frames
                            // are simply dropped.
                            let _ = frame_tx.send(frame);
                        }
                    },
                    |err| {
                        log::warn!("Capture stream error: {}", err);
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

                // Stream drops here, stopping the hardware track
            })
            .map_err(|e| crate::error::Error::Capture(e.to_string()))?;

        let mut pipeline = Self {
            running,
            thread_handle: Some(handle),
            level,
        };

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => Ok(pipeline),
            Ok(Err(e)) => {
                pipeline.stop();
                Err(crate::error::Error::Capture(e))
            }
            Err(_) => {
                pipeline.stop();
                Err(crate::error::Error::Capture(
                    "timed out acquiring input device".to_string(),
                ))
            }
        }
    }

    /// Sending volume level of the most recent frame (0-100).
    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    /// Stop capturing and release the device. Joins the stream thread, so
    /// the hardware track is closed by the time this returns.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.level.store(0, Ordering::Relaxed);
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
