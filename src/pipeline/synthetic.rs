//! Synthetic ramp source for self-test and demos.
//!
//! The ramp pattern repeats every [`RAMP_PERIOD`] samples:
//!
//! | channel | sample `i`          |
//! |---------|---------------------|
//! | 0       | `i % 24`            |
//! | 1       | `24 - (i % 24)`     |
//! | 2       | `(i % 24) / 12`     |
//! | 3       | `10`                |
//!
//! Channels past 3 reuse the same four shapes in order. The pattern feeds two
//! things: the `RampDemo` command response (channel-major, see
//! [`ramp_pattern`]) and [`SyntheticSource`], an acquisition stand-in that
//! pushes interleaved ramp buffers into the data queue.

use crate::config::SyntheticConfig;
use crate::error::{Result, ScopeLinkError};
use crate::pipeline::packet::Buffer;
use crate::pipeline::queue::HandoffQueue;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub const RAMP_PERIOD: usize = 24;

/// Level halfway up the channel 0 ramp; a rising trigger here fires once per period.
pub const RAMP_MIDPOINT: u8 = (RAMP_PERIOD / 2) as u8;

/// Sample `i` of `channel` in the ramp pattern.
#[inline]
pub fn ramp_sample(channel: usize, i: usize) -> u8 {
    let phase = (i % RAMP_PERIOD) as u8;
    match channel % 4 {
        0 => phase,
        1 => RAMP_PERIOD as u8 - phase,
        2 => phase / 12,
        _ => 10,
    }
}

/// Channel-major ramp payload: `channels` blocks of `samples_per_channel` bytes.
pub fn ramp_pattern(channels: usize, samples_per_channel: usize) -> Vec<u8> {
    (0..channels)
        .flat_map(|ch| (0..samples_per_channel).map(move |i| ramp_sample(ch, i)))
        .collect()
}

/// Interleaved ramp buffer of `frames` frames, starting at sample `offset`.
pub fn ramp_buffer(channels: u8, frames: usize, offset: usize) -> Buffer {
    let width = channels as usize;
    let mut samples = Vec::with_capacity(frames * width);
    for i in offset..offset + frames {
        for ch in 0..width {
            samples.push(ramp_sample(ch, i));
        }
    }
    Buffer::new(channels, samples)
}

/// Background thread pushing ramp buffers into a data queue at a fixed interval.
pub struct SyntheticSource {
    running: Arc<AtomicBool>,
    produced: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn spawn(output: Arc<dyn HandoffQueue<Buffer>>, config: &SyntheticConfig) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let produced = Arc::new(AtomicU64::new(0));
        let channels = config.channel_count;
        let frames = config.samples_per_channel;
        let interval = Duration::from_millis(config.source_interval_ms);

        let running_clone = Arc::clone(&running);
        let produced_clone = Arc::clone(&produced);
        let handle = std::thread::Builder::new()
            .name("synthetic-source".to_string())
            .spawn(move || {
                let mut offset = 0usize;
                while running_clone.load(Ordering::Relaxed) {
                    output.push(ramp_buffer(channels, frames, offset));
                    produced_clone.fetch_add(1, Ordering::Relaxed);
                    // Shift the phase so consecutive buffers trigger at different offsets.
                    offset = (offset + frames) % RAMP_PERIOD;
                    std::thread::sleep(interval);
                }
            })
            .map_err(|source| ScopeLinkError::Spawn {
                thread: "synthetic-source".to_string(),
                source,
            })?;

        tracing::info!(
            "Synthetic source started: {} channels x {} samples every {:?}",
            channels,
            frames,
            interval
        );

        Ok(Self {
            running,
            produced,
            handle: Some(handle),
        })
    }

    /// Buffers pushed so far.
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            tracing::info!("Synthetic source stopped after {} buffers", self.produced());
        }
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}
