//! Configuration sections
//!
//! Each section maps to a table in the config file. Every field has a default,
//! so a partial file (or none at all) yields a working pipeline.
//!
//! # Main Types
//!
//! - [`PipelineConfig`] - Poll intervals and the startup stage configuration
//! - [`QueueConfig`] - Capacity and overflow policy for the hand-off queues
//! - [`SyntheticConfig`] - The ramp self-test source

use crate::pipeline::packet::MAX_CHANNELS;
use crate::pipeline::queue::OverflowPolicy;
use crate::pipeline::stages::TriggerEdge;
use serde::{Deserialize, Serialize};

/// Default stage idle wait in milliseconds
pub const DEFAULT_STAGE_POLL_MS: u64 = 1;

/// Default command dispatch idle wait in milliseconds
pub const DEFAULT_DISPATCH_POLL_MS: u64 = 100;

/// Default trigger level applied at startup
pub const DEFAULT_TRIGGER_LEVEL: u8 = 50;

// ==================== Pipeline Config ====================

/// Pipeline timing and startup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// How long an idle stage waits for input before polling again
    pub stage_poll_ms: u64,

    /// How long the dispatch loop sleeps when the inbound queue is empty
    pub dispatch_poll_ms: u64,

    /// Channel count applied at startup
    pub channel_count: u8,

    /// 1-based trigger channel applied at startup
    pub trigger_channel: u8,

    /// Trigger level applied at startup
    pub trigger_level: u8,

    /// Trigger edge applied at startup
    pub trigger_edge: TriggerEdge,

    /// Frames emitted per trigger (0 = rest of the buffer)
    pub trigger_window_frames: usize,

    /// Captures averaged by the processor's persistence buffer
    pub persistence_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_poll_ms: DEFAULT_STAGE_POLL_MS,
            dispatch_poll_ms: DEFAULT_DISPATCH_POLL_MS,
            channel_count: 1,
            trigger_channel: 1,
            trigger_level: DEFAULT_TRIGGER_LEVEL,
            trigger_edge: TriggerEdge::Rising,
            trigger_window_frames: 0,
            persistence_depth: 1,
        }
    }
}

impl PipelineConfig {
    /// Check startup values against pipeline limits
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.dispatch_poll_ms == 0 {
            return Err("pipeline.dispatch_poll_ms must be non-zero".to_string());
        }
        if self.channel_count == 0 || self.channel_count > MAX_CHANNELS {
            return Err(format!(
                "pipeline.channel_count must be between 1 and {}",
                MAX_CHANNELS
            ));
        }
        if self.trigger_channel == 0 || self.trigger_channel > self.channel_count {
            return Err("pipeline.trigger_channel must be between 1 and channel_count".to_string());
        }
        Ok(())
    }
}

// ==================== Queue Config ====================

/// Hand-off queue sizing
///
/// Queues are unbounded unless `capacity` is set. A bounded queue never blocks
/// its producer; it applies `overflow` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

impl QueueConfig {
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            overflow,
        }
    }
}

// ==================== Synthetic Config ====================

/// Ramp self-test source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Whether the `RampDemo` command is answered
    pub enabled: bool,

    /// Channels in the ramp payload
    pub channel_count: u8,

    /// Bytes per channel in the ramp payload
    pub samples_per_channel: usize,

    /// Interval between buffers when running as an acquisition source
    pub source_interval_ms: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_count: 4,
            samples_per_channel: 1024,
            source_interval_ms: 50,
        }
    }
}

impl SyntheticConfig {
    /// Size of the ramp payload in bytes
    pub fn packet_size(&self) -> usize {
        self.channel_count as usize * self.samples_per_channel
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.channel_count == 0 || self.channel_count > MAX_CHANNELS {
            return Err(format!(
                "synthetic.channel_count must be between 1 and {}",
                MAX_CHANNELS
            ));
        }
        if self.samples_per_channel == 0 {
            return Err("synthetic.samples_per_channel must be non-zero".to_string());
        }
        Ok(())
    }
}
