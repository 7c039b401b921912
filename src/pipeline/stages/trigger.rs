//! Trigger stage: aligns captures on a level crossing.
//!
//! Scans the trigger channel of each interleaved buffer for the first
//! crossing of `level` in the configured direction and emits the window that
//! starts there. Buffers with no crossing are consumed without output.

use crate::pipeline::error::{StageError, StageResult};
use crate::pipeline::packet::Buffer;
use crate::pipeline::stage::StageWorker;
use serde::{Deserialize, Serialize};

/// Direction of the crossing that fires the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEdge {
    #[default]
    Rising,
    Falling,
}

impl TriggerEdge {
    /// Whether `prev → cur` crosses `level` in this direction.
    #[inline]
    pub fn crosses(self, prev: u8, cur: u8, level: u8) -> bool {
        match self {
            TriggerEdge::Rising => prev < level && cur >= level,
            TriggerEdge::Falling => prev > level && cur <= level,
        }
    }
}

impl std::fmt::Display for TriggerEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerEdge::Rising => write!(f, "rising"),
            TriggerEdge::Falling => write!(f, "falling"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSettings {
    pub channel_count: u8,
    /// 1-based channel to watch.
    pub trigger_channel: u8,
    pub level: u8,
    pub edge: TriggerEdge,
    /// Frames emitted per trigger. Zero means up to the end of the buffer.
    pub window_frames: usize,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            channel_count: 1,
            trigger_channel: 1,
            level: 50,
            edge: TriggerEdge::Rising,
            window_frames: 0,
        }
    }
}

pub struct TriggerStage;

impl TriggerStage {
    pub fn new() -> Self {
        Self
    }

    /// Frame index of the first crossing, if any.
    pub fn find_crossing(buffer: &Buffer, channel: usize, level: u8, edge: TriggerEdge) -> Option<usize> {
        let mut prev = buffer.sample(0, channel)?;
        for frame in 1..buffer.frame_count() {
            let cur = buffer.sample(frame, channel)?;
            if edge.crosses(prev, cur, level) {
                return Some(frame);
            }
            prev = cur;
        }
        None
    }
}

impl Default for TriggerStage {
    fn default() -> Self {
        Self::new()
    }
}

impl StageWorker for TriggerStage {
    type Input = Buffer;
    type Output = Buffer;
    type Settings = TriggerSettings;

    fn name(&self) -> &'static str {
        "Trigger"
    }

    fn process(
        &mut self,
        item: Buffer,
        settings: &TriggerSettings,
        emit: &mut dyn FnMut(Buffer),
    ) -> StageResult<()> {
        let channels = settings.channel_count;
        if item.channels() != channels {
            return Err(StageError::ChannelMismatch {
                expected: channels,
                actual: item.channels(),
            });
        }
        if item.is_empty() {
            return Err(StageError::Empty);
        }
        if !item.is_aligned() {
            return Err(StageError::TruncatedFrame {
                len: item.len(),
                channels,
            });
        }
        if settings.trigger_channel == 0 || settings.trigger_channel > channels {
            return Err(StageError::TriggerChannelOutOfRange {
                channel: settings.trigger_channel,
                channels,
            });
        }

        let channel = (settings.trigger_channel - 1) as usize;
        let Some(start) = Self::find_crossing(&item, channel, settings.level, settings.edge) else {
            tracing::trace!("No {} crossing of {} in buffer", settings.edge, settings.level);
            return Ok(());
        };

        let frames = item.frame_count();
        let end = if settings.window_frames == 0 {
            frames
        } else {
            (start + settings.window_frames).min(frames)
        };

        let width = channels as usize;
        let mut samples = item.into_samples();
        samples.truncate(end * width);
        samples.drain(..start * width);
        emit(Buffer::new(channels, samples));
        Ok(())
    }
}
