//! Test data builders for creating test objects

use scope_link::config::{QueueConfig, ScopeConfig};
use scope_link::pipeline::{
    Buffer, ChannelQueue, Controller, HandoffQueue, OverflowPolicy, TriggerEdge,
};
use std::sync::Arc;

/// Builder for fast-polling test configurations
pub struct ConfigBuilder {
    config: ScopeConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = ScopeConfig::default();
        config.pipeline.stage_poll_ms = 1;
        config.pipeline.dispatch_poll_ms = 2;
        Self { config }
    }

    pub fn channels(mut self, channels: u8) -> Self {
        self.config.pipeline.channel_count = channels;
        self
    }

    pub fn trigger(mut self, level: u8, edge: TriggerEdge) -> Self {
        self.config.pipeline.trigger_level = level;
        self.config.pipeline.trigger_edge = edge;
        self
    }

    pub fn persistence(mut self, depth: usize) -> Self {
        self.config.pipeline.persistence_depth = depth;
        self
    }

    pub fn synthetic(mut self, enabled: bool) -> Self {
        self.config.synthetic.enabled = enabled;
        self
    }

    pub fn bounded_outbound(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.config.queues.outbound = QueueConfig::bounded(capacity, overflow);
        self
    }

    pub fn build(self) -> ScopeConfig {
        self.config
    }

    /// Start a controller on a fresh unbounded data queue.
    pub fn start(self) -> (Controller, Arc<dyn HandoffQueue<Buffer>>) {
        let data: Arc<dyn HandoffQueue<Buffer>> = Arc::new(ChannelQueue::unbounded("data"));
        let controller = Controller::new(self.build(), Arc::clone(&data)).unwrap();
        (controller, data)
    }
}

/// One interleaved buffer: `frames` frames where channel 0 steps from 0 to
/// 100 halfway through and every other channel holds its own index.
pub fn step_buffer(channels: u8, frames: usize) -> Buffer {
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for frame in 0..frames {
        for ch in 0..channels {
            if ch == 0 {
                samples.push(if frame < frames / 2 { 0 } else { 100 });
            } else {
                samples.push(ch);
            }
        }
    }
    Buffer::new(channels, samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_buffer_layout() {
        let buf = step_buffer(2, 4);
        assert_eq!(buf.samples(), &[0, 1, 0, 1, 100, 1, 100, 1]);
    }
}
