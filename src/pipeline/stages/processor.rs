//! Processor stage: de-interleaves triggered buffers into per-channel
//! traces and folds them into the persistence buffer.
//!
//! The persistence buffer keeps the last `persistence_depth` captures; every
//! emitted [`Frame`] carries their per-sample average. It survives pause and
//! unpause and is only cleared by an explicit flush (`reset`) or when the
//! capture shape changes.

use crate::pipeline::error::{StageError, StageResult};
use crate::pipeline::packet::{Buffer, Frame};
use crate::pipeline::stage::StageWorker;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSettings {
    pub channel_count: u8,
    /// Captures averaged together. Values below one behave as one.
    pub persistence_depth: usize,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            channel_count: 1,
            persistence_depth: 1,
        }
    }
}

type Traces = Vec<Vec<u8>>;

pub struct ProcessorStage {
    persistence: VecDeque<Traces>,
    sequence: u64,
}

impl ProcessorStage {
    pub fn new() -> Self {
        Self {
            persistence: VecDeque::new(),
            sequence: 0,
        }
    }

    /// Captures currently held in the persistence buffer.
    pub fn persistence_len(&self) -> usize {
        self.persistence.len()
    }

    /// Drop every held capture. The next frame starts a fresh average.
    pub fn flush_persistence(&mut self) {
        if !self.persistence.is_empty() {
            tracing::trace!("Dropping {} persisted captures", self.persistence.len());
        }
        self.persistence.clear();
    }

    fn deinterleave(buffer: &Buffer) -> Traces {
        let channels = buffer.channels() as usize;
        let mut traces = vec![Vec::with_capacity(buffer.frame_count()); channels];
        for frame in buffer.samples().chunks_exact(channels) {
            for (trace, &sample) in traces.iter_mut().zip(frame) {
                trace.push(sample);
            }
        }
        traces
    }

    fn same_shape(a: &Traces, b: &Traces) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.len() == y.len())
    }

    fn average(&self) -> Traces {
        let n = self.persistence.len();
        let Some(latest) = self.persistence.back() else {
            return Vec::new();
        };
        if n == 1 {
            return latest.clone();
        }

        latest
            .iter()
            .enumerate()
            .map(|(ch, trace)| {
                (0..trace.len())
                    .map(|i| {
                        let sum: usize = self.persistence.iter().map(|t| t[ch][i] as usize).sum();
                        ((sum + n / 2) / n) as u8
                    })
                    .collect()
            })
            .collect()
    }
}

impl Default for ProcessorStage {
    fn default() -> Self {
        Self::new()
    }
}

impl StageWorker for ProcessorStage {
    type Input = Buffer;
    type Output = Frame;
    type Settings = ProcessorSettings;

    fn name(&self) -> &'static str {
        "Processor"
    }

    fn process(
        &mut self,
        item: Buffer,
        settings: &ProcessorSettings,
        emit: &mut dyn FnMut(Frame),
    ) -> StageResult<()> {
        if item.channels() != settings.channel_count {
            return Err(StageError::ChannelMismatch {
                expected: settings.channel_count,
                actual: item.channels(),
            });
        }
        if item.is_empty() {
            return Err(StageError::Empty);
        }
        if !item.is_aligned() {
            return Err(StageError::TruncatedFrame {
                len: item.len(),
                channels: item.channels(),
            });
        }

        let traces = Self::deinterleave(&item);
        drop(item);

        if let Some(prev) = self.persistence.back() {
            if !Self::same_shape(prev, &traces) {
                tracing::debug!("Capture shape changed, restarting persistence");
                self.persistence.clear();
            }
        }
        self.persistence.push_back(traces);
        let depth = settings.persistence_depth.max(1);
        while self.persistence.len() > depth {
            self.persistence.pop_front();
        }

        let frame = Frame {
            traces: self.average(),
            averaged_over: self.persistence.len(),
            sequence: self.sequence,
        };
        self.sequence += 1;
        emit(frame);
        Ok(())
    }

    fn reset(&mut self) {
        self.flush_persistence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(stage: &mut ProcessorStage, buf: Buffer, settings: &ProcessorSettings) -> Vec<Frame> {
        let mut out = Vec::new();
        stage
            .process(buf, settings, &mut |f| out.push(f))
            .expect("process");
        out
    }

    #[test]
    fn test_deinterleave() {
        let mut stage = ProcessorStage::new();
        let settings = ProcessorSettings {
            channel_count: 2,
            persistence_depth: 1,
        };
        let out = run(&mut stage, Buffer::new(2, vec![1, 10, 2, 20, 3, 30]), &settings);
        assert_eq!(out[0].traces, vec![vec![1, 2, 3], vec![10, 20, 30]]);
        assert_eq!(out[0].averaged_over, 1);
    }

    #[test]
    fn test_persistence_averages_and_resets() {
        let mut stage = ProcessorStage::new();
        let settings = ProcessorSettings {
            channel_count: 1,
            persistence_depth: 2,
        };
        run(&mut stage, Buffer::new(1, vec![10, 20]), &settings);
        let out = run(&mut stage, Buffer::new(1, vec![20, 40]), &settings);
        assert_eq!(out[0].traces, vec![vec![15, 30]]);
        assert_eq!(out[0].averaged_over, 2);
        assert_eq!(out[0].sequence, 1);

        // Depth bounds the history.
        run(&mut stage, Buffer::new(1, vec![30, 60]), &settings);
        assert_eq!(stage.persistence_len(), 2);

        stage.reset();
        assert_eq!(stage.persistence_len(), 0);
        let out = run(&mut stage, Buffer::new(1, vec![8, 8]), &settings);
        assert_eq!(out[0].traces, vec![vec![8, 8]]);
    }

    #[test]
    fn test_shape_change_restarts_persistence() {
        let mut stage = ProcessorStage::new();
        let settings = ProcessorSettings {
            channel_count: 1,
            persistence_depth: 4,
        };
        run(&mut stage, Buffer::new(1, vec![1, 2, 3]), &settings);
        run(&mut stage, Buffer::new(1, vec![1, 2]), &settings);
        assert_eq!(stage.persistence_len(), 1);
    }

    #[test]
    fn test_rejects_mismatched_channels() {
        let mut stage = ProcessorStage::new();
        let settings = ProcessorSettings::default();
        let res = stage.process(Buffer::new(4, vec![0; 8]), &settings, &mut |_| {});
        assert!(matches!(res, Err(StageError::ChannelMismatch { .. })));
        assert_eq!(stage.persistence_len(), 0);
    }
}
