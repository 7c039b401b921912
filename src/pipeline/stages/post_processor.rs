//! PostProcessor stage: formats processed frames into host data packets.

use crate::pipeline::error::{StageError, StageResult};
use crate::pipeline::packet::{CommandCode, Frame, Packet, DATA_PACKET_ID};
use crate::pipeline::stage::StageWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostProcessorSettings {
    pub channel_count: u8,
}

impl Default for PostProcessorSettings {
    fn default() -> Self {
        Self { channel_count: 1 }
    }
}

/// Emits one [`Packet`] per frame with a channel-major payload: all of
/// channel 0, then all of channel 1, and so on.
pub struct PostProcessorStage;

impl PostProcessorStage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PostProcessorStage {
    fn default() -> Self {
        Self::new()
    }
}

impl StageWorker for PostProcessorStage {
    type Input = Frame;
    type Output = Packet;
    type Settings = PostProcessorSettings;

    fn name(&self) -> &'static str {
        "PostProcessor"
    }

    fn process(
        &mut self,
        item: Frame,
        settings: &PostProcessorSettings,
        emit: &mut dyn FnMut(Packet),
    ) -> StageResult<()> {
        if item.channel_count() != settings.channel_count as usize {
            return Err(StageError::ChannelMismatch {
                expected: settings.channel_count,
                actual: item.channel_count() as u8,
            });
        }
        if item.trace_len() == 0 {
            return Err(StageError::Empty);
        }

        let payload = item.traces.concat();
        emit(Packet::new(CommandCode::GET_DATA, payload, DATA_PACKET_ID));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_major_payload() {
        let mut stage = PostProcessorStage::new();
        let frame = Frame {
            traces: vec![vec![1, 2], vec![3, 4]],
            averaged_over: 1,
            sequence: 9,
        };
        let mut out = Vec::new();
        stage
            .process(frame, &PostProcessorSettings { channel_count: 2 }, &mut |p| out.push(p))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data, vec![1, 2, 3, 4]);
        assert_eq!(out[0].packet_id, DATA_PACKET_ID);
        assert_eq!(out[0].command, CommandCode::GET_DATA);
    }

    #[test]
    fn test_rejects_stale_channel_count() {
        let mut stage = PostProcessorStage::new();
        let frame = Frame {
            traces: vec![vec![1]],
            averaged_over: 1,
            sequence: 0,
        };
        let res = stage.process(frame, &PostProcessorSettings { channel_count: 4 }, &mut |_| {});
        assert_eq!(
            res,
            Err(StageError::ChannelMismatch {
                expected: 4,
                actual: 1
            })
        );
    }
}
