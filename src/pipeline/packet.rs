//! Owned data units that travel through the pipeline.
//!
//! Every type here is single-owner and deliberately not `Clone`: a value is
//! held by exactly one of the acquisition source, a queue, a stage, or the
//! host link, and dropping it is the only way it is reclaimed.

/// Maximum number of interleaved channels a buffer may carry.
pub const MAX_CHANNELS: u8 = 8;

/// Packet id stamped on waveform data and self-test responses.
pub const DATA_PACKET_ID: u8 = 0x11;

/// Raw sample block from the acquisition source.
///
/// Samples are channel-interleaved: frame `i` is
/// `samples[i * channels .. (i + 1) * channels]`.
pub struct Buffer {
    channels: u8,
    samples: Vec<u8>,
}

impl Buffer {
    pub fn new(channels: u8, samples: Vec<u8>) -> Self {
        Self { channels, samples }
    }

    #[inline]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    #[inline]
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of complete frames. Zero channels means zero frames.
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Whether the sample count is a whole number of frames.
    pub fn is_aligned(&self) -> bool {
        self.channels != 0 && self.samples.len() % self.channels as usize == 0
    }

    /// Sample of `channel` (0-based) in frame `frame`.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> Option<u8> {
        self.samples
            .get(frame * self.channels as usize + channel)
            .copied()
    }

    pub fn into_samples(self) -> Vec<u8> {
        self.samples
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("channels", &self.channels)
            .field("len", &self.samples.len())
            .finish()
    }
}

/// Processor output: one de-interleaved trace per channel.
pub struct Frame {
    /// Per-channel traces, already folded into the persistence average.
    pub traces: Vec<Vec<u8>>,
    /// How many captures contributed to `traces`.
    pub averaged_over: usize,
    /// Monotonic counter assigned by the processor.
    pub sequence: u64,
}

impl Frame {
    pub fn channel_count(&self) -> usize {
        self.traces.len()
    }

    /// Samples per channel (all traces share one length).
    pub fn trace_len(&self) -> usize {
        self.traces.first().map(Vec::len).unwrap_or(0)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("channels", &self.traces.len())
            .field("trace_len", &self.trace_len())
            .field("averaged_over", &self.averaged_over)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Command or response message exchanged with the host.
#[derive(PartialEq, Eq)]
pub struct Packet {
    pub command: u8,
    pub data: Vec<u8>,
    pub packet_id: u8,
}

impl Packet {
    pub fn new(command: u8, data: Vec<u8>, packet_id: u8) -> Self {
        Self {
            command,
            data,
            packet_id,
        }
    }

    /// A payload-less command packet as sent by the host.
    pub fn command(code: CommandCode, packet_id: u8) -> Self {
        Self::new(code.as_u8(), Vec::new(), packet_id)
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    pub fn code(&self) -> CommandCode {
        CommandCode::from_u8(self.command)
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("command", &format_args!("0x{:02X}", self.command))
            .field("data_size", &self.data.len())
            .field("packet_id", &format_args!("0x{:02X}", self.packet_id))
            .finish()
    }
}

/// Host command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// `0x01`: request current data.
    GetData,
    /// `0x02..=0x04`: reserved, always rejected.
    Reserved(u8),
    /// `0x1F`: synthetic ramp self-test.
    RampDemo,
    /// Anything else.
    Unknown(u8),
}

impl CommandCode {
    pub const GET_DATA: u8 = 0x01;
    pub const RAMP_DEMO: u8 = 0x1F;

    pub fn from_u8(code: u8) -> Self {
        match code {
            Self::GET_DATA => CommandCode::GetData,
            0x02..=0x04 => CommandCode::Reserved(code),
            Self::RAMP_DEMO => CommandCode::RampDemo,
            other => CommandCode::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            CommandCode::GetData => Self::GET_DATA,
            CommandCode::RampDemo => Self::RAMP_DEMO,
            CommandCode::Reserved(c) | CommandCode::Unknown(c) => c,
        }
    }
}
