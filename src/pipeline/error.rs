//! Stage-local error types.
//!
//! These never leave a stage worker: the runner logs them and drops the item.

use thiserror::Error;

/// Reasons a stage refuses a single item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    #[error("Buffer has {actual} channels, stage configured for {expected}")]
    ChannelMismatch { expected: u8, actual: u8 },

    #[error("Buffer of {len} samples is not a whole number of {channels}-channel frames")]
    TruncatedFrame { len: usize, channels: u8 },

    #[error("Trigger channel {channel} out of range for {channels} channels")]
    TriggerChannelOutOfRange { channel: u8, channels: u8 },

    #[error("Empty item")]
    Empty,
}

pub type StageResult<T> = std::result::Result<T, StageError>;
