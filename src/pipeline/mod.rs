//! Acquisition-to-host data pipeline.
//!
//! Raw buffers flow through three stages, each on its own thread, connected by
//! hand-off queues. The controller owns everything and runs a separate
//! dispatch thread for host commands.
//!
//! # Architecture
//!
//! ```text
//! [source] ──► data ──► [Trigger] ──► trigger ──► [Processor] ──► processor ──► [PostProcessor] ──┐
//!                                                                                                  ▼
//! [host] ──► inbound ──► [dispatch] ─────────────────────────────────────────────────────────► outbound ──► [host]
//! ```
//!
//! # Design
//!
//! - **Single ownership**: every `Buffer`, `Frame` and `Packet` is moved through
//!   the queues; whoever holds it last drops it.
//! - **Pause barrier**: `Stage::pause` returns only once the worker is parked
//!   between items.
//! - **Reconfigure = pause, mutate, flush**: the pipeline is left paused.
//! - **Injected queues**: stages only see `Arc<dyn HandoffQueue<T>>`.

pub mod bridge;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod packet;
pub mod queue;
pub mod stage;
pub mod stages;
pub mod synthetic;

pub use bridge::HostLink;
pub use controller::{Controller, ControllerState, ControllerStats, FlushReport};
pub use dispatch::{CommandDispatcher, DispatchOutcome};
pub use error::{StageError, StageResult};
pub use packet::{Buffer, CommandCode, Frame, Packet, DATA_PACKET_ID, MAX_CHANNELS};
pub use queue::{ChannelQueue, HandoffQueue, OverflowPolicy};
pub use stage::{Stage, StageStatsSnapshot, StageWorker};
pub use stages::{
    PostProcessorSettings, PostProcessorStage, ProcessorSettings, ProcessorStage, TriggerEdge,
    TriggerSettings, TriggerStage,
};
pub use synthetic::{ramp_buffer, ramp_pattern, SyntheticSource, RAMP_MIDPOINT, RAMP_PERIOD};
