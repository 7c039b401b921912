//! Pipeline controller: owns the stages, the queues between them, and the
//! command dispatch thread.
//!
//! # Lifecycle
//!
//! ```text
//! Constructing ──► Running ──► Stopping ──► Stopped
//!   queues,          dispatch     stop flag,    stages
//!   stages,          thread       dispatch      joined
//!   defaults         running      joined
//! ```
//!
//! # Reconfiguration
//!
//! Every setter runs the same sequence: pause all stages (fixed order:
//! Trigger, Processor, PostProcessor), mutate settings, flush. The pipeline is
//! left **paused** afterwards. Resuming is always an explicit
//! [`Controller::unpause`] by the caller; the controller itself starts paused
//! because construction applies the default configuration through the same
//! setters.

use crate::config::{QueueConfig, ScopeConfig};
use crate::error::{Result, ScopeLinkError};
use crate::pipeline::bridge::HostLink;
use crate::pipeline::dispatch::{CommandDispatcher, DispatchOutcome};
use crate::pipeline::packet::{Buffer, Frame, Packet, MAX_CHANNELS};
use crate::pipeline::queue::{ChannelQueue, HandoffQueue};
use crate::pipeline::stage::{Stage, StageStatsSnapshot};
use crate::pipeline::stages::{
    PostProcessorSettings, PostProcessorStage, ProcessorSettings, ProcessorStage, TriggerEdge,
    TriggerSettings, TriggerStage,
};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControllerState {
    Constructing = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ControllerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ControllerState::Constructing,
            1 => ControllerState::Running,
            2 => ControllerState::Stopping,
            _ => ControllerState::Stopped,
        }
    }
}

/// Items reclaimed by one flush, per queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub data: usize,
    pub triggered: usize,
    pub processed: usize,
}

impl FlushReport {
    pub fn total(&self) -> usize {
        self.data + self.triggered + self.processed
    }
}

#[derive(Debug, Default)]
struct DispatchCounters {
    dispatched: AtomicU64,
    responses: AtomicU64,
    rejected: AtomicU64,
}

impl DispatchCounters {
    fn record(&self, outcome: DispatchOutcome) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        match outcome {
            DispatchOutcome::Responded(n) => {
                self.responses.fetch_add(n as u64, Ordering::Relaxed);
            }
            DispatchOutcome::Reserved(_) | DispatchOutcome::Unknown(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
            }
            DispatchOutcome::Handled => {}
        }
    }
}

/// Snapshot of controller and stage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub commands_dispatched: u64,
    pub responses_sent: u64,
    pub commands_rejected: u64,
    pub flushes: u64,
    pub trigger: StageStatsSnapshot,
    pub processor: StageStatsSnapshot,
    pub post_processor: StageStatsSnapshot,
}

fn make_queue<T: Send + 'static>(name: &str, config: &QueueConfig) -> Arc<dyn HandoffQueue<T>> {
    Arc::new(ChannelQueue::with_capacity(
        name,
        config.capacity,
        config.overflow,
    ))
}

/// Owner of the whole acquisition-to-host pipeline.
pub struct Controller {
    state: AtomicU8,
    stop: Arc<AtomicBool>,

    trigger: Stage<TriggerStage>,
    processor: Stage<ProcessorStage>,
    post_processor: Stage<PostProcessorStage>,

    data_queue: Arc<dyn HandoffQueue<Buffer>>,
    trigger_queue: Arc<dyn HandoffQueue<Buffer>>,
    processor_queue: Arc<dyn HandoffQueue<Frame>>,
    inbound: Arc<dyn HandoffQueue<Packet>>,
    outbound: Arc<dyn HandoffQueue<Packet>>,

    counters: Arc<DispatchCounters>,
    flushes: AtomicU64,
    dispatch_handle: Option<JoinHandle<()>>,
}

impl Controller {
    /// Build the pipeline on top of `data_queue` and start the dispatch thread.
    ///
    /// The returned controller is `Running` with the pipeline paused.
    pub fn new(config: ScopeConfig, data_queue: Arc<dyn HandoffQueue<Buffer>>) -> Result<Self> {
        config.validate()?;
        let pipeline = &config.pipeline;
        let stage_poll = Duration::from_millis(pipeline.stage_poll_ms);

        let trigger_queue = make_queue("trigger", &config.queues.trigger);
        let processor_queue = make_queue("processor", &config.queues.processor);
        let inbound = make_queue("inbound", &config.queues.inbound);
        let outbound = make_queue("outbound", &config.queues.outbound);

        let trigger = Stage::spawn(
            TriggerStage::new(),
            TriggerSettings {
                window_frames: pipeline.trigger_window_frames,
                ..TriggerSettings::default()
            },
            Arc::clone(&data_queue),
            Arc::clone(&trigger_queue),
            stage_poll,
        )?;
        let processor = Stage::spawn(
            ProcessorStage::new(),
            ProcessorSettings {
                persistence_depth: pipeline.persistence_depth,
                ..ProcessorSettings::default()
            },
            Arc::clone(&trigger_queue),
            Arc::clone(&processor_queue),
            stage_poll,
        )?;
        let post_processor = Stage::spawn(
            PostProcessorStage::new(),
            PostProcessorSettings::default(),
            Arc::clone(&processor_queue),
            Arc::clone(&outbound),
            stage_poll,
        )?;

        let mut controller = Self {
            state: AtomicU8::new(ControllerState::Constructing as u8),
            stop: Arc::new(AtomicBool::new(false)),
            trigger,
            processor,
            post_processor,
            data_queue,
            trigger_queue,
            processor_queue,
            inbound,
            outbound,
            counters: Arc::new(DispatchCounters::default()),
            flushes: AtomicU64::new(0),
            dispatch_handle: None,
        };

        // Default configuration
        controller.set_channel_count(pipeline.channel_count)?;
        controller.set_trigger_channel(pipeline.trigger_channel)?;
        controller.set_trigger_level(pipeline.trigger_level);
        match pipeline.trigger_edge {
            TriggerEdge::Rising => controller.set_trigger_edge_rising(),
            TriggerEdge::Falling => controller.set_trigger_edge_falling(),
        };

        controller.spawn_dispatch(
            CommandDispatcher::new(&config.synthetic),
            Duration::from_millis(pipeline.dispatch_poll_ms),
        )?;
        controller.set_state(ControllerState::Running);

        tracing::info!("Controller created");
        Ok(controller)
    }

    fn spawn_dispatch(&mut self, dispatcher: CommandDispatcher, poll: Duration) -> Result<()> {
        let stop = Arc::clone(&self.stop);
        let inbound = Arc::clone(&self.inbound);
        let outbound = Arc::clone(&self.outbound);
        let counters = Arc::clone(&self.counters);

        let handle = std::thread::Builder::new()
            .name("controller-dispatch".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    while !stop.load(Ordering::Acquire) {
                        let Some(packet) = inbound.pop() else {
                            break;
                        };
                        let outcome = dispatcher.dispatch(packet, outbound.as_ref());
                        counters.record(outcome);
                    }
                    std::thread::sleep(poll);
                }
                tracing::debug!("Dispatch loop exiting");
            })
            .map_err(|source| ScopeLinkError::Spawn {
                thread: "controller-dispatch".to_string(),
                source,
            })?;

        self.dispatch_handle = Some(handle);
        Ok(())
    }

    fn set_state(&self, state: ControllerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn state(&self) -> ControllerState {
        ControllerState::from_u8(self.state.load(Ordering::Acquire))
    }

    // ── Pipeline lifecycle ──

    /// Pause every stage and wait until all are quiescent.
    pub fn pause(&self) {
        tracing::debug!("Pausing pipeline");
        self.trigger.pause();
        self.processor.pause();
        self.post_processor.pause();
    }

    /// Resume every stage.
    pub fn unpause(&self) {
        tracing::debug!("Unpausing pipeline");
        self.trigger.unpause();
        self.processor.unpause();
        self.post_processor.unpause();
    }

    /// Whether every stage is paused.
    pub fn is_paused(&self) -> bool {
        self.trigger.is_paused() && self.processor.is_paused() && self.post_processor.is_paused()
    }

    /// Pause, drain every inter-stage queue and clear the persistence buffer.
    ///
    /// The pipeline stays paused; call [`unpause`](Self::unpause) to resume.
    /// The outbound queue is left alone: whatever already reached the host
    /// side is the transport's to deliver.
    pub fn flush(&self) -> FlushReport {
        tracing::info!("Flushing pipeline");
        self.pause();

        let data = self.data_queue.drain();
        tracing::debug!("Flushed {} queue: {}", self.data_queue.name(), data);

        let triggered = self.trigger_queue.drain();
        tracing::debug!("Flushed {} queue: {}", self.trigger_queue.name(), triggered);

        self.processor.reset_state();
        tracing::debug!("Flushed persistence buffer");

        let processed = self.processor_queue.drain();
        tracing::debug!("Flushed {} queue: {}", self.processor_queue.name(), processed);

        self.flushes.fetch_add(1, Ordering::Relaxed);
        FlushReport {
            data,
            triggered,
            processed,
        }
    }

    /// Pause, apply `mutate`, flush.
    fn reconfigure(&self, mutate: impl FnOnce(&Self)) -> FlushReport {
        self.pause();
        mutate(self);
        self.flush()
    }

    // ── Configuration API ──

    /// Set the channel count on every stage.
    ///
    /// If the current trigger channel no longer exists it falls back to 1.
    pub fn set_channel_count(&self, channels: u8) -> Result<FlushReport> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(ScopeLinkError::InvalidSetting {
                name: "channel_count",
                value: channels as i64,
                reason: "must be between 1 and MAX_CHANNELS",
            });
        }

        Ok(self.reconfigure(|c| {
            c.trigger.update_settings(|s| {
                s.channel_count = channels;
                if s.trigger_channel > channels {
                    tracing::warn!(
                        "Trigger channel {} dropped with channel count {}, using 1",
                        s.trigger_channel,
                        channels
                    );
                    s.trigger_channel = 1;
                }
            });
            c.processor.update_settings(|s| s.channel_count = channels);
            c.post_processor.update_settings(|s| s.channel_count = channels);
            tracing::info!("New channel count: {}", channels);
        }))
    }

    /// Set the 1-based trigger channel.
    pub fn set_trigger_channel(&self, channel: u8) -> Result<FlushReport> {
        let channels = self.channel_count();
        if channel == 0 || channel > channels {
            return Err(ScopeLinkError::InvalidSetting {
                name: "trigger_channel",
                value: channel as i64,
                reason: "must be between 1 and the channel count",
            });
        }

        Ok(self.reconfigure(|c| {
            c.trigger.update_settings(|s| s.trigger_channel = channel);
            tracing::info!("New trigger channel: {}", channel);
        }))
    }

    pub fn set_trigger_level(&self, level: u8) -> FlushReport {
        self.reconfigure(|c| {
            c.trigger.update_settings(|s| s.level = level);
            tracing::info!("New trigger level: {}", c.trigger_level());
        })
    }

    pub fn set_trigger_edge_rising(&self) -> FlushReport {
        self.set_trigger_edge(TriggerEdge::Rising)
    }

    pub fn set_trigger_edge_falling(&self) -> FlushReport {
        self.set_trigger_edge(TriggerEdge::Falling)
    }

    fn set_trigger_edge(&self, edge: TriggerEdge) -> FlushReport {
        self.reconfigure(|c| {
            c.trigger.update_settings(|s| s.edge = edge);
            tracing::info!("New trigger edge: {}", edge);
        })
    }

    pub fn trigger_level(&self) -> u8 {
        self.trigger.settings().level
    }

    pub fn trigger_channel(&self) -> u8 {
        self.trigger.settings().trigger_channel
    }

    pub fn trigger_edge(&self) -> TriggerEdge {
        self.trigger.settings().edge
    }

    pub fn channel_count(&self) -> u8 {
        self.trigger.settings().channel_count
    }

    // ── Accessors ──

    /// Host-side handle onto the inbound/outbound queues.
    pub fn host_link(&self) -> HostLink {
        HostLink::new(Arc::clone(&self.inbound), Arc::clone(&self.outbound))
    }

    /// Queue the acquisition source pushes into.
    pub fn data_queue(&self) -> Arc<dyn HandoffQueue<Buffer>> {
        Arc::clone(&self.data_queue)
    }

    /// Lengths of the data, trigger and processor queues.
    pub fn queue_depths(&self) -> [usize; 3] {
        [
            self.data_queue.len(),
            self.trigger_queue.len(),
            self.processor_queue.len(),
        ]
    }

    /// Captures held in the processor's persistence buffer.
    pub fn persistence_len(&self) -> usize {
        self.processor.with_worker(|w| w.persistence_len())
    }

    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            commands_dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            responses_sent: self.counters.responses.load(Ordering::Relaxed),
            commands_rejected: self.counters.rejected.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            trigger: self.trigger.stats(),
            processor: self.processor.stats(),
            post_processor: self.post_processor.stats(),
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.set_state(ControllerState::Stopping);
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.dispatch_handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Dispatch thread panicked");
            }
        }

        // Stages stop pulling before anything else is released.
        self.trigger.shutdown();
        self.processor.shutdown();
        self.post_processor.shutdown();

        self.set_state(ControllerState::Stopped);
        tracing::debug!("Controller destroyed");
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("state", &self.state())
            .field("paused", &self.is_paused())
            .field("queue_depths", &self.queue_depths())
            .finish()
    }
}
