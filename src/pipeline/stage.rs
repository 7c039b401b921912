//! Stage runner: one worker thread per pipeline stage.
//!
//! A [`Stage`] pulls from an input queue, hands each item to its
//! [`StageWorker`], and pushes whatever the worker emits to the output queue.
//! The runner owns the lifecycle; the worker only owns the transformation.
//!
//! # Pause barrier
//!
//! `pause()` is a rendezvous, not a flag. It raises `pause_requested` and then
//! waits on the stage condvar until the worker reports `parked`. The worker
//! only parks between items, so once `pause()` returns the stage holds no item
//! and will not push again until `unpause()`.
//!
//! ```text
//!  caller                         worker
//!  ──────                         ──────
//!  pause_requested = true ──►     finishes in-flight item
//!  wait(parked)                   parked = true, notify
//!  ◄── returns                    wait(!pause_requested)
//!  configure / flush
//!  pause_requested = false ──►    parked = false, resume popping
//! ```

use crate::error::{Result, ScopeLinkError};
use crate::pipeline::error::StageResult;
use crate::pipeline::queue::HandoffQueue;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Per-item transformation plugged into a [`Stage`].
pub trait StageWorker: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;
    type Settings: Clone + Send + 'static;

    /// Human-readable name of this stage.
    fn name(&self) -> &'static str;

    /// Consume one item, emitting zero or more results downstream.
    ///
    /// An `Err` drops the item; the runner logs it and keeps going.
    fn process(
        &mut self,
        item: Self::Input,
        settings: &Self::Settings,
        emit: &mut dyn FnMut(Self::Output),
    ) -> StageResult<()>;

    /// Clear cross-item state. Only called while the stage is paused.
    fn reset(&mut self) {}
}

#[derive(Debug, Default)]
struct ControlState {
    pause_requested: bool,
    parked: bool,
    stop: bool,
    exited: bool,
}

#[derive(Debug, Default)]
struct StageControl {
    state: Mutex<ControlState>,
    cv: Condvar,
}

/// Marks the worker as exited even if it unwinds, so `pause()` never waits
/// on a dead thread.
struct ExitGuard(Arc<StageControl>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.exited = true;
        state.parked = false;
        self.0.cv.notify_all();
    }
}

/// Running counters for one stage.
#[derive(Debug, Default)]
pub struct StageStats {
    processed: AtomicU64,
    emitted: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of [`StageStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStatsSnapshot {
    /// Items the worker accepted.
    pub processed: u64,
    /// Results pushed downstream.
    pub emitted: u64,
    /// Items dropped because the worker returned an error.
    pub rejected: u64,
}

impl StageStats {
    pub fn snapshot(&self) -> StageStatsSnapshot {
        StageStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// A pipeline stage and the thread running it.
pub struct Stage<W: StageWorker> {
    name: &'static str,
    control: Arc<StageControl>,
    settings: Arc<Mutex<W::Settings>>,
    worker: Arc<Mutex<W>>,
    stats: Arc<StageStats>,
    handle: Option<JoinHandle<()>>,
}

impl<W: StageWorker> Stage<W> {
    /// Spawn the worker thread. The stage starts unpaused.
    pub fn spawn(
        worker: W,
        settings: W::Settings,
        input: Arc<dyn HandoffQueue<W::Input>>,
        output: Arc<dyn HandoffQueue<W::Output>>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let name = worker.name();
        let control = Arc::new(StageControl::default());
        let settings = Arc::new(Mutex::new(settings));
        let worker = Arc::new(Mutex::new(worker));
        let stats = Arc::new(StageStats::default());

        let ctx = WorkerContext {
            name,
            control: Arc::clone(&control),
            settings: Arc::clone(&settings),
            worker: Arc::clone(&worker),
            stats: Arc::clone(&stats),
            input,
            output,
            poll_interval,
        };

        let handle = std::thread::Builder::new()
            .name(format!("stage-{}", name.to_lowercase()))
            .spawn(move || ctx.run())
            .map_err(|source| ScopeLinkError::Spawn {
                thread: name.to_string(),
                source,
            })?;

        tracing::debug!("Stage '{}' started", name);

        Ok(Self {
            name,
            control,
            settings,
            worker,
            stats,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop taking input and block until the worker is quiescent.
    ///
    /// Idempotent. Returns at once if the worker has already exited.
    pub fn pause(&self) {
        let mut state = self.control.state.lock();
        state.pause_requested = true;
        self.control.cv.notify_all();
        while !state.parked && !state.exited {
            self.control.cv.wait(&mut state);
        }
    }

    /// Resume taking input. Idempotent.
    pub fn unpause(&self) {
        let mut state = self.control.state.lock();
        state.pause_requested = false;
        self.control.cv.notify_all();
    }

    /// Whether a pause is in effect (requested and not yet lifted).
    pub fn is_paused(&self) -> bool {
        self.control.state.lock().pause_requested
    }

    /// Whether the worker is currently parked at the barrier.
    pub fn is_quiescent(&self) -> bool {
        self.control.state.lock().parked
    }

    /// Replace the stage settings.
    ///
    /// Callers must pause first. Items snapshot the settings when they are
    /// taken, so the next item after `unpause()` sees all of `settings`.
    pub fn configure(&self, settings: W::Settings) {
        *self.settings.lock() = settings;
    }

    /// Apply an in-place edit to the settings. Same contract as [`configure`](Self::configure).
    pub fn update_settings(&self, f: impl FnOnce(&mut W::Settings)) {
        f(&mut *self.settings.lock());
    }

    pub fn settings(&self) -> W::Settings {
        self.settings.lock().clone()
    }

    /// Clear worker cross-item state. Callers must pause first.
    pub fn reset_state(&self) {
        self.worker.lock().reset();
    }

    /// Run `f` against the worker, e.g. to inspect internal state in tests.
    pub fn with_worker<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        f(&*self.worker.lock())
    }

    pub fn stats(&self) -> StageStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the worker and join it. Any in-flight item completes first.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.control.state.lock();
            state.stop = true;
            self.control.cv.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Stage '{}' worker panicked", self.name);
            }
            tracing::debug!("Stage '{}' stopped", self.name);
        }
    }

    /// Whether the worker thread has exited.
    pub fn is_stopped(&self) -> bool {
        self.control.state.lock().exited
    }
}

impl<W: StageWorker> Drop for Stage<W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<W: StageWorker> std::fmt::Debug for Stage<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("paused", &self.is_paused())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Everything the worker thread needs, moved into it at spawn.
struct WorkerContext<W: StageWorker> {
    name: &'static str,
    control: Arc<StageControl>,
    settings: Arc<Mutex<W::Settings>>,
    worker: Arc<Mutex<W>>,
    stats: Arc<StageStats>,
    input: Arc<dyn HandoffQueue<W::Input>>,
    output: Arc<dyn HandoffQueue<W::Output>>,
    poll_interval: Duration,
}

impl<W: StageWorker> WorkerContext<W> {
    fn run(self) {
        let _guard = ExitGuard(Arc::clone(&self.control));

        while self.wait_until_runnable() {
            match self.input.pop() {
                Some(item) => self.process_one(item),
                None => self.idle(),
            }
        }
    }

    /// Park while a pause is requested. Returns `false` once stop is set.
    fn wait_until_runnable(&self) -> bool {
        let mut state = self.control.state.lock();
        if state.pause_requested && !state.stop {
            state.parked = true;
            self.control.cv.notify_all();
            while state.pause_requested && !state.stop {
                self.control.cv.wait(&mut state);
            }
            state.parked = false;
        }
        !state.stop
    }

    /// Wait for more input, waking early on pause or stop.
    fn idle(&self) {
        let mut state = self.control.state.lock();
        if !state.stop && !state.pause_requested {
            self.control.cv.wait_for(&mut state, self.poll_interval);
        }
    }

    fn process_one(&self, item: W::Input) {
        let settings = self.settings.lock().clone();
        let output = &self.output;
        let mut emitted = 0u64;

        let result = self
            .worker
            .lock()
            .process(item, &settings, &mut |out| {
                output.push(out);
                emitted += 1;
            });

        self.stats.emitted.fetch_add(emitted, Ordering::Relaxed);
        match result {
            Ok(()) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Stage '{}' dropped item: {}", self.name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::error::StageError;
    use crate::pipeline::queue::ChannelQueue;
    use std::time::Instant;

    /// Doubles each value; rejects zero; `reset` clears the running sum.
    struct Doubler {
        sum: u64,
    }

    impl StageWorker for Doubler {
        type Input = u32;
        type Output = u32;
        type Settings = u32;

        fn name(&self) -> &'static str {
            "Doubler"
        }

        fn process(
            &mut self,
            item: u32,
            offset: &u32,
            emit: &mut dyn FnMut(u32),
        ) -> StageResult<()> {
            if item == 0 {
                return Err(StageError::Empty);
            }
            self.sum += item as u64;
            emit(item * 2 + offset);
            Ok(())
        }

        fn reset(&mut self) {
            self.sum = 0;
        }
    }

    fn setup() -> (
        Stage<Doubler>,
        Arc<ChannelQueue<u32>>,
        Arc<ChannelQueue<u32>>,
    ) {
        let input = Arc::new(ChannelQueue::unbounded("in"));
        let output = Arc::new(ChannelQueue::unbounded("out"));
        let stage = Stage::spawn(
            Doubler { sum: 0 },
            0,
            input.clone(),
            output.clone(),
            Duration::from_millis(1),
        )
        .unwrap();
        (stage, input, output)
    }

    fn wait_for_len(q: &ChannelQueue<u32>, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while q.len() < n && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_stage_transforms_in_order() {
        let (_stage, input, output) = setup();
        for i in 1..=5 {
            input.push(i);
        }
        wait_for_len(&output, 5);
        let out: Vec<_> = std::iter::from_fn(|| output.pop()).collect();
        assert_eq!(out, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn test_pause_is_quiescent() {
        let (stage, input, output) = setup();
        stage.pause();
        assert!(stage.is_paused());
        assert!(stage.is_quiescent());

        for i in 1..=10 {
            input.push(i);
        }
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(output.len(), 0);
        assert_eq!(input.len(), 10);

        stage.unpause();
        wait_for_len(&output, 10);
        assert_eq!(output.len(), 10);
    }

    #[test]
    fn test_pause_and_unpause_are_idempotent() {
        let (stage, input, output) = setup();
        stage.pause();
        stage.pause();
        stage.unpause();
        stage.unpause();
        assert!(!stage.is_paused());
        input.push(3);
        wait_for_len(&output, 1);
        assert_eq!(output.pop(), Some(6));
    }

    #[test]
    fn test_configure_applies_after_unpause() {
        let (stage, input, output) = setup();
        stage.pause();
        stage.configure(100);
        input.push(1);
        stage.unpause();
        wait_for_len(&output, 1);
        assert_eq!(output.pop(), Some(102));
        assert_eq!(stage.settings(), 100);
    }

    #[test]
    fn test_errors_drop_item_and_keep_running() {
        let (stage, input, output) = setup();
        input.push(0);
        input.push(4);
        wait_for_len(&output, 1);
        assert_eq!(output.pop(), Some(8));
        stage.pause();
        let stats = stage.stats();
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.emitted, 1);
    }

    #[test]
    fn test_reset_clears_worker_state() {
        let (stage, input, output) = setup();
        input.push(7);
        wait_for_len(&output, 1);
        stage.pause();
        assert_eq!(stage.with_worker(|w| w.sum), 7);
        stage.reset_state();
        assert_eq!(stage.with_worker(|w| w.sum), 0);
    }

    #[test]
    fn test_shutdown_while_paused_joins() {
        let (mut stage, _input, _output) = setup();
        stage.pause();
        stage.shutdown();
        assert!(stage.is_stopped());
        // Pausing a stopped stage must not block.
        stage.pause();
        stage.shutdown();
    }
}
