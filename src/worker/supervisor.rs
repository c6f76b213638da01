//! Worker supervisor
//!
//! A [`Supervisor`] owns one [`SessionBackend`] and runs its control loop
//! on a dedicated task. The session is opened when the first consumer
//! attaches and released when the last one leaves; in between every polled
//! item is fanned out to all attached consumers.
//!
//! # State machine
//!
//! ```text
//!              wanted                 now >= holdoff, start() ok
//!   Stopped ──────────► Starting ─────────────────────────────► Running
//!      ▲                  │  start() err: holdoff = now + 1s       │
//!      │                  └──────────────┘                         │ !wanted
//!      │        now >= holdoff, stop() ok                          │ (or poll err)
//!      └───────────────────────────────── Stopping ◄───────────────┘
//!                                           │  stop() err: holdoff = now + 1s
//!                                           └──────────────┘
//! ```
//!
//! While a holdoff is pending the loop waits in slices of at most
//! [`WorkerConfig::wait_tick`], so shutdown is noticed promptly. Only the
//! control loop touches the backend; callers reach it through the target
//! registry (demand) and the command queue (side commands).

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::backend::SessionBackend;
use super::channel::{Target, TargetId};
use super::config::{WorkerConfig, MIN_HOLDOFF};
use super::state::RunState;
use super::tap::Tap;
use super::targets::TargetRegistry;
use crate::error::{Error, Result};
use crate::stats::{WorkerCounters, WorkerStats};

/// Handle to a supervised session worker
///
/// Dropping the handle requests shutdown of the control loop; call
/// [`shutdown`](Self::shutdown) to also wait for the final backend stop.
pub struct Supervisor<B: SessionBackend> {
    name: Arc<str>,
    targets: Arc<TargetRegistry<B::Item>>,
    state: watch::Receiver<RunState>,
    commands: mpsc::UnboundedSender<B::Command>,
    counters: Arc<WorkerCounters>,
    cancel: CancellationToken,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl<B: SessionBackend> Supervisor<B> {
    /// Spawn the control loop for `backend` on the current tokio runtime
    ///
    /// The worker starts in [`RunState::Stopped`] and does not touch the
    /// backend until a consumer attaches.
    pub fn spawn(name: impl Into<String>, backend: B, config: WorkerConfig) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let targets = Arc::new(TargetRegistry::new(name.to_string()));
        let (state_tx, state_rx) = watch::channel(RunState::Stopped);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(WorkerCounters::new());
        let cancel = CancellationToken::new();

        let worker = Worker {
            name: Arc::clone(&name),
            backend,
            config,
            targets: Arc::clone(&targets),
            state_tx,
            commands: command_rx,
            counters: Arc::clone(&counters),
            cancel: cancel.clone(),
            state: RunState::Stopped,
            holdoff: Instant::now(),
            idle_since: None,
        };
        let join = tokio::spawn(worker.run());

        Self {
            name,
            targets,
            state: state_rx,
            commands: command_tx,
            counters,
            cancel,
            join: Mutex::new(Some(join)),
        }
    }

    /// Worker name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Watch run state changes
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    /// Get a reference to the target registry
    pub fn registry(&self) -> &Arc<TargetRegistry<B::Item>> {
        &self.targets
    }

    /// Check whether any consumer currently wants the session
    pub fn is_wanted(&self) -> bool {
        self.targets.is_wanted()
    }

    /// Number of attached consumers
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Attach a scoped consumer
    ///
    /// The returned [`Tap`] deregisters itself when dropped.
    pub fn tap(&self) -> Result<Tap<B::Item>> {
        Tap::open(Arc::clone(&self.targets))
    }

    /// Attach a consumer channel created with
    /// [`consumer_channel`](super::channel::consumer_channel)
    ///
    /// The caller is responsible for calling
    /// [`remove_target`](Self::remove_target); a target whose reader is
    /// dropped is also pruned on the next fan-out.
    pub fn add_target(&self, target: Target<B::Item>) -> Result<()> {
        self.targets.add(target)
    }

    /// Detach a consumer channel; returns whether it was attached
    pub fn remove_target(&self, id: TargetId) -> bool {
        self.targets.remove(id)
    }

    /// Queue a side command for the live session
    ///
    /// Returns `false` and drops the command when no session is running.
    /// `true` only means the command was accepted for delivery: if the
    /// session starts stopping before the control loop picks it up, it is
    /// discarded and counted in `commands_dropped`.
    pub fn send_command(&self, command: B::Command) -> bool {
        if !self.state().is_running() {
            WorkerCounters::incr(&self.counters.commands_dropped);
            tracing::debug!(worker = %self.name, "Dropping command, session not running");
            return false;
        }
        self.commands.send(command).is_ok()
    }

    /// Snapshot of the worker's counters
    pub fn stats(&self) -> WorkerStats {
        self.counters.snapshot(self.targets.len())
    }

    /// Stop the control loop and wait for it to exit
    ///
    /// A running session gets one best-effort `stop` call. Afterwards all
    /// consumers see end-of-stream and new registrations fail with
    /// [`Error::Closed`]. Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!(worker = %self.name, "Requesting worker exit");
        self.cancel.cancel();

        let join = self.join.lock().take();
        let result = match join {
            Some(handle) => match handle.await {
                Ok(()) => Ok(()),
                Err(e) if e.is_panic() => {
                    tracing::error!(worker = %self.name, "Worker loop panicked");
                    Err(Error::WorkerPanicked(self.name.to_string()))
                }
                Err(_) => Ok(()),
            },
            None => Ok(()),
        };

        self.targets.close();
        tracing::info!(worker = %self.name, "Worker cleanup done");
        result
    }
}

impl<B: SessionBackend> Drop for Supervisor<B> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Control loop state, owned by the spawned task
struct Worker<B: SessionBackend> {
    name: Arc<str>,
    backend: B,
    config: WorkerConfig,
    targets: Arc<TargetRegistry<B::Item>>,
    state_tx: watch::Sender<RunState>,
    commands: mpsc::UnboundedReceiver<B::Command>,
    counters: Arc<WorkerCounters>,
    cancel: CancellationToken,
    state: RunState,
    holdoff: Instant,
    idle_since: Option<Instant>,
}

impl<B: SessionBackend> Worker<B> {
    async fn run(mut self) {
        tracing::debug!(worker = %self.name, "Worker loop started");

        while !self.cancel.is_cancelled() {
            match self.state {
                RunState::Stopped => self.on_stopped().await,
                RunState::Starting => self.on_starting().await,
                RunState::Running => self.on_running().await,
                RunState::Stopping => self.on_stopping().await,
            }
        }

        tracing::info!(worker = %self.name, state = %self.state, "Shutting down worker");
        if matches!(self.state, RunState::Running | RunState::Stopping) {
            self.final_stop().await;
        }
        self.discard_commands();

        let closed = self.targets.close();
        tracing::info!(worker = %self.name, closed_targets = closed, "Worker exit");
    }

    async fn on_stopped(&mut self) {
        self.discard_commands();

        if self.targets.is_wanted() {
            tracing::info!(worker = %self.name, "Starting worker");
            self.holdoff = Instant::now();
            self.set_state(RunState::Starting);
            return;
        }

        tokio::select! {
            _ = self.targets.changed() => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    async fn on_starting(&mut self) {
        self.discard_commands();

        if Instant::now() < self.holdoff {
            self.wait_holdoff().await;
            return;
        }

        WorkerCounters::incr(&self.counters.start_attempts);
        match self.backend.start().await {
            Ok(()) => {
                tracing::info!(worker = %self.name, "Worker started");
                self.idle_since = None;
                self.set_state(RunState::Running);
            }
            Err(e) => {
                WorkerCounters::incr(&self.counters.start_failures);
                tracing::error!(
                    worker = %self.name,
                    error = %e,
                    retry_in = ?self.config.holdoff,
                    "Failed to start worker"
                );
                self.holdoff = Instant::now() + self.config.holdoff.max(MIN_HOLDOFF);
            }
        }
    }

    async fn on_running(&mut self) {
        if !self.keep_running() {
            tracing::info!(worker = %self.name, "Stopping worker");
            self.holdoff = Instant::now();
            self.set_state(RunState::Stopping);
            return;
        }

        self.forward_commands().await;

        let timeout = self.config.poll_timeout;
        let polled = tokio::select! {
            res = self.backend.poll(timeout) => res,
            _ = self.cancel.cancelled() => return,
        };

        match polled {
            Ok(Some(item)) => {
                WorkerCounters::incr(&self.counters.items_fanned_out);
                let delivered = self.targets.put(item);
                tracing::trace!(worker = %self.name, targets = delivered, "Item fanned out");
            }
            Ok(None) => {}
            Err(e) => {
                WorkerCounters::incr(&self.counters.poll_failures);
                tracing::error!(
                    worker = %self.name,
                    error = %e,
                    "Poll failed, restarting session"
                );
                self.holdoff = Instant::now();
                self.set_state(RunState::Stopping);
            }
        }
    }

    async fn on_stopping(&mut self) {
        self.discard_commands();

        if Instant::now() < self.holdoff {
            self.wait_holdoff().await;
            return;
        }

        WorkerCounters::incr(&self.counters.stop_attempts);
        match self.backend.stop().await {
            Ok(()) => {
                tracing::info!(worker = %self.name, "Worker stopped");
                self.set_state(RunState::Stopped);
            }
            Err(e) => {
                WorkerCounters::incr(&self.counters.stop_failures);
                tracing::error!(
                    worker = %self.name,
                    error = %e,
                    retry_in = ?self.config.holdoff,
                    "Failed to stop worker"
                );
                self.holdoff = Instant::now() + self.config.holdoff.max(MIN_HOLDOFF);
            }
        }
    }

    /// Single stop attempt on the way out, holdoff ignored
    async fn final_stop(&mut self) {
        WorkerCounters::incr(&self.counters.stop_attempts);
        match self.backend.stop().await {
            Ok(()) => self.set_state(RunState::Stopped),
            Err(e) => {
                WorkerCounters::incr(&self.counters.stop_failures);
                tracing::error!(worker = %self.name, error = %e, "Final stop failed");
            }
        }
    }

    async fn wait_holdoff(&mut self) {
        let deadline = self.holdoff.min(Instant::now() + self.config.wait_tick);
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = self.targets.changed() => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    fn keep_running(&mut self) -> bool {
        if self.targets.is_wanted() {
            self.idle_since = None;
            return true;
        }
        if self.config.idle_timeout.is_zero() {
            return false;
        }

        let since = *self.idle_since.get_or_insert_with(Instant::now);
        since.elapsed() < self.config.idle_timeout
    }

    async fn forward_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match self.backend.control(command).await {
                Ok(()) => WorkerCounters::incr(&self.counters.commands_sent),
                Err(e) => {
                    WorkerCounters::incr(&self.counters.commands_failed);
                    tracing::warn!(worker = %self.name, error = %e, "Control command failed");
                }
            }
        }
    }

    fn discard_commands(&mut self) {
        while self.commands.try_recv().is_ok() {
            WorkerCounters::incr(&self.counters.commands_dropped);
            tracing::debug!(worker = %self.name, "Discarded command, session not running");
        }
    }

    fn set_state(&mut self, state: RunState) {
        tracing::debug!(worker = %self.name, from = %self.state, to = %state, "State change");
        self.state = state;
        self.state_tx.send_replace(state);
    }
}
