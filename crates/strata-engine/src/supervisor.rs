//! Supervisor: the state machine a view drives a simulation through.
//!
//! A view thread issues requests (start, pause/resume, abort, shutdown);
//! the engine's driver thread reports its progress through [`RunHooks`].
//! Both sides meet on one mutex-protected state and a condition variable.
//! Every state change is published on a bounded `crossbeam-channel` event
//! stream; when the view lags behind, the oldest events are dropped.
//!
//! ```text
//!   View thread                  Driver thread ("strata-driver")
//!       |                              |
//!       |--request_start()------------>| wakes on RunPlanned
//!       |                              | engine.run_new_simulation()
//!       |<--StateChanged(Initializing)-|   preparing()
//!       |<--StateChanged(Running)------|   started()
//!       |--request_pause()------------>|   tick_completed(): Paused, waits
//!       |--request_pause()------------>|   resumes
//!       |--request_abort()------------>|   abort flag seen between ticks
//!       |<--StateChanged(Aborting)-----|   aborted()
//!       |<--StateChanged(Idle)---------|   ended()
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use strata_core::TimeStamp;
use strata_model::SimulationModel;
use tracing::{debug, error, info};

use crate::config::{ConfigError, SupervisorConfig};
use crate::engine::{AbortHandle, Engine};
use crate::error::EngineError;
use crate::hooks::RunHooks;

// ── States and events ──────────────────────────────────────────────

/// Where a supervised simulation stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SupervisorState {
    /// No run in progress; a start request is accepted.
    Idle,
    /// A start was requested; the driver has not picked it up yet.
    RunPlanned,
    /// The engine is generating levels, environment and agents.
    Initializing,
    /// Ticks are being executed.
    Running,
    /// The driver is held between two ticks.
    Paused,
    /// An abort was requested; the engine stops at its next check.
    AbortRequested,
    /// The engine is stopping on the abort request.
    Aborting,
    /// Shutdown was requested; the driver exits once the run ends.
    ShutdownRequested,
    /// The driver exited, or the run failed. Terminal.
    Inactive,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::RunPlanned => "run planned",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::AbortRequested => "abort requested",
            Self::Aborting => "aborting",
            Self::ShutdownRequested => "shutdown requested",
            Self::Inactive => "inactive",
        };
        f.write_str(name)
    }
}

/// Published on [`Supervisor::events`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// The supervisor entered a new state.
    StateChanged(SupervisorState),
    /// The run failed; the view should shut down.
    ViewShutdownRequested,
}

// ── Supervisor ─────────────────────────────────────────────────────

/// Events kept for a view that does not drain the stream.
pub const EVENT_CAPACITY: usize = 256;

struct Inner {
    state: Mutex<SupervisorState>,
    signal: Condvar,
    pause_pending: AtomicBool,
    listening: AtomicBool,
    abort: AbortHandle,
    poll: Duration,
    events_tx: Sender<SupervisorEvent>,
    events_rx: Receiver<SupervisorEvent>,
    driver: Mutex<Option<JoinHandle<Engine>>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SupervisorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, SupervisorState>) -> MutexGuard<'a, SupervisorState> {
        self.signal.wait(guard).unwrap_or_else(|e| e.into_inner())
    }

    fn wait_polling<'a>(
        &self,
        guard: MutexGuard<'a, SupervisorState>,
    ) -> MutexGuard<'a, SupervisorState> {
        self.signal
            .wait_timeout(guard, self.poll)
            .unwrap_or_else(|e| e.into_inner())
            .0
    }

    /// Enter `next`, publishing the change. Caller holds the lock.
    fn enter(&self, state: &mut SupervisorState, next: SupervisorState) {
        if *state == next {
            return;
        }
        debug!(from = %*state, to = %next, "supervisor state change");
        *state = next;
        self.publish(SupervisorEvent::StateChanged(next));
        self.signal.notify_all();
    }

    /// Publish `event`, evicting the oldest one if the stream is full.
    fn publish(&self, mut event: SupervisorEvent) {
        loop {
            match self.events_tx.try_send(event) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    let _ = self.events_rx.try_recv();
                    event = back;
                }
                // The receiver lives in `self`.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Drives an [`Engine`] on a dedicated thread on behalf of a view.
///
/// Cheap to clone; clones share the same state machine. Requests return
/// whether they were accepted: a request arriving in a state that does not
/// permit it, or before the supervisor listens, is dropped.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    /// A supervisor controlling the engine behind `abort`. It starts
    /// [`Idle`](SupervisorState::Idle) and not listening.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPollInterval`] for an invalid config.
    pub fn new(config: SupervisorConfig, abort: AbortHandle) -> Result<Self, ConfigError> {
        config.validate()?;
        let (events_tx, events_rx) = crossbeam_channel::bounded(EVENT_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SupervisorState::Idle),
                signal: Condvar::new(),
                pause_pending: AtomicBool::new(false),
                listening: AtomicBool::new(false),
                abort,
                poll: config.pause_poll_interval,
                events_tx,
                events_rx,
                driver: Mutex::new(None),
            }),
        })
    }

    /// Move `engine` to a new `strata-driver` thread that runs `model`
    /// each time a start is requested, until shutdown.
    ///
    /// The returned supervisor is already listening.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `config` is invalid or the thread
    /// cannot be spawned.
    pub fn spawn(
        mut engine: Engine,
        model: Arc<dyn SimulationModel>,
        config: SupervisorConfig,
    ) -> Result<Self, ConfigError> {
        let supervisor = Self::new(config, engine.abort_handle())?;
        engine.set_run_hooks(Some(Arc::new(supervisor.clone())));

        let driver = supervisor.clone();
        let handle = thread::Builder::new()
            .name("strata-driver".into())
            .spawn(move || driver.drive(engine, model))
            .map_err(|e| ConfigError::ThreadSpawnFailed {
                reason: format!("driver thread: {e}"),
            })?;
        *supervisor
            .inner
            .driver
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(handle);

        supervisor.start_listening();
        Ok(supervisor)
    }

    fn drive(&self, mut engine: Engine, model: Arc<dyn SimulationModel>) -> Engine {
        info!("driver started");
        loop {
            let mut state = self.inner.lock();
            while !matches!(
                *state,
                SupervisorState::RunPlanned
                    | SupervisorState::ShutdownRequested
                    | SupervisorState::Inactive
            ) {
                state = self.inner.wait(state);
            }
            if *state != SupervisorState::RunPlanned {
                self.inner.enter(&mut state, SupervisorState::Inactive);
                break;
            }
            drop(state);

            match engine.run_new_simulation(Arc::clone(&model)) {
                Ok(()) => info!(time = %engine.current_time(), "run completed"),
                Err(e) if e.is_abort() => info!(time = %engine.current_time(), "run aborted"),
                Err(e) => error!(error = %e, "run failed"),
            }
        }
        engine.set_run_hooks(None);
        info!("driver stopped");
        engine
    }

    /// Accept requests from now on.
    pub fn start_listening(&self) {
        self.inner.listening.store(true, Ordering::Release);
    }

    /// Whether requests are accepted.
    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::Acquire)
    }

    /// The current state.
    pub fn state(&self) -> SupervisorState {
        *self.inner.lock()
    }

    /// The event stream. Every clone of the receiver competes for the same
    /// events. At most [`EVENT_CAPACITY`] undelivered events are kept; older
    /// ones are dropped.
    pub fn events(&self) -> Receiver<SupervisorEvent> {
        self.inner.events_rx.clone()
    }

    /// Wait for the driver thread to exit and take the engine back.
    ///
    /// Returns `None` if no driver was spawned, it was already joined, or
    /// it panicked.
    pub fn join(&self) -> Option<Engine> {
        let handle = self
            .inner
            .driver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        match handle.join() {
            Ok(engine) => Some(engine),
            Err(_) => {
                error!("driver thread panicked");
                None
            }
        }
    }

    // ── Requests ────────────────────────────────────────────────────

    fn request<F>(&self, request: &'static str, allowed: &[SupervisorState], apply: F) -> bool
    where
        F: FnOnce(&Inner, SupervisorState) -> SupervisorState,
    {
        if !self.is_listening() {
            info!(request, "supervisor not listening; request dropped");
            return false;
        }
        let mut state = self.inner.lock();
        if !allowed.contains(&*state) {
            info!(request, state = %*state, "request not allowed; dropped");
            return false;
        }
        let next = apply(&self.inner, *state);
        self.inner.enter(&mut state, next);
        self.inner.signal.notify_all();
        true
    }

    /// Plan a new run. Allowed when idle.
    pub fn request_start(&self) -> bool {
        self.request("start", &[SupervisorState::Idle], |_, _| {
            SupervisorState::RunPlanned
        })
    }

    /// Toggle pause. While running, the pause takes effect at the end of
    /// the current tick; while paused, the run resumes.
    pub fn request_pause(&self) -> bool {
        self.request(
            "pause",
            &[SupervisorState::Running, SupervisorState::Paused],
            |inner, state| {
                if state == SupervisorState::Paused {
                    SupervisorState::Running
                } else {
                    inner.pause_pending.fetch_xor(true, Ordering::AcqRel);
                    state
                }
            },
        )
    }

    /// Abort the current run. Allowed while initializing, running or
    /// paused.
    pub fn request_abort(&self) -> bool {
        self.request(
            "abort",
            &[
                SupervisorState::Running,
                SupervisorState::Paused,
                SupervisorState::Initializing,
            ],
            |inner, _| {
                inner.pause_pending.store(false, Ordering::Release);
                inner.abort.request_abort();
                SupervisorState::AbortRequested
            },
        )
    }

    /// Stop the driver, aborting the current run if any. Allowed when
    /// idle, running or paused.
    pub fn request_shutdown(&self) -> bool {
        self.request(
            "shutdown",
            &[
                SupervisorState::Idle,
                SupervisorState::Running,
                SupervisorState::Paused,
            ],
            |inner, state| {
                if state != SupervisorState::Idle {
                    inner.pause_pending.store(false, Ordering::Release);
                    inner.abort.request_abort();
                }
                SupervisorState::ShutdownRequested
            },
        )
    }
}

fn is_stopping(state: SupervisorState) -> bool {
    matches!(
        state,
        SupervisorState::AbortRequested | SupervisorState::ShutdownRequested
    )
}

impl RunHooks for Supervisor {
    fn preparing(&self) {
        let mut state = self.inner.lock();
        if !is_stopping(*state) {
            self.inner.enter(&mut state, SupervisorState::Initializing);
        }
    }

    fn started(&self, _time: TimeStamp) {
        let mut state = self.inner.lock();
        if !is_stopping(*state) {
            self.inner.enter(&mut state, SupervisorState::Running);
        }
    }

    fn tick_completed(&self, time: TimeStamp) {
        let mut state = self.inner.lock();
        if self.inner.pause_pending.swap(false, Ordering::AcqRel)
            && *state == SupervisorState::Running
        {
            info!(%time, "paused");
            self.inner.enter(&mut state, SupervisorState::Paused);
        }
        while *state == SupervisorState::Paused && !self.inner.abort.is_abort_requested() {
            state = self.inner.wait_polling(state);
        }
    }

    fn aborted(&self, _time: TimeStamp) {
        let mut state = self.inner.lock();
        if *state != SupervisorState::ShutdownRequested {
            self.inner.enter(&mut state, SupervisorState::Aborting);
        }
    }

    fn failed(&self, _error: &EngineError) {
        let mut state = self.inner.lock();
        self.inner.pause_pending.store(false, Ordering::Release);
        self.inner.enter(&mut state, SupervisorState::Inactive);
        self.inner.publish(SupervisorEvent::ViewShutdownRequested);
    }

    fn ended(&self) {
        let mut state = self.inner.lock();
        self.inner.pause_pending.store(false, Ordering::Release);
        let next = if *state == SupervisorState::ShutdownRequested {
            SupervisorState::Inactive
        } else {
            SupervisorState::Idle
        };
        self.inner.enter(&mut state, next);
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("state", &self.state())
            .field("listening", &self.is_listening())
            .field("poll", &self.inner.poll)
            .finish_non_exhaustive()
    }
}
