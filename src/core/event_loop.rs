//! # EventLoop: the dispatch orchestrator.
//!
//! [`EventLoop`] sits between one [`HostNode`] — a single-threaded,
//! non-reentrant message channel — and the application's callbacks, which may
//! need to run concurrently. It owns the four built-in multicast events, the
//! per-id input handler map, the [`Timers`] registry, the [`Outbox`], and
//! (in pool mode) a [`WorkerPool`].
//!
//! ## High-level architecture
//! ```text
//! host channel ──next_event──► EventLoop ──┬─ per-id handler ──┐ inline (direct sink)
//!                                          └─ on_input event ──┤   or
//!                                                              └─► WorkerPool (queued sink)
//!                                                                      │
//! Timers thread ── fire ──► callback ── send ──► Outbox ◄──────────────┘
//!                                                  │
//! every iteration:  flush(Outbox ──► host) ── reap(TaskHandles) ── block on next_event
//! ```
//!
//! ## Threading
//! - The thread calling [`run`](EventLoop::run) owns the loop and is the only
//!   one that ever touches the host transmission primitive: inline handlers
//!   get a direct-mode [`OutputSink`]; everyone else enqueues on the outbox.
//! - One timer thread runs for the duration of `run` and is joined on drain.
//! - Pool workers execute input handlers when `Config::use_worker_pool` is
//!   set; their completions are reaped once per iteration and captured
//!   failures are logged, never re-raised.
//!
//! Registration is an owning-thread affair: register handlers before `run`
//! (or from inside a handler's own invocation, via the public multicast
//! fields — same thread). Timers and output are the thread-safe surfaces.
//!
//! ## Example
//! ```no_run
//! use nodeloop::{Config, EventLoop, HostEvent, HostNode};
//!
//! struct MyNode;
//! impl HostNode for MyNode {
//!     fn next_event(&mut self) -> Option<HostEvent> {
//!         Some(HostEvent::Stop)
//!     }
//!     fn send_output(&mut self, _id: &str, _payload: &[u8]) -> Result<(), String> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut node = EventLoop::new(Config::named("imu_bridge"));
//!     node.register_input_handler("imu", |sink, event| {
//!         sink.send("pose", &event.payload)?;
//!         Ok(())
//!     });
//!     node.register_timer("heartbeat", std::time::Duration::from_millis(500), true, |sink| {
//!         sink.send("alive", b"1")?;
//!         Ok(())
//!     })?;
//!     node.run_with(|| Ok(MyNode))?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::core::LoopState;
use crate::error::{catch_callback, CallbackResult, LoopError, TimerError};
use crate::events::{Handler, HandlerHandle, InputEvent, Multicast};
use crate::host::{HostEvent, HostNode};
use crate::output::{Outbox, OutputSink};
use crate::pool::{TaskHandle, WorkerPool};
use crate::timers::Timers;

/// Which built-in event a handle was registered on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// The generic input event (`on_input`).
    Input,
    /// The stop event (`on_stop`).
    Stop,
    /// The all-inputs-closed event (`on_all_inputs_closed`).
    AllInputsClosed,
    /// The unknown-event-type event (`on_unknown`).
    Unknown,
}

/// Handle to one registration made through the loop's `register_*` methods.
///
/// Pass it back to [`EventLoop::remove_handler`]; the kind routes the removal
/// to the right built-in event.
#[derive(Clone, Copy, Debug)]
pub struct EventHandle {
    kind: EventKind,
    handle: HandlerHandle,
}

impl EventHandle {
    /// The built-in event this handle belongs to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

struct PendingTask {
    label: String,
    handle: TaskHandle,
}

/// The event-dispatch runtime for one host node.
///
/// See the [module docs](self) for the architecture. The four built-in
/// multicast events are public fields so that applications can
/// enable/disable or clear them directly.
pub struct EventLoop<N: HostNode> {
    cfg: Config,
    node: Option<N>,
    state: LoopState,

    /// Generic input event, invoked for inputs without a dedicated handler.
    pub on_input: Multicast<InputEvent>,
    /// Invoked once when the host delivers a stop event.
    pub on_stop: Multicast<()>,
    /// Invoked once when every upstream input has closed.
    pub on_all_inputs_closed: Multicast<()>,
    /// Invoked once, with the raw type code, on an unrecognized event.
    pub on_unknown: Multicast<u32>,

    input_handlers: HashMap<String, Handler<InputEvent>>,
    timers: Timers,
    timer_thread: Option<thread::JoinHandle<()>>,
    outbox: Outbox,
    pool: Option<WorkerPool>,
    pending: Vec<PendingTask>,
}

impl<N: HostNode> EventLoop<N> {
    /// Creates an idle loop with default log handlers installed on all four
    /// built-in events.
    pub fn new(cfg: Config) -> Self {
        let mut this = Self {
            cfg,
            node: None,
            state: LoopState::Idle,
            on_input: Multicast::new(),
            on_stop: Multicast::new(),
            on_all_inputs_closed: Multicast::new(),
            on_unknown: Multicast::new(),
            input_handlers: HashMap::new(),
            timers: Timers::new(),
            timer_thread: None,
            outbox: Outbox::new(),
            pool: None,
            pending: Vec::new(),
        };
        this.install_default_handlers();
        this
    }

    /// Creates an idle loop with the host node already installed.
    pub fn with_node(cfg: Config, node: N) -> Self {
        let mut this = Self::new(cfg);
        this.node = Some(node);
        this
    }

    /// Installs (or replaces) the host node. Only meaningful before `run`.
    pub fn connect(&mut self, node: N) {
        self.node = Some(node);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// The loop's configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    fn install_default_handlers(&mut self) {
        let name = self.cfg.node_name.clone();
        self.on_input.register(move |_sink, event: &InputEvent| {
            trace!(node = %name, input = %event.id, bytes = event.payload.len(), "input without dedicated handler");
            Ok(())
        });
        let name = self.cfg.node_name.clone();
        self.on_stop.register(move |_sink, _arg: &()| {
            info!(node = %name, "stop event received");
            Ok(())
        });
        let name = self.cfg.node_name.clone();
        self.on_all_inputs_closed.register(move |_sink, _arg: &()| {
            info!(node = %name, "all inputs closed");
            Ok(())
        });
        let name = self.cfg.node_name.clone();
        self.on_unknown.register(move |_sink, code: &u32| {
            warn!(node = %name, code = *code, "unknown event type");
            Ok(())
        });
    }

    // ---- Registration surface -------------------------------------------

    /// Registers the handler for input id `id`, replacing any previous one.
    ///
    /// An input with a dedicated handler never reaches the generic
    /// [`on_input`](Self::on_input) event.
    pub fn register_input_handler<F>(&mut self, id: impl Into<String>, f: F)
    where
        F: Fn(&mut OutputSink<'_>, &InputEvent) -> CallbackResult + Send + Sync + 'static,
    {
        let id = id.into();
        if self
            .input_handlers
            .insert(id.clone(), Handler::new(f))
            .is_some()
        {
            debug!(node = %self.cfg.node_name, input = %id, "replaced input handler");
        }
    }

    /// Registers a handler on the generic input event.
    pub fn register_generic_input_handler<F>(&mut self, f: F) -> EventHandle
    where
        F: Fn(&mut OutputSink<'_>, &InputEvent) -> CallbackResult + Send + Sync + 'static,
    {
        EventHandle {
            kind: EventKind::Input,
            handle: self.on_input.register(f),
        }
    }

    /// Registers a handler on the stop event.
    pub fn register_stop_handler<F>(&mut self, f: F) -> EventHandle
    where
        F: Fn(&mut OutputSink<'_>) -> CallbackResult + Send + Sync + 'static,
    {
        EventHandle {
            kind: EventKind::Stop,
            handle: self.on_stop.register(move |sink, _arg: &()| f(sink)),
        }
    }

    /// Registers a handler on the all-inputs-closed event.
    pub fn register_all_closed_handler<F>(&mut self, f: F) -> EventHandle
    where
        F: Fn(&mut OutputSink<'_>) -> CallbackResult + Send + Sync + 'static,
    {
        EventHandle {
            kind: EventKind::AllInputsClosed,
            handle: self
                .on_all_inputs_closed
                .register(move |sink, _arg: &()| f(sink)),
        }
    }

    /// Registers a handler on the unknown-event event.
    pub fn register_unknown_handler<F>(&mut self, f: F) -> EventHandle
    where
        F: Fn(&mut OutputSink<'_>, u32) -> CallbackResult + Send + Sync + 'static,
    {
        EventHandle {
            kind: EventKind::Unknown,
            handle: self.on_unknown.register(move |sink, code: &u32| f(sink, *code)),
        }
    }

    /// Removes a handler registered through one of the `register_*` methods.
    ///
    /// Returns `false` for a stale handle.
    pub fn remove_handler(&mut self, handle: EventHandle) -> bool {
        match handle.kind {
            EventKind::Input => self.on_input.remove(handle.handle),
            EventKind::Stop => self.on_stop.remove(handle.handle),
            EventKind::AllInputsClosed => self.on_all_inputs_closed.remove(handle.handle),
            EventKind::Unknown => self.on_unknown.remove(handle.handle),
        }
    }

    /// Registers (or replaces) a timer; see [`Timers::register`].
    pub fn register_timer<F>(
        &self,
        id: impl Into<String>,
        interval: std::time::Duration,
        repeat: bool,
        callback: F,
    ) -> Result<(), TimerError>
    where
        F: Fn(&mut OutputSink<'_>) -> CallbackResult + Send + Sync + 'static,
    {
        self.timers.register(id, interval, repeat, callback)
    }

    /// Cancels a timer; see [`Timers::cancel`].
    pub fn cancel_timer(&self, id: &str) -> bool {
        self.timers.cancel(id)
    }

    /// A cloneable handle to the timer registry, usable from any thread.
    pub fn timers(&self) -> Timers {
        self.timers.clone()
    }

    /// A cloneable handle to the output queue, usable from any thread.
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Enqueues one output message for the next flush.
    ///
    /// This is always the queued path; the direct-send fast path exists only
    /// through the [`OutputSink`] handed to handlers the loop invokes inline.
    pub fn send_output(&self, id: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.outbox.send(id, payload);
    }

    // ---- Lifecycle -------------------------------------------------------

    /// Lazily initializes the host node, then runs.
    ///
    /// `connect` is only called when no node is installed yet.
    pub fn run_with<F>(&mut self, connect: F) -> Result<(), LoopError>
    where
        F: FnOnce() -> Result<N, LoopError>,
    {
        if self.node.is_none() {
            self.node = Some(connect()?);
            info!(node = %self.cfg.node_name, "host node initialized");
        }
        self.run()
    }

    /// Runs the loop until a terminal event, blocking the calling thread.
    ///
    /// Returns `Ok(())` after a classified terminal event (`Stop`,
    /// `AllInputsClosed`, or `Unknown` — the loop terminates on unknown event
    /// types by design), or `Err(LoopError::ChannelBroken)` when the host
    /// channel dies without one. Either way the loop drains fully first:
    /// timer thread joined, pool drained, pending handles reaped, outbox
    /// flushed, host node released.
    pub fn run(&mut self) -> Result<(), LoopError> {
        match self.state {
            LoopState::Idle => {}
            state => return Err(LoopError::InvalidState { state }),
        }
        let Some(mut node) = self.node.take() else {
            return Err(LoopError::NotConnected);
        };

        self.state = LoopState::Running;
        info!(node = %self.cfg.node_name, "event loop running");

        if self.cfg.use_worker_pool && self.pool.is_none() {
            self.pool = Some(WorkerPool::new(self.cfg.workers_clamped()));
            info!(node = %self.cfg.node_name, workers = self.cfg.workers_clamped(), "handler pool enabled");
        }
        match self.timers.start(self.outbox.clone()) {
            Ok(handle) => self.timer_thread = Some(handle),
            Err(err) => {
                error!(node = %self.cfg.node_name, error = %err, "failed to start timer thread; timers will not fire");
            }
        }

        let outcome = self.run_inner(&mut node);

        self.state = LoopState::Draining;
        debug!(node = %self.cfg.node_name, "event loop draining");

        self.timers.stop();
        if let Some(timer_thread) = self.timer_thread.take() {
            if timer_thread.join().is_err() {
                error!(node = %self.cfg.node_name, "timer thread panicked");
            }
        }
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
        self.reap_finished();
        // workers and timers may have produced output while draining
        self.outbox.flush_into(&mut node);
        drop(node);

        self.state = LoopState::Stopped;
        info!(node = %self.cfg.node_name, "event loop stopped");
        outcome
    }

    fn run_inner(&mut self, node: &mut N) -> Result<(), LoopError> {
        loop {
            self.outbox.flush_into(node);
            self.reap_finished();

            let Some(event) = node.next_event() else {
                error!(node = %self.cfg.node_name, "host channel yielded no event");
                return Err(LoopError::ChannelBroken);
            };

            match event {
                HostEvent::Input(input) => self.dispatch_input(node, input),
                HostEvent::Stop => {
                    let mut sink = OutputSink::direct(node);
                    self.on_stop.invoke(&mut sink, &());
                    return Ok(());
                }
                HostEvent::AllInputsClosed => {
                    let mut sink = OutputSink::direct(node);
                    self.on_all_inputs_closed.invoke(&mut sink, &());
                    return Ok(());
                }
                HostEvent::Unknown(code) => {
                    let mut sink = OutputSink::direct(node);
                    self.on_unknown.invoke(&mut sink, &code);
                    return Ok(());
                }
            }
        }
    }

    fn dispatch_input(&mut self, node: &mut N, input: InputEvent) {
        let specific = self
            .input_handlers
            .get(&input.id)
            .map(|handler| Arc::clone(handler.callback()));

        if let Some(callback) = specific {
            if let Some(pool) = &self.pool {
                let outbox = self.outbox.clone();
                let label = format!("input:{}", input.id);
                match pool.submit(move || {
                    let mut sink = OutputSink::queued(&outbox);
                    callback(&mut sink, &input)
                }) {
                    Ok(handle) => self.pending.push(PendingTask { label, handle }),
                    Err(err) => {
                        error!(node = %self.cfg.node_name, task = %label, error = %err, "input handler submission rejected");
                    }
                }
            } else {
                let mut sink = OutputSink::direct(node);
                if let Err(err) = catch_callback(|| callback(&mut sink, &input)) {
                    error!(node = %self.cfg.node_name, input = %input.id, error = %err, "input handler failed");
                }
            }
            return;
        }

        if let Some(pool) = &self.pool {
            // one pool task per registered handler, each isolated
            for (handler_id, callback) in self.on_input.snapshot() {
                let outbox = self.outbox.clone();
                let event = input.clone();
                let label = format!("input:{}", input.id);
                match pool.submit(move || {
                    let mut sink = OutputSink::queued(&outbox);
                    callback(&mut sink, &event)
                }) {
                    Ok(handle) => self.pending.push(PendingTask { label, handle }),
                    Err(err) => {
                        error!(node = %self.cfg.node_name, handler = %handler_id, error = %err, "generic input handler submission rejected");
                    }
                }
            }
        } else {
            let mut sink = OutputSink::direct(node);
            self.on_input.invoke(&mut sink, &input);
        }
    }

    /// Takes the result of every finished pool task; captured failures are
    /// logged, not re-raised.
    fn reap_finished(&mut self) {
        let node_name = &self.cfg.node_name;
        self.pending.retain(|task| match task.handle.try_result() {
            None => true,
            Some(Ok(())) => false,
            Some(Err(err)) => {
                error!(node = %node_name, task = %task.label, error = %err, "pooled handler failed");
                false
            }
        });
    }
}
