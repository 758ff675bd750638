//! # Timer registry: named interval callbacks on a dedicated thread.
//!
//! [`Timers`] is a cloneable handle over the shared timer table; register and
//! cancel work from any thread, before or during the loop's run. The event
//! loop starts one scan thread for its lifetime; each pass detects due
//! entries under the table lock, then fires their callbacks with the lock
//! released, then sleeps until the earliest next deadline (woken early by any
//! table change).
//!
//! ## Firing semantics
//! - An entry is due when `now - last_fire >= interval`, with `now` captured
//!   once per pass.
//! - A repeating entry's `last_fire` resets to that same `now`, so drift
//!   accumulates against the wall clock rather than the ideal schedule. This
//!   matches the long-standing behavior downstream nodes are tuned against;
//!   do not "fix" it to `last + interval`.
//! - A one-shot entry is removed at detection, before the next pass.
//! - Callbacks run **on the scan thread** with a queued-mode
//!   [`OutputSink`](crate::OutputSink); keep them cheap or hand heavy work to
//!   the pool yourself. Failures and panics are caught and logged here.
//!
//! Cancelling a timer before it is due guarantees it never fires. A cancel
//! racing the instant of detection may still see one final fire.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::error::{catch_callback, CallbackResult, TimerError};
use crate::output::{Outbox, OutputSink};

/// Shared callback signature for timer fires.
pub type TimerCallback = Arc<dyn Fn(&mut OutputSink<'_>) -> CallbackResult + Send + Sync>;

struct TimerEntry {
    interval: Duration,
    last_fire: Instant,
    repeat: bool,
    callback: TimerCallback,
}

struct TimerTable {
    entries: HashMap<String, TimerEntry>,
    running: bool,
}

struct TimerShared {
    table: Mutex<TimerTable>,
    changed: Condvar,
}

/// Registry of named interval callbacks.
///
/// Cheap to clone; all clones address the same table. The scan thread is
/// started and joined by the owning [`EventLoop`](crate::EventLoop).
#[derive(Clone)]
pub struct Timers {
    shared: Arc<TimerShared>,
}

impl Timers {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(TimerShared {
                table: Mutex::new(TimerTable {
                    entries: HashMap::new(),
                    running: false,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Registers (or replaces) the timer `id`.
    ///
    /// The first fire happens no earlier than `interval` from now. With
    /// `repeat` the timer keeps firing; otherwise it is removed after one
    /// fire. Registering an id that is already live replaces the old entry.
    pub fn register<F>(
        &self,
        id: impl Into<String>,
        interval: Duration,
        repeat: bool,
        callback: F,
    ) -> Result<(), TimerError>
    where
        F: Fn(&mut OutputSink<'_>) -> CallbackResult + Send + Sync + 'static,
    {
        let id = id.into();
        if interval.is_zero() {
            return Err(TimerError::ZeroInterval { id });
        }

        let entry = TimerEntry {
            interval,
            last_fire: Instant::now(),
            repeat,
            callback: Arc::new(callback),
        };
        let replaced = {
            let mut table = self.shared.table.lock();
            table.entries.insert(id.clone(), entry).is_some()
        };
        self.shared.changed.notify_all();
        if replaced {
            debug!(timer = %id, "replaced live timer registration");
        } else {
            trace!(timer = %id, ?interval, repeat, "registered timer");
        }
        Ok(())
    }

    /// Cancels the timer `id`. Returns `false` if no such live timer exists.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = {
            let mut table = self.shared.table.lock();
            table.entries.remove(id).is_some()
        };
        if removed {
            self.shared.changed.notify_all();
            trace!(timer = %id, "cancelled timer");
        }
        removed
    }

    /// `true` if a live timer with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.shared.table.lock().entries.contains_key(id)
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.shared.table.lock().entries.len()
    }

    /// `true` when no timers are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts the scan thread. Fires go out through `outbox`.
    pub(crate) fn start(&self, outbox: Outbox) -> std::io::Result<thread::JoinHandle<()>> {
        self.shared.table.lock().running = true;
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("timer-scan".to_string())
            .spawn(move || scan_loop(&shared, &outbox))
    }

    /// Asks the scan thread to exit; the caller joins its handle.
    pub(crate) fn stop(&self) {
        self.shared.table.lock().running = false;
        self.shared.changed.notify_all();
    }
}

fn scan_loop(shared: &TimerShared, outbox: &Outbox) {
    loop {
        // detection pass: decide the firing set and update the table under
        // the lock, O(live timers)
        let due = {
            let mut table = shared.table.lock();
            if !table.running {
                return;
            }
            let now = Instant::now();
            let mut due: Vec<(String, TimerCallback)> = Vec::new();
            let mut spent: Vec<String> = Vec::new();
            for (id, entry) in table.entries.iter_mut() {
                if now.duration_since(entry.last_fire) >= entry.interval {
                    due.push((id.clone(), Arc::clone(&entry.callback)));
                    if entry.repeat {
                        entry.last_fire = now;
                    } else {
                        spent.push(id.clone());
                    }
                }
            }
            for id in spent {
                table.entries.remove(&id);
            }
            due
        };

        // fire with the lock released; callbacks may register/cancel freely
        for (id, callback) in due {
            let mut sink = OutputSink::queued(outbox);
            if let Err(err) = catch_callback(|| callback(&mut sink)) {
                error!(timer = %id, error = %err, "timer callback failed");
            }
        }

        // sleep until the earliest deadline, recomputed against the current
        // table so registrations made while firing are not missed
        let mut table = shared.table.lock();
        if !table.running {
            return;
        }
        let next_deadline = table
            .entries
            .values()
            .map(|entry| entry.last_fire + entry.interval)
            .min();
        match next_deadline {
            Some(deadline) => {
                let _ = shared.changed.wait_until(&mut table, deadline);
            }
            None => shared.changed.wait(&mut table),
        }
    }
}
