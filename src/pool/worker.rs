//! # Worker pool: fixed background threads over one shared FIFO.
//!
//! [`WorkerPool`] spawns a fixed set of worker threads that pull tasks from a
//! single mutex-guarded queue. Submission wakes exactly one idle worker; a
//! worker holds the lock only to pop, and executes with the lock released.
//!
//! ## Rules
//! - [`submit`](WorkerPool::submit) after [`shutdown`](WorkerPool::shutdown)
//!   fails with [`PoolError::ShutDown`] and enqueues nothing.
//! - Shutdown is a graceful drain: workers woken with the stop flag set keep
//!   pulling until the queue is empty, then exit; `shutdown` joins them all
//!   before returning. No queued task is abandoned.
//! - A task that returns `Err` or panics resolves its [`TaskHandle`] to that
//!   failure; it never unwinds into the worker.
//! - [`wait_idle`](WorkerPool::wait_idle) blocks on a completion signal until
//!   the queue is empty and no task is running.
//!
//! ```text
//! submit(work) ──► [ FIFO queue | one lock ] ──► worker-0 ─┐
//!        │                                      worker-1 ─┼─► TaskHandle
//!        └── TaskHandle (Pending)                worker-N ─┘   resolves
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::error::{catch_callback, CallbackResult, PoolError};
use crate::pool::handle::HandleState;
use crate::pool::TaskHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    queue: VecDeque<Job>,
    active: usize,
    stop: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    work_ready: Condvar,
    all_idle: Condvar,
}

/// Fixed-size pool of background execution threads.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: VecDeque::new(),
                active: 0,
                stop: false,
            }),
            work_ready: Condvar::new(),
            all_idle: Condvar::new(),
        });

        let count = workers.max(1);
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let shared = Arc::clone(&shared);
            let builder = thread::Builder::new().name(format!("pool-worker-{index}"));
            match builder.spawn(move || worker_loop(&shared)) {
                Ok(handle) => handles.push(handle),
                Err(err) => error!(worker = index, error = %err, "failed to spawn pool worker"),
            }
        }
        debug!(workers = handles.len(), "worker pool started");

        Self {
            shared,
            workers: handles,
        }
    }

    /// Submits one unit of work, waking exactly one idle worker.
    ///
    /// Fails with [`PoolError::ShutDown`] once the pool has been told to shut
    /// down; the work is not enqueued and the caller must treat the
    /// submission as lost.
    pub fn submit<F>(&self, work: F) -> Result<TaskHandle, PoolError>
    where
        F: FnOnce() -> CallbackResult + Send + 'static,
    {
        let state = Arc::new(HandleState::new());
        let completion = Arc::clone(&state);
        let job: Job = Box::new(move || {
            completion.complete(catch_callback(work));
        });

        {
            let mut pool = self.shared.state.lock();
            if pool.stop {
                return Err(PoolError::ShutDown);
            }
            pool.queue.push_back(job);
        }
        self.shared.work_ready.notify_one();
        Ok(TaskHandle::new(state))
    }

    /// Number of tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Number of tasks currently executing.
    pub fn active(&self) -> usize {
        self.shared.state.lock().active
    }

    /// Blocks until the queue is empty and no task is executing.
    ///
    /// Administrative synchronization for rare moments (startup barriers,
    /// tests); steady-state coordination belongs on [`TaskHandle`]s.
    pub fn wait_idle(&self) {
        let mut pool = self.shared.state.lock();
        while !(pool.queue.is_empty() && pool.active == 0) {
            self.shared.all_idle.wait(&mut pool);
        }
    }

    /// Stops the pool: rejects new submissions, drains queued work, and joins
    /// every worker. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        {
            let mut pool = self.shared.state.lock();
            if pool.stop && self.workers.is_empty() {
                return;
            }
            pool.stop = true;
        }
        self.shared.work_ready.notify_all();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("pool worker thread panicked");
            }
        }
        debug!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let job = {
            let mut pool = shared.state.lock();
            loop {
                if let Some(job) = pool.queue.pop_front() {
                    pool.active += 1;
                    break job;
                }
                // stop with an empty queue ends the worker; stop with queued
                // work keeps draining
                if pool.stop {
                    return;
                }
                shared.work_ready.wait(&mut pool);
            }
        };

        job();

        let mut pool = shared.state.lock();
        pool.active -= 1;
        if pool.active == 0 && pool.queue.is_empty() {
            shared.all_idle.notify_all();
        }
    }
}
