//! Completion handles for submitted work.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::CallbackResult;

enum Completion {
    Pending,
    Ready(CallbackResult),
    Taken,
}

pub(crate) struct HandleState {
    slot: Mutex<Completion>,
    done: Condvar,
}

impl HandleState {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Completion::Pending),
            done: Condvar::new(),
        }
    }

    pub(crate) fn complete(&self, result: CallbackResult) {
        *self.slot.lock() = Completion::Ready(result);
        self.done.notify_all();
    }
}

/// Asynchronous handle to one unit of work submitted to the pool.
///
/// Resolves to the task's [`CallbackResult`] — an `Err` covers both a failure
/// returned by the task body and a captured panic. The result is observable
/// **exactly once**: the first successful [`try_result`](TaskHandle::try_result)
/// takes it.
pub struct TaskHandle {
    state: Arc<HandleState>,
}

impl TaskHandle {
    pub(crate) fn new(state: Arc<HandleState>) -> Self {
        Self { state }
    }

    /// `true` once the task has finished running (even if the result has
    /// already been taken).
    pub fn is_finished(&self) -> bool {
        !matches!(*self.state.slot.lock(), Completion::Pending)
    }

    /// Takes the result if the task has finished.
    ///
    /// Returns `None` while the task is still pending, and `None` again after
    /// the result has been taken once.
    pub fn try_result(&self) -> Option<CallbackResult> {
        let mut slot = self.state.slot.lock();
        match std::mem::replace(&mut *slot, Completion::Taken) {
            Completion::Ready(result) => Some(result),
            Completion::Pending => {
                *slot = Completion::Pending;
                None
            }
            Completion::Taken => None,
        }
    }

    /// Blocks until the task has finished running.
    ///
    /// Does not consume the result; follow with
    /// [`try_result`](TaskHandle::try_result) to observe it.
    pub fn wait(&self) {
        let mut slot = self.state.slot.lock();
        while matches!(*slot, Completion::Pending) {
            self.state.done.wait(&mut slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_is_observable_exactly_once() {
        let state = Arc::new(HandleState::new());
        let handle = TaskHandle::new(Arc::clone(&state));
        assert!(!handle.is_finished());
        assert!(handle.try_result().is_none());

        state.complete(Ok(()));
        assert!(handle.is_finished());
        assert!(handle.try_result().is_some());
        assert!(handle.try_result().is_none());
        assert!(handle.is_finished());
    }

    #[test]
    fn wait_blocks_until_completion() {
        let state = Arc::new(HandleState::new());
        let handle = TaskHandle::new(Arc::clone(&state));

        let completer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            state.complete(Err("late failure".into()));
        });
        handle.wait();
        assert!(handle.try_result().expect("result present").is_err());
        completer.join().expect("completer panicked");
    }
}
