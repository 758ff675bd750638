//! Event loop lifecycle states.

use std::fmt;

/// Lifecycle of an [`EventLoop`](crate::EventLoop).
///
/// ```text
/// Idle ──run()──► Running ──terminal event──► Draining ──► Stopped
/// ```
///
/// `Stopped` is terminal; a loop is not restartable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, not yet running.
    Idle,
    /// Inside `run()`, pulling events from the host channel.
    Running,
    /// A terminal event arrived; joining the timer thread and draining the
    /// worker pool.
    Draining,
    /// Fully stopped; the host node has been released.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Running => "running",
            LoopState::Draining => "draining",
            LoopState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
