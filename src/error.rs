//! Error types used by the nodeloop runtime and its callbacks.
//!
//! This module defines the error enums for each runtime surface:
//!
//! - [`LoopError`] — errors raised by the event loop lifecycle itself.
//! - [`PoolError`] — usage errors reported by the worker pool.
//! - [`TimerError`] — usage errors reported by the timer registry.
//! - [`SendError`] — output transmission failures surfaced to callers.
//! - [`CallbackError`] — a failure captured from inside a registered callback.
//!
//! Callbacks never unwind into the dispatcher: [`catch_callback`] wraps every
//! callback boundary (multicast invoke, pooled task, timer fire) and converts
//! panics into [`CallbackError::Panicked`]. The boundary that observes the
//! failure logs it; nothing is re-raised.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

use crate::core::LoopState;

/// Result of a single callback invocation.
pub type CallbackResult = Result<(), CallbackError>;

/// # Errors produced by the event loop lifecycle.
///
/// These represent failures of the loop itself, as opposed to failures of
/// individual callbacks (see [`CallbackError`]).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoopError {
    /// `run()` was called without a host node installed.
    #[error("event loop has no host node; install one or use run_with")]
    NotConnected,

    /// `run()` was called from a state other than `Idle`.
    #[error("event loop cannot start from state `{state}`")]
    InvalidState {
        /// The state the loop was in when `run()` was called.
        state: LoopState,
    },

    /// The host channel yielded no event; the channel is broken or was torn
    /// down without a stop notification. Fatal: the loop drains and exits.
    #[error("host channel yielded no event")]
    ChannelBroken,

    /// Lazy host initialization failed inside `run_with`.
    #[error("host initialization failed: {message}")]
    InitFailed {
        /// The underlying error message.
        message: String,
    },
}

impl LoopError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            LoopError::NotConnected => "loop_not_connected",
            LoopError::InvalidState { .. } => "loop_invalid_state",
            LoopError::ChannelBroken => "loop_channel_broken",
            LoopError::InitFailed { .. } => "loop_init_failed",
        }
    }
}

/// # Usage errors reported by the worker pool.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PoolError {
    /// `submit` was called after the pool was told to shut down. The work
    /// unit was not enqueued and will never run.
    #[error("worker pool is shut down; task rejected")]
    ShutDown,
}

/// # Usage errors reported by the timer registry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TimerError {
    /// A timer was registered with a zero interval.
    #[error("timer `{id}` requires a non-zero interval")]
    ZeroInterval {
        /// The offending timer id.
        id: String,
    },
}

/// # Output transmission failures.
///
/// Surfaced to the caller on the direct-send fast path; on the queued path
/// the flush logs the failure and drops the message instead (the producer is
/// long gone by then).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SendError {
    /// The host transmission primitive reported an error.
    #[error("transmission of output `{id}` failed: {message}")]
    Transport {
        /// The output identifier that failed to transmit.
        id: String,
        /// The error string reported by the host.
        message: String,
    },
}

/// # A failure captured from inside a registered callback.
///
/// Covers both an `Err` returned by the callback body and a panic caught at
/// the callback boundary. Isolated at single-callback granularity: one failed
/// handler never affects its siblings or the loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CallbackError {
    /// The callback body returned an error.
    #[error("callback failed: {message}")]
    Failed {
        /// The underlying error message.
        message: String,
    },

    /// The callback body panicked; the panic was caught at the boundary.
    #[error("callback panicked: {message}")]
    Panicked {
        /// The panic payload, stringified when possible.
        message: String,
    },
}

impl CallbackError {
    /// Creates a `Failed` error from any displayable message.
    pub fn failed(message: impl Into<String>) -> Self {
        CallbackError::Failed {
            message: message.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CallbackError::Failed { .. } => "callback_failed",
            CallbackError::Panicked { .. } => "callback_panicked",
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        CallbackError::Panicked { message }
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        CallbackError::Failed { message }
    }
}

impl From<SendError> for CallbackError {
    fn from(err: SendError) -> Self {
        CallbackError::Failed {
            message: err.to_string(),
        }
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        CallbackError::failed(message)
    }
}

/// Runs a callback body, converting a panic into [`CallbackError::Panicked`].
///
/// Every callback boundary in the runtime goes through here so that a
/// misbehaving callback can be logged and skipped instead of tearing down a
/// worker, the timer thread, or the loop.
pub(crate) fn catch_callback<F>(f: F) -> CallbackResult
where
    F: FnOnce() -> CallbackResult,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(CallbackError::from_panic(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_callback_passes_results_through() {
        assert!(catch_callback(|| Ok(())).is_ok());
        let err = catch_callback(|| Err(CallbackError::failed("boom"))).unwrap_err();
        assert_eq!(err.as_label(), "callback_failed");
    }

    #[test]
    fn catch_callback_captures_panics() {
        let err = catch_callback(|| panic!("kaput")).unwrap_err();
        match err {
            CallbackError::Panicked { message } => assert_eq!(message, "kaput"),
            other => panic!("expected Panicked, got {other:?}"),
        }
    }
}
