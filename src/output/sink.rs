//! # OutputSink: the per-invocation send context.
//!
//! Every callback receives an [`OutputSink`] and sends output through it.
//! The sink's mode encodes where the callback is running, so "is it safe to
//! call the host primitive directly" is a property of what the caller holds,
//! not a thread-identity check:
//!
//! - **Direct** — constructed only by the event loop, for handlers it invokes
//!   inline on the owning thread during an active iteration. Borrows the
//!   host node for the duration of the invocation and transmits immediately.
//! - **Queued** — everything else: pooled handlers, timer callbacks, and any
//!   code holding an [`Outbox`] clone. Enqueues; the loop transmits on its
//!   next flush.
//!
//! A direct sink cannot leave the invocation that received it (it borrows the
//! node), so the fast path cannot be smuggled onto another thread.

use crate::error::SendError;
use crate::host::HostNode;
use crate::output::Outbox;

enum Mode<'a> {
    Direct { node: &'a mut (dyn HostNode + 'a) },
    Queued { outbox: &'a Outbox },
}

/// Send context handed to a callback for the duration of one invocation.
pub struct OutputSink<'a> {
    mode: Mode<'a>,
}

impl<'a> OutputSink<'a> {
    /// Direct-mode sink: transmits immediately on the borrowed host node.
    /// Only the event loop can build one, and only for inline invocations.
    pub(crate) fn direct(node: &'a mut (dyn HostNode + 'a)) -> Self {
        Self {
            mode: Mode::Direct { node },
        }
    }

    /// Queued-mode sink over an outbox.
    ///
    /// Public so that application code can funnel its own helpers through the
    /// same signature callbacks use.
    pub fn queued(outbox: &'a Outbox) -> Self {
        Self {
            mode: Mode::Queued { outbox },
        }
    }

    /// `true` when sends transmit immediately instead of enqueueing.
    pub fn is_direct(&self) -> bool {
        matches!(self.mode, Mode::Direct { .. })
    }

    /// Sends one output message.
    ///
    /// Direct mode transmits synchronously and reports the host's error, if
    /// any, as [`SendError::Transport`]. Queued mode enqueues and always
    /// succeeds; a later transmission failure is logged by the flush.
    pub fn send(&mut self, id: &str, payload: &[u8]) -> Result<(), SendError> {
        match &mut self.mode {
            Mode::Direct { node } => {
                node.send_output(id, payload)
                    .map_err(|message| SendError::Transport {
                        id: id.to_string(),
                        message,
                    })
            }
            Mode::Queued { outbox } => {
                outbox.send(id, payload);
                Ok(())
            }
        }
    }
}
