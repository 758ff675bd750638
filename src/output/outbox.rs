//! # Outbox: the cross-thread output queue.
//!
//! [`Outbox`] reconciles "produce from any thread" with "the host channel may
//! only be driven from one thread". Producers enqueue [`OutputMessage`]s from
//! wherever they run; the event loop drains the queue at the top of every
//! iteration (and once more while draining) via [`Outbox::flush_into`], which
//! needs exclusive access to the host node and is therefore only reachable
//! from the owning thread.
//!
//! ## Rules
//! - `send` never blocks beyond the queue lock and never fails; the queue is
//!   unbounded.
//! - Flush transmits in FIFO order. Messages enqueued by one producer keep
//!   that producer's order; no order is defined between producers racing into
//!   the same flush window.
//! - A per-message transmission failure is logged and the message dropped;
//!   the flush continues with the rest of the queue.
//! - The lock is held per queue operation, never across a transmission.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::host::HostNode;

/// One queued output message, owned until it is transmitted or dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputMessage {
    /// The output identifier to transmit on.
    pub id: String,
    /// Raw message payload.
    pub payload: Vec<u8>,
}

/// Thread-safe output queue shared between producers and the event loop.
///
/// Cheap to clone (a handle over the shared queue), like
/// [`Timers`](crate::Timers). Clones taken before `run` are how timer
/// callbacks, pooled handlers, and unrelated threads produce output.
#[derive(Clone, Default)]
pub struct Outbox {
    queue: Arc<Mutex<VecDeque<OutputMessage>>>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues one message for the next flush.
    pub fn send(&self, id: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.queue.lock().push_back(OutputMessage {
            id: id.into(),
            payload: payload.into(),
        });
    }

    /// Number of currently queued messages.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// `true` when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn pop(&self) -> Option<OutputMessage> {
        self.queue.lock().pop_front()
    }

    /// Dequeues and transmits every currently queued message, in FIFO order.
    ///
    /// Requires the host node, which only the owning thread inside the loop
    /// holds. Failed transmissions are logged and dropped without stopping
    /// the flush. Returns the number of messages transmitted.
    pub(crate) fn flush_into(&self, node: &mut dyn HostNode) -> usize {
        let mut transmitted = 0;
        while let Some(message) = self.pop() {
            match node.send_output(&message.id, &message.payload) {
                Ok(()) => transmitted += 1,
                Err(error) => {
                    warn!(output = %message.id, %error, "dropping output message after failed transmission");
                }
            }
        }
        if transmitted > 0 {
            trace!(count = transmitted, "flushed output queue");
        }
        transmitted
    }
}
