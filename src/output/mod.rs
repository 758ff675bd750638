//! Output marshaling: queue, messages, and the per-invocation send context.
//!
//! ## Contents
//! - [`Outbox`], [`OutputMessage`] — the thread-safe FIFO between producers
//!   anywhere and the single transmitting thread
//! - [`OutputSink`] — the context a callback sends through; direct mode for
//!   inline invocations on the owning thread, queued mode everywhere else
//!
//! Ordering and failure rules live with [`Outbox`]; the capability rules for
//! the direct fast path live with [`OutputSink`].

mod outbox;
mod sink;

pub use outbox::{Outbox, OutputMessage};
pub use sink::OutputSink;
