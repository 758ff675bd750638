//! # Host dataflow boundary.
//!
//! The runtime never talks to a concrete dataflow framework; it consumes a
//! [`HostNode`] — one already-initialized connection to the host's
//! single-threaded message channel. The contract mirrors what such runtimes
//! actually provide:
//!
//! - [`HostNode::next_event`] blocks until the host yields the next event and
//!   is the loop's only suspension point on the owning thread.
//! - [`HostNode::send_output`] is the non-reentrant transmission primitive
//!   and must only ever be called from the thread driving the loop. The type
//!   system enforces this: the node is owned by the loop and reachable
//!   elsewhere only through the borrow inside a direct-mode
//!   [`OutputSink`](crate::OutputSink).
//!
//! Classification is folded into the [`HostEvent`] enum: an implementation
//! maps whatever its framework hands back onto the four kinds the loop
//! routes. Input id and payload must be **copied out of host-owned storage**
//! before the event is returned; nothing downstream may touch host memory.

use crate::events::InputEvent;

/// A classified event pulled from the host channel.
#[derive(Clone, Debug)]
pub enum HostEvent {
    /// A message arrived on one of the node's inputs.
    Input(InputEvent),
    /// The host asked this node to stop.
    Stop,
    /// Every upstream input of this node has closed.
    AllInputsClosed,
    /// An event kind this wrapper does not understand, with the host's raw
    /// type code. The loop treats it as a terminal event.
    Unknown(u32),
}

/// One node's connection to the host dataflow channel.
///
/// Implementations wrap the host framework's node handle. The loop owns the
/// value for its whole run and releases it when it stops.
pub trait HostNode {
    /// Blocks until the host yields the next event.
    ///
    /// Returns `None` when the channel can no longer produce events at all
    /// (torn down without a stop notification). The loop treats `None` as
    /// fatal and exits with [`LoopError::ChannelBroken`](crate::LoopError::ChannelBroken)
    /// after draining.
    fn next_event(&mut self) -> Option<HostEvent>;

    /// Transmits one output message on the host channel.
    ///
    /// Must only be called from the thread that owns this node. A non-`Ok`
    /// return carries the host's error string; the runtime logs it and drops
    /// the message on the queued path, or surfaces it as
    /// [`SendError::Transport`](crate::SendError::Transport) on the direct path.
    fn send_output(&mut self, id: &str, payload: &[u8]) -> Result<(), String>;
}
