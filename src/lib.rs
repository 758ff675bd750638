//! # nodeloop
//!
//! **nodeloop** is an event-dispatch runtime for dataflow nodes.
//!
//! It sits between a single-threaded, externally-owned message channel (a
//! host dataflow runtime that yields one event at a time and exposes a
//! non-reentrant send primitive) and application callbacks that may need to
//! run concurrently and on their own schedule. The crate is designed as a
//! building block: the host framework is consumed through the [`HostNode`]
//! trait, and everything protocol- or payload-specific stays with the
//! application.
//!
//! ## Architecture
//! ```text
//!                ┌───────────────────────────────────────────────────┐
//!                │  EventLoop (owning thread)                        │
//!  host channel ─┼─► next_event ─► classify ─► route                 │
//!                │        ▲                      │                   │
//!                │        │              ┌───────┴────────┐          │
//!                │   per-iteration:      ▼                ▼          │
//!                │   flush + reap   per-id handler   on_input event  │
//!                └────────┬─────────────┬────────────────┬───────────┘
//!                         │             │ inline         │ pool mode
//!                         │             ▼                ▼
//!                         │       direct OutputSink   WorkerPool
//!                         │        (sends now)        (queued sink)
//!                         │                               │
//!                         ▼                               ▼
//!                ┌──────────────┐  send from anywhere ┌───────┐
//!                │ host channel │ ◄─── flush ─────────│Outbox │◄── Timers thread
//!                └──────────────┘                     └───────┘
//! ```
//!
//! ## Components
//! | Area            | Description                                                    | Key types                          |
//! |-----------------|----------------------------------------------------------------|------------------------------------|
//! | **Event loop**  | Pulls, classifies, and routes host events; runs maintenance.   | [`EventLoop`], [`LoopState`]       |
//! | **Events**      | Ordered multicast callbacks with stable handles.               | [`Multicast`], [`Handler`]         |
//! | **Worker pool** | Background threads executing handlers; per-task result handles.| [`WorkerPool`], [`TaskHandle`]     |
//! | **Timers**      | Named one-shot/repeating interval callbacks, own thread.       | [`Timers`]                         |
//! | **Output**      | Cross-thread output queue plus the direct-send fast path.      | [`Outbox`], [`OutputSink`]         |
//! | **Host**        | The boundary to the dataflow framework.                        | [`HostNode`], [`HostEvent`]        |
//! | **Errors**      | Typed errors per surface; isolated callback failures.          | [`LoopError`], [`CallbackError`]   |
//!
//! ## Guarantees, in short
//! - Handlers on one multicast fire in registration order when invoked
//!   inline; a failing handler never blocks its siblings.
//! - Output is transmitted in FIFO order per flush; each producer's own
//!   enqueue order is preserved.
//! - Pool shutdown drains queued work; nothing submitted is silently lost.
//! - The host transmission primitive is only ever touched by the owning
//!   thread — enforced by ownership, not by thread-id checks.
//!
//! ## Example
//! ```no_run
//! use nodeloop::{Config, EventLoop, HostEvent, HostNode, LoopError};
//! use std::time::Duration;
//!
//! # struct FrameworkNode;
//! # impl HostNode for FrameworkNode {
//! #     fn next_event(&mut self) -> Option<HostEvent> { Some(HostEvent::Stop) }
//! #     fn send_output(&mut self, _: &str, _: &[u8]) -> Result<(), String> { Ok(()) }
//! # }
//! # fn connect_to_framework() -> Result<FrameworkNode, LoopError> { Ok(FrameworkNode) }
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::named("steering_node");
//!     cfg.workers = 2;
//!
//!     let mut node = EventLoop::new(cfg);
//!     node.register_input_handler("cmd_vel", |sink, event| {
//!         // decode, compute, respond
//!         sink.send("wheel_cmd", &event.payload)?;
//!         Ok(())
//!     });
//!     node.register_timer("odom", Duration::from_millis(100), true, |sink| {
//!         sink.send("odometry", b"...")?;
//!         Ok(())
//!     })?;
//!
//!     node.run_with(connect_to_framework)?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod host;
mod output;
mod pool;
mod timers;

// ---- Public re-exports ----

pub use config::Config;
pub use core::{EventHandle, EventKind, EventLoop, LoopState};
pub use error::{CallbackError, CallbackResult, LoopError, PoolError, SendError, TimerError};
pub use events::{Callback, Handler, HandlerHandle, HandlerId, InputEvent, Multicast};
pub use host::{HostEvent, HostNode};
pub use output::{Outbox, OutputMessage, OutputSink};
pub use pool::{TaskHandle, WorkerPool};
pub use timers::{TimerCallback, Timers};
