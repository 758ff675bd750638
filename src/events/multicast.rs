//! # Multicast events: ordered callback collections with stable handles.
//!
//! A [`Multicast<A>`] holds an ordered set of callbacks that are invoked
//! together, in registration order, under one enable flag. Registration
//! returns a [`HandlerHandle`] — a `(slot, generation)` pair — that stays
//! valid across unrelated add/remove traffic and is cheaply rejected once
//! its handler is gone.
//!
//! ## Rules
//! - Call order is registration order, always. Slots are append-only; a
//!   removed handler leaves a vacant slot behind instead of surrendering its
//!   index to a newer registration.
//! - A [`Handler`] identity appears at most once per event. Re-registering a
//!   clone of an already-registered handler returns the existing handle.
//! - A disabled event's `invoke` is a no-op.
//! - One failing (or panicking) handler never stops the handlers after it;
//!   the failure is logged and the invocation continues.
//!
//! ## Example
//! ```
//! use nodeloop::{Multicast, Outbox, OutputSink};
//!
//! let mut on_ping: Multicast<u32> = Multicast::new();
//! let handle = on_ping.register(|_sink, n: &u32| {
//!     assert_eq!(*n, 7);
//!     Ok(())
//! });
//!
//! let outbox = Outbox::new();
//! let mut sink = OutputSink::queued(&outbox);
//! on_ping.invoke(&mut sink, &7);
//!
//! assert!(on_ping.remove(handle));
//! assert!(!on_ping.remove(handle));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::error;

use crate::error::{catch_callback, CallbackResult};
use crate::output::OutputSink;

/// Global identity counter; handler identities are never reused.
static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(1);

/// Shared callback signature stored in a multicast event.
///
/// Callbacks receive the invocation's [`OutputSink`] (direct-mode when the
/// loop invokes inline, queued-mode on the pool or the timer thread) and the
/// event argument.
pub type Callback<A> = Arc<dyn Fn(&mut OutputSink<'_>, &A) -> CallbackResult + Send + Sync>;

/// Process-wide unique handler identity.
///
/// Monotonically increasing and never reused; this is the sole equality key
/// for duplicate-registration detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    fn next() -> Self {
        HandlerId(NEXT_HANDLER_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An identity-bearing callback.
///
/// Cloning shares the callback and keeps the identity, so a cloned handler
/// registered on the same event is recognized as a duplicate.
pub struct Handler<A> {
    id: HandlerId,
    callback: Callback<A>,
}

impl<A> Handler<A> {
    /// Wraps a callback with a fresh process-wide identity.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut OutputSink<'_>, &A) -> CallbackResult + Send + Sync + 'static,
    {
        Self {
            id: HandlerId::next(),
            callback: Arc::new(f),
        }
    }

    /// This handler's identity.
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub(crate) fn callback(&self) -> &Callback<A> {
        &self.callback
    }
}

impl<A> Clone for Handler<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<A> fmt::Debug for Handler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("id", &self.id).finish()
    }
}

/// Stable reference to one registration on one multicast event.
///
/// Valid until the handler is removed (or the event cleared); after that,
/// `remove` with this handle returns `false`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandlerHandle {
    index: usize,
    generation: u64,
}

struct Slot<A> {
    generation: u64,
    handler: Option<Handler<A>>,
}

/// Ordered collection of callbacks invoked together under one enable flag.
pub struct Multicast<A> {
    slots: Vec<Slot<A>>,
    enabled: bool,
}

impl<A> Multicast<A> {
    /// Creates an empty, enabled event.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            enabled: true,
        }
    }

    /// Registers a plain callback, assigning it a fresh identity.
    pub fn register<F>(&mut self, f: F) -> HandlerHandle
    where
        F: Fn(&mut OutputSink<'_>, &A) -> CallbackResult + Send + Sync + 'static,
    {
        self.push_slot(Handler::new(f))
    }

    /// Registers an identity-bearing handler.
    ///
    /// If a handler with the same identity is already registered, nothing is
    /// added and the existing registration's handle is returned.
    pub fn register_handler(&mut self, handler: Handler<A>) -> HandlerHandle {
        let existing = self.slots.iter().enumerate().find(|(_, slot)| {
            slot.handler
                .as_ref()
                .is_some_and(|h| h.id() == handler.id())
        });
        if let Some((index, slot)) = existing {
            return HandlerHandle {
                index,
                generation: slot.generation,
            };
        }
        self.push_slot(handler)
    }

    fn push_slot(&mut self, handler: Handler<A>) -> HandlerHandle {
        self.slots.push(Slot {
            generation: 0,
            handler: Some(handler),
        });
        HandlerHandle {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Removes the registration behind `handle`.
    ///
    /// Returns `false` if the handle is stale: already removed, cleared, or
    /// from another event.
    pub fn remove(&mut self, handle: HandlerHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index) else {
            return false;
        };
        if slot.generation != handle.generation || slot.handler.is_none() {
            return false;
        }
        slot.handler = None;
        slot.generation += 1;
        true
    }

    /// Removes every handler and invalidates all outstanding handles.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.handler.take().is_some() {
                slot.generation += 1;
            }
        }
    }

    /// Number of live handlers.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.handler.is_some()).count()
    }

    /// `true` when no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gates `invoke`: a disabled event's `invoke` is a no-op.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether `invoke` currently does anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Calls every live handler synchronously, in registration order.
    ///
    /// A handler that returns `Err` or panics is logged and skipped; the
    /// handlers after it still run. No-op while the event is disabled.
    pub fn invoke(&self, sink: &mut OutputSink<'_>, arg: &A) {
        if !self.enabled {
            return;
        }
        for slot in &self.slots {
            let Some(handler) = &slot.handler else {
                continue;
            };
            if let Err(err) = catch_callback(|| (handler.callback)(&mut *sink, arg)) {
                error!(handler = %handler.id(), error = %err, "event handler failed");
            }
        }
    }

    /// Live handlers in registration order, for relocation onto the worker
    /// pool. Empty while the event is disabled.
    pub(crate) fn snapshot(&self) -> Vec<(HandlerId, Callback<A>)> {
        if !self.enabled {
            return Vec::new();
        }
        self.slots
            .iter()
            .filter_map(|slot| slot.handler.as_ref())
            .map(|h| (h.id(), Arc::clone(&h.callback)))
            .collect()
    }
}

impl<A> Default for Multicast<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Multicast<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multicast")
            .field("live", &self.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}
