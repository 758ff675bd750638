//! Event data model: multicast callback collections and input events.
//!
//! ## Contents
//! - [`Multicast`], [`Handler`], [`HandlerHandle`], [`HandlerId`] — ordered
//!   callback sets with stable slot handles and process-wide identities
//! - [`InputEvent`] — an owned copy of one host input message
//!
//! The four built-in multicasts (`on_input`, `on_stop`,
//! `on_all_inputs_closed`, `on_unknown`) live as public fields on
//! [`EventLoop`](crate::EventLoop); this module only provides the types.

mod input;
mod multicast;

pub use input::InputEvent;
pub use multicast::{Callback, Handler, HandlerHandle, HandlerId, Multicast};
