//! Input event data carried into handlers.

/// An input message received from the host channel.
///
/// Owns its data: the id and payload are copied out of host storage the
/// moment the event is received, so handlers may hold the event for as long
/// as they like (including across a worker-pool hop).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputEvent {
    /// The input identifier this message arrived on.
    pub id: String,
    /// Raw message payload.
    pub payload: Vec<u8>,
}

impl InputEvent {
    /// Creates an input event from owned (or convertible) parts.
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}
