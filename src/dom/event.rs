//! Events dispatched to element handlers.

use std::fmt;
use std::rc::Rc;

use super::node::PropValue;

/// A UI event delivered to the handlers registered on one element.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event kind ("click", "change", "input", ...).
    pub kind: String,
    /// New control value carried by `change`/`input` events.
    pub value: Option<PropValue>,
}

impl Event {
    /// Event without a value.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: None,
        }
    }

    /// `change` event carrying the control's new value.
    pub fn change(value: impl Into<PropValue>) -> Self {
        Self {
            kind: "change".into(),
            value: Some(value.into()),
        }
    }

    /// `input` event carrying the control's new value.
    pub fn input(value: impl Into<PropValue>) -> Self {
        Self {
            kind: "input".into(),
            value: Some(value.into()),
        }
    }
}

/// Identifies a handler registration on one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) u64);

/// Shared event callback.
pub type EventCallback = Rc<dyn Fn(&Event)>;

/// A registered handler.
#[derive(Clone)]
pub(crate) struct Handler {
    pub(crate) id: HandlerId,
    pub(crate) kind: String,
    pub(crate) callback: EventCallback,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
