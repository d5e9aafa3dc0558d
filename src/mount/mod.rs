//! Mount-aware bindings: attach reactive expressions to element sites and
//! keep them subscribed only while their element is in the connected tree.

pub mod binding;
pub mod lifecycle;

pub use binding::{AttrValue, Binding, BindingSpec, BindingState, Site};
pub use lifecycle::{ActivationEvent, AttachmentTracker, TrackerConfig};
