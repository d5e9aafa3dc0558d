//! Host element tree: slotmap-backed arena, shared document handle,
//! mutation records, and events.

pub mod document;
pub mod event;
pub mod mutation;
pub mod node;
pub mod tree;

pub use document::{Document, WeakDocument};
pub use event::{Event, EventCallback, HandlerId};
pub use mutation::MutationRecord;
pub use node::{NodeData, NodeId, PropValue};
pub use tree::{Dom, DomError};
