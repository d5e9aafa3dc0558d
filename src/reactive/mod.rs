//! Reactive state: observable cells, transform links, listener registry.
//!
//! Single-threaded and synchronous: every notification is delivered inside
//! the write that caused it.
//!
//! - [`Observable`]: root cell with get/set/mutate and equality-based no-op
//!   suppression.
//! - [`Derived`]: transform link over one or more sources, lazy while idle,
//!   optionally writable through an inverse (`bimap`, `filter`, `property`).
//! - [`Lens`]: typed property view used by [`Derived::property`].
//! - [`Subscription`]: idempotent disposal handle for a listener.

pub mod cell;
pub mod equality;
pub mod error;
pub mod filter;
pub mod lens;
pub mod registry;
pub mod source;
pub mod transform;

pub use cell::Observable;
pub use equality::Equality;
pub use error::ReactiveError;
pub use filter::{filter_items, merge_filtered};
pub use lens::Lens;
pub use registry::{Listener, ListenerId, ListenerSet, Subscription};
pub use source::{Sink, Source};
pub use transform::Derived;
