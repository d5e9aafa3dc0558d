//! Read and write traits shared by every reactive node.

use std::rc::Rc;

use super::error::ReactiveError;
use super::registry::Subscription;

/// A readable reactive node: an [`Observable`](super::Observable) cell or a
/// [`Derived`](super::Derived) value.
///
/// Handles are cheap to clone; clones share the same node.
pub trait Source<T>: Clone + 'static {
    /// Current value. Derived nodes that are not live recompute on every call.
    fn get(&self) -> T;

    /// Register a `(new, old)` change listener.
    ///
    /// The listener is **not** invoked with the current value on subscribe;
    /// it first runs on the next change. Subscribing to a derived node makes
    /// it (and transitively its sources) live.
    fn subscribe(&self, listener: impl Fn(&T, &T) + 'static) -> Subscription;

    /// Number of active listeners.
    fn listener_count(&self) -> usize;

    /// Change counter. It moves whenever the value seen by `get` may have
    /// changed, so dependents can tell whether their cache is stale.
    fn version(&self) -> u64;

    /// Whether at least one listener is registered.
    fn is_live(&self) -> bool {
        self.listener_count() > 0
    }

    /// Register a value-less change callback. Used to wire derived nodes to
    /// their sources without knowing the source's value type.
    fn watch(&self, on_change: Rc<dyn Fn()>) -> Subscription {
        self.subscribe(move |_, _| on_change())
    }
}

/// A writable reactive node.
pub trait Sink<T>: Source<T> {
    /// Write a value, reporting contract violations instead of panicking.
    fn try_set(&self, value: T) -> Result<(), ReactiveError>;

    /// Write a value.
    ///
    /// # Panics
    ///
    /// Panics if the write violates the node's contract (see
    /// [`ReactiveError`]). Use [`Sink::try_set`] to handle it instead.
    fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            tracing::warn!(%err, "rejected reactive write");
            panic!("{err}");
        }
    }

    /// `try_set(f(get()))`. `f` receives an owned copy, so the stored value
    /// stays untouched until the write is accepted.
    fn try_mutate(&self, f: impl FnOnce(T) -> T) -> Result<(), ReactiveError> {
        self.try_set(f(self.get()))
    }

    /// `set(f(get()))`.
    ///
    /// # Panics
    ///
    /// Same as [`Sink::set`].
    fn mutate(&self, f: impl FnOnce(T) -> T) {
        self.set(f(self.get()));
    }
}
