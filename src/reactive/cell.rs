//! `Observable<V>`: the root mutable cell of a reactive graph.
//!
//! A cell stores a value, a version counter, and a listener set. Writes that
//! compare equal to the stored value (under the cell's [`Equality`]) are
//! no-ops; every other write stores the value, bumps the version, and then
//! synchronously notifies a snapshot of the listeners in subscription order
//! with `(new, old)`.
//!
//! Listeners may write back into the same cell. The nested write runs its own
//! full notification, and the outer one stops there: listeners later in the
//! outer snapshot only see the nested `(new, old)` pair, never a value the
//! cell has already left behind.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::equality::Equality;
use super::error::ReactiveError;
use super::lens::Lens;
use super::registry::{deliver, ListenerSet, Subscription};
use super::source::{Sink, Source};
use super::transform::Derived;

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct CellState<V> {
    value: RefCell<V>,
    version: Cell<u64>,
    listeners: RefCell<ListenerSet<V>>,
    equality: Equality<V>,
}

// ---------------------------------------------------------------------------
// Observable
// ---------------------------------------------------------------------------

/// A mutable holder of a value with change notification.
///
/// Cloning an `Observable` yields another handle to the **same** cell.
pub struct Observable<V> {
    state: Rc<CellState<V>>,
}

impl<V> Clone for Observable<V> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Observable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &*self.state.value.borrow())
            .field("version", &self.state.version.get())
            .field("listeners", &self.state.listeners.borrow().len())
            .finish()
    }
}

impl<V: Clone + PartialEq + 'static> Observable<V> {
    /// Create a cell compared with `PartialEq`.
    pub fn new(value: V) -> Self {
        Self::with_equality(value, Equality::partial_eq())
    }
}

impl<V: Clone + 'static> Observable<V> {
    /// Create a cell with a custom change-detection policy.
    pub fn with_equality(value: V, equality: Equality<V>) -> Self {
        Self {
            state: Rc::new(CellState {
                value: RefCell::new(value),
                version: Cell::new(0),
                listeners: RefCell::new(ListenerSet::new()),
                equality,
            }),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> V {
        self.state.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// Writing to this cell from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R {
        f(&self.state.value.borrow())
    }

    /// Store `value` and notify listeners, unless it equals the current value.
    ///
    /// A panicking comparator propagates to the caller and leaves the cell
    /// unchanged.
    pub fn set(&self, value: V) {
        let unchanged = {
            let current = self.state.value.borrow();
            self.state.equality.eq(&current, &value)
        };
        if unchanged {
            return;
        }
        let old = self.state.value.replace(value);
        let version = self.state.version.get() + 1;
        self.state.version.set(version);

        let listeners = self.state.listeners.borrow().snapshot();
        if listeners.is_empty() {
            return;
        }
        let new = self.get();
        deliver(&listeners, &new, &old, || self.state.version.get() == version);
    }

    /// `set(f(get()))`.
    ///
    /// `f` works on an owned copy; the stored value is never mutated in place,
    /// so the equality check and the `old` argument passed to listeners always
    /// see the previous value.
    pub fn mutate(&self, f: impl FnOnce(V) -> V) {
        self.set(f(self.get()));
    }

    /// Register a `(new, old)` listener. Not invoked until the next change.
    pub fn subscribe(&self, listener: impl Fn(&V, &V) + 'static) -> Subscription {
        let id = self.state.listeners.borrow_mut().insert(Rc::new(listener));
        let weak: Weak<CellState<V>> = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state.listeners.borrow_mut().remove(id);
            }
        })
    }

    /// Number of value-changing writes so far.
    pub fn version(&self) -> u64 {
        self.state.version.get()
    }

    /// Number of active listeners.
    pub fn listener_count(&self) -> usize {
        self.state.listeners.borrow().len()
    }

    /// Whether any listener is registered.
    pub fn is_live(&self) -> bool {
        self.listener_count() > 0
    }

    /// Live, writable view onto one part of the value.
    ///
    /// Writing the view rebuilds the parent through `lens` and stores it with
    /// [`Observable::set`].
    pub fn property<A>(&self, lens: Lens<V, A>) -> Derived<A>
    where
        A: Clone + PartialEq + 'static,
    {
        Derived::property(self.clone(), lens)
    }
}

impl<V: Clone + 'static> Source<V> for Observable<V> {
    fn get(&self) -> V {
        Observable::get(self)
    }

    fn subscribe(&self, listener: impl Fn(&V, &V) + 'static) -> Subscription {
        Observable::subscribe(self, listener)
    }

    fn listener_count(&self) -> usize {
        Observable::listener_count(self)
    }

    fn version(&self) -> u64 {
        Observable::version(self)
    }
}

impl<V: Clone + 'static> Sink<V> for Observable<V> {
    fn try_set(&self, value: V) -> Result<(), ReactiveError> {
        Observable::set(self, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
