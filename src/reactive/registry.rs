//! Listener registry and subscription handles.
//!
//! Every reactive node owns a [`ListenerSet`]: an insertion-ordered list of
//! callbacks keyed by [`ListenerId`]. Notification always iterates a
//! *snapshot* of the set taken before the first callback runs, so listeners
//! that subscribe, unsubscribe, or write back into the graph while a
//! notification is in flight never disturb delivery to the others.
//!
//! A listener that writes the node again starts a nested notification that
//! reaches every listener with the newer value. The outer notification then
//! stops, so no listener is handed a value the node no longer holds.

use std::fmt;
use std::rc::Rc;

/// A change callback receiving `(new_value, old_value)`.
pub type Listener<T> = Rc<dyn Fn(&T, &T)>;

/// Identifies one registration inside a [`ListenerSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

// ---------------------------------------------------------------------------
// ListenerSet
// ---------------------------------------------------------------------------

/// Ordered set of active listener registrations for one reactive node.
///
/// Ids are never reused, so removing a stale id is a harmless no-op.
pub struct ListenerSet<T> {
    next_id: u64,
    entries: Vec<(ListenerId, Listener<T>)>,
}

impl<T> ListenerSet<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Register a listener at the end of the delivery order.
    pub fn insert(&mut self, listener: Listener<T>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Remove a registration. Returns `false` if it was already gone.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Whether `id` is still registered.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    /// Number of active registrations (the node's liveness count).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the current registrations, in insertion order, for delivery.
    pub fn snapshot(&self) -> Vec<Listener<T>> {
        self.entries
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// Deliver one notification to a snapshot of listeners.
///
/// Stops early once `current` reports that a nested write superseded `new`.
pub(crate) fn deliver<T>(
    listeners: &[Listener<T>],
    new: &T,
    old: &T,
    current: impl Fn() -> bool,
) {
    for listener in listeners {
        if !current() {
            break;
        }
        listener(new, old);
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle for an active registration.
///
/// Disposing the handle (explicitly or by dropping it) removes the listener.
/// Disposal is idempotent: the second call does nothing.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Build a handle that runs `cancel` exactly once on disposal.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle that is already disposed.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Merge several handles into one that disposes all of them, in order.
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || drop(subscriptions))
    }

    /// Remove the listener. Calling this again is a no-op.
    pub fn dispose(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Whether the handle has not been disposed yet.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn recording(log: &Rc<RefCell<Vec<String>>>, name: &'static str) -> Listener<i32> {
        let log = Rc::clone(log);
        Rc::new(move |new: &i32, old: &i32| {
            log.borrow_mut().push(format!("{name}:{old}->{new}"));
        })
    }

    #[test]
    fn insert_preserves_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut set = ListenerSet::new();
        set.insert(recording(&log, "a"));
        set.insert(recording(&log, "b"));
        set.insert(recording(&log, "c"));
        deliver(&set.snapshot(), &1, &0, || true);
        assert_eq!(*log.borrow(), vec!["a:0->1", "b:0->1", "c:0->1"]);
    }

    #[test]
    fn superseded_delivery_stops() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut set = ListenerSet::new();
        set.insert(recording(&log, "a"));
        set.insert(recording(&log, "b"));
        let remaining = Cell::new(1u32);
        deliver(&set.snapshot(), &1, &0, || {
            let left = remaining.get();
            remaining.set(left.saturating_sub(1));
            left > 0
        });
        assert_eq!(*log.borrow(), vec!["a:0->1"]);
    }

    #[test]
    fn ids_are_not_reused() {
        let mut set: ListenerSet<i32> = ListenerSet::new();
        let a = set.insert(Rc::new(|_: &i32, _: &i32| {}));
        assert!(set.remove(a));
        let b = set.insert(Rc::new(|_: &i32, _: &i32| {}));
        assert_ne!(a, b);
        assert!(!set.remove(a));
        assert!(set.contains(b));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_removal() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut set = ListenerSet::new();
        set.insert(recording(&log, "a"));
        let b = set.insert(recording(&log, "b"));
        let snapshot = set.snapshot();
        set.remove(b);
        deliver(&snapshot, &2, &1, || true);
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn subscription_disposes_once() {
        let calls = Rc::new(Cell::new(0));
        let calls_c = Rc::clone(&calls);
        let mut sub = Subscription::new(move || calls_c.set(calls_c.get() + 1));
        assert!(sub.is_active());
        sub.dispose();
        sub.dispose();
        drop(sub);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn drop_disposes() {
        let calls = Rc::new(Cell::new(0));
        let calls_c = Rc::clone(&calls);
        {
            let _sub = Subscription::new(move || calls_c.set(calls_c.get() + 1));
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn all_disposes_every_member() {
        let calls = Rc::new(Cell::new(0));
        let subs = (0..3)
            .map(|_| {
                let calls = Rc::clone(&calls);
                Subscription::new(move || calls.set(calls.get() + 1))
            })
            .collect();
        let mut combined = Subscription::all(subs);
        combined.dispose();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn empty_is_inactive() {
        let mut sub = Subscription::empty();
        assert!(!sub.is_active());
        sub.dispose();
    }
}
