//! Change-detection policy shared by cells and derived values.

use std::fmt;
use std::rc::Rc;

/// Decides whether a write actually changes a value.
///
/// Writes that compare equal are dropped without notifying anyone. A
/// comparator that panics unwinds out of the write before any state has been
/// touched, leaving the old value in place.
pub struct Equality<V> {
    eq: Rc<dyn Fn(&V, &V) -> bool>,
}

impl<V> Equality<V> {
    /// Use a custom comparator.
    pub fn new(eq: impl Fn(&V, &V) -> bool + 'static) -> Self {
        Self { eq: Rc::new(eq) }
    }

    /// Treat every write as a change.
    pub fn never() -> Self {
        Self::new(|_, _| false)
    }

    /// Compare `old` and `new` under this policy.
    pub fn eq(&self, old: &V, new: &V) -> bool {
        (self.eq)(old, new)
    }
}

impl<V: PartialEq> Equality<V> {
    /// Structural equality via `PartialEq` (the default).
    pub fn partial_eq() -> Self {
        Self::new(|a: &V, b: &V| a == b)
    }
}

impl<V> Clone for Equality<V> {
    fn clone(&self) -> Self {
        Self {
            eq: Rc::clone(&self.eq),
        }
    }
}

impl<V> fmt::Debug for Equality<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equality").finish_non_exhaustive()
    }
}
