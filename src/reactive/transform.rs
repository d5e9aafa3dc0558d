//! `Derived<W>`: transform links computed from one or more sources.
//!
//! A derived node is **live** while it has at least one listener. Going live
//! subscribes it to every source (making derived sources live in turn) and
//! fills its cache; from then on each source change recomputes the cache
//! exactly once and notifies listeners when the result changed. When the last
//! listener leaves, the node unsubscribes from its sources and drops its
//! cache. While not live, [`Derived::get`] recomputes from the current source
//! values on every call and source changes cost nothing.
//!
//! A live cache remembers the version of every source it was computed from.
//! Reading it first compares those versions and recomputes if any moved, so a
//! node that shares a root with one of its sources (a diamond) never combines
//! a fresh value with a sibling that has not heard of the change yet. The
//! notification for such an early recompute is still delivered when the
//! source's own notification arrives.
//!
//! Links built with an inverse are writable: [`Sink::try_set`] maps the value
//! back and writes the source, so writes at the leaves travel up to the root
//! cell.
//!
//! Sources must exist before a link can name them, so the typed constructors
//! only build acyclic graphs. A forward function that reaches its own node
//! through captured state anyway is caught when it re-enters its own
//! recomputation and panics with [`ReactiveError::Cycle`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::equality::Equality;
use super::error::ReactiveError;
use super::registry::{deliver, ListenerSet, Subscription};
use super::source::{Sink, Source};

pub(crate) type Compute<W> = Box<dyn Fn() -> W>;
pub(crate) type Inverse<W> = Box<dyn Fn(W) -> Result<(), ReactiveError>>;

/// A source with its value type erased: change wiring plus a version probe.
pub(crate) struct Connector {
    watch: Box<dyn Fn(Rc<dyn Fn()>) -> Subscription>,
    version: Box<dyn Fn() -> u64>,
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct LinkState<W> {
    compute: Compute<W>,
    inverse: Option<Inverse<W>>,
    connectors: Vec<Connector>,
    equality: RefCell<Equality<W>>,
    /// `Some` exactly while live.
    cache: RefCell<Option<W>>,
    /// Source versions the cache was computed from.
    seen: RefCell<Vec<u64>>,
    /// Previous value of a cache change not yet delivered to listeners.
    undelivered: RefCell<Option<W>>,
    version: Cell<u64>,
    listeners: RefCell<ListenerSet<W>>,
    upstream: RefCell<Vec<Subscription>>,
    computing: Cell<bool>,
}

/// Clears the re-entrancy flag even if the forward function unwinds.
struct ComputeGuard<'a>(&'a Cell<bool>);

impl Drop for ComputeGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Undoes a half-finished connect when the first evaluation unwinds.
struct ConnectGuard<'a, W: Clone + 'static>(&'a LinkState<W>);

impl<W: Clone + 'static> Drop for ConnectGuard<'_, W> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.disconnect();
        }
    }
}

impl<W: Clone + 'static> LinkState<W> {
    fn evaluate(&self) -> W {
        if self.computing.replace(true) {
            panic!("{}", ReactiveError::Cycle);
        }
        let _guard = ComputeGuard(&self.computing);
        (self.compute)()
    }

    fn is_live(&self) -> bool {
        self.cache.borrow().is_some()
    }

    fn source_versions(&self) -> Vec<u64> {
        self.connectors
            .iter()
            .map(|connector| (connector.version)())
            .collect()
    }

    fn connect(self: &Rc<Self>) {
        tracing::trace!(sources = self.connectors.len(), "derived value going live");
        let weak: Weak<Self> = Rc::downgrade(self);
        let on_change: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(state) = weak.upgrade() {
                state.refresh();
            }
        });
        let upstream: Vec<Subscription> = self
            .connectors
            .iter()
            .map(|connector| (connector.watch)(Rc::clone(&on_change)))
            .collect();
        *self.upstream.borrow_mut() = upstream;
        let value = self.evaluate();
        *self.seen.borrow_mut() = self.source_versions();
        *self.cache.borrow_mut() = Some(value);
    }

    fn disconnect(&self) {
        tracing::trace!("derived value going idle");
        self.cache.borrow_mut().take();
        self.undelivered.borrow_mut().take();
        self.seen.borrow_mut().clear();
        let upstream = std::mem::take(&mut *self.upstream.borrow_mut());
        drop(upstream);
    }

    /// Bring a live cache up to date with its sources. Records the change for
    /// the next delivery instead of notifying.
    fn update(&self) {
        if !self.is_live() {
            return;
        }
        let current = self.source_versions();
        if *self.seen.borrow() == current {
            return;
        }
        let new = self.evaluate();
        let seen = self.source_versions();
        let old = {
            let mut cache = self.cache.borrow_mut();
            let Some(cached) = cache.as_mut() else {
                return;
            };
            if self.equality.borrow().eq(cached, &new) {
                *self.seen.borrow_mut() = seen;
                return;
            }
            std::mem::replace(cached, new)
        };
        *self.seen.borrow_mut() = seen;
        self.version.set(self.version.get() + 1);
        let mut undelivered = self.undelivered.borrow_mut();
        if undelivered.is_none() {
            *undelivered = Some(old);
        }
    }

    /// Recompute after a source change and notify if the value changed.
    fn refresh(&self) {
        self.update();
        let Some(old) = self.undelivered.borrow_mut().take() else {
            return;
        };
        let Some(new) = self.cache.borrow().clone() else {
            return;
        };
        if self.equality.borrow().eq(&old, &new) {
            return;
        }
        let version = self.version.get();
        let listeners = self.listeners.borrow().snapshot();
        deliver(&listeners, &new, &old, || self.version.get() == version);
    }
}

// ---------------------------------------------------------------------------
// Derived
// ---------------------------------------------------------------------------

/// A derived value (transform link) over one or more sources.
///
/// Cloning yields another handle to the same node.
pub struct Derived<W> {
    state: Rc<LinkState<W>>,
}

impl<W> Clone for Derived<W> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<W: fmt::Debug> fmt::Debug for Derived<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("cache", &*self.state.cache.borrow())
            .field("sources", &self.state.connectors.len())
            .field("listeners", &self.state.listeners.borrow().len())
            .field("writable", &self.state.inverse.is_some())
            .finish()
    }
}

/// Erase a source into a connector.
pub(crate) fn connector<T, S: Source<T>>(source: &S) -> Connector {
    let watched = source.clone();
    let versioned = source.clone();
    Connector {
        watch: Box::new(move |on_change: Rc<dyn Fn()>| watched.watch(on_change)),
        version: Box::new(move || versioned.version()),
    }
}

impl<W: Clone + PartialEq + 'static> Derived<W> {
    /// Assemble a link from erased parts. All public constructors end here.
    pub(crate) fn from_parts(
        connectors: Vec<Connector>,
        compute: Compute<W>,
        inverse: Option<Inverse<W>>,
    ) -> Self {
        Self {
            state: Rc::new(LinkState {
                compute,
                inverse,
                connectors,
                equality: RefCell::new(Equality::partial_eq()),
                cache: RefCell::new(None),
                seen: RefCell::new(Vec::new()),
                undelivered: RefCell::new(None),
                version: Cell::new(0),
                listeners: RefCell::new(ListenerSet::new()),
                upstream: RefCell::new(Vec::new()),
                computing: Cell::new(false),
            }),
        }
    }

    /// Read-only link `f(source)`.
    pub fn map<V, S>(source: S, f: impl Fn(&V) -> W + 'static) -> Self
    where
        V: Clone + 'static,
        S: Source<V>,
    {
        let connectors = vec![connector(&source)];
        Self::from_parts(connectors, Box::new(move || f(&source.get())), None)
    }

    /// Read-only link over two sources.
    pub fn map2<A, B, SA, SB>(a: SA, b: SB, f: impl Fn(&A, &B) -> W + 'static) -> Self
    where
        A: Clone + 'static,
        B: Clone + 'static,
        SA: Source<A>,
        SB: Source<B>,
    {
        let connectors = vec![connector(&a), connector(&b)];
        Self::from_parts(
            connectors,
            Box::new(move || f(&a.get(), &b.get())),
            None,
        )
    }

    /// Writable link with a pure inverse: writes store `backward(w)` in the
    /// source.
    pub fn bimap<V, S>(
        source: S,
        forward: impl Fn(&V) -> W + 'static,
        backward: impl Fn(W) -> V + 'static,
    ) -> Self
    where
        V: Clone + 'static,
        S: Sink<V>,
    {
        Self::reversible(source, forward, move |_, w| Ok(backward(w)))
    }

    /// Writable link whose inverse sees the source's current value and may
    /// reject the write.
    pub fn reversible<V, S>(
        source: S,
        forward: impl Fn(&V) -> W + 'static,
        backward: impl Fn(&V, W) -> Result<V, ReactiveError> + 'static,
    ) -> Self
    where
        V: Clone + 'static,
        S: Sink<V>,
    {
        let connectors = vec![connector(&source)];
        let reader = source.clone();
        let compute: Compute<W> = Box::new(move || forward(&reader.get()));
        let inverse: Inverse<W> = Box::new(move |w: W| {
            let merged = backward(&source.get(), w)?;
            source.try_set(merged)
        });
        Self::from_parts(connectors, compute, Some(inverse))
    }
}

impl Derived<bool> {
    /// `true` iff the source equals `reference` (by `PartialEq`). Read-only.
    pub fn equals<V, S>(source: S, reference: V) -> Self
    where
        V: Clone + PartialEq + 'static,
        S: Source<V>,
    {
        Self::equals_by(source, reference, Equality::partial_eq())
    }

    /// `true` iff the source equals `reference` under `equality`, typically
    /// the same policy the source cell was built with. Read-only.
    pub fn equals_by<V, S>(source: S, reference: V, equality: Equality<V>) -> Self
    where
        V: Clone + 'static,
        S: Source<V>,
    {
        Self::map(source, move |value: &V| equality.eq(value, &reference))
    }
}

impl<W: Clone + 'static> Derived<W> {
    /// Replace the change-detection policy (`PartialEq` by default) used to
    /// decide whether a recomputation notifies listeners.
    pub fn with_equality(self, equality: Equality<W>) -> Self {
        *self.state.equality.borrow_mut() = equality;
        self
    }

    /// Current value: the cache while live, a fresh computation otherwise.
    pub fn get(&self) -> W {
        self.state.update();
        let cached = self.state.cache.borrow().clone();
        match cached {
            Some(value) => value,
            None => self.state.evaluate(),
        }
    }

    /// Register a `(new, old)` listener; the first one makes the link live.
    ///
    /// If going live panics (a dependency cycle), the link is left idle and
    /// the listener is not registered.
    pub fn subscribe(&self, listener: impl Fn(&W, &W) + 'static) -> Subscription {
        if self.state.listeners.borrow().is_empty() {
            let _rollback = ConnectGuard(&*self.state);
            LinkState::connect(&self.state);
        }
        let id = self.state.listeners.borrow_mut().insert(Rc::new(listener));
        let weak: Weak<LinkState<W>> = Rc::downgrade(&self.state);
        Subscription::new(move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let idle = {
                let mut listeners = state.listeners.borrow_mut();
                listeners.remove(id) && listeners.is_empty()
            };
            if idle {
                state.disconnect();
            }
        })
    }

    /// Number of active listeners.
    pub fn listener_count(&self) -> usize {
        self.state.listeners.borrow().len()
    }

    /// Whether the link currently tracks its sources.
    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }

    /// Change counter. While live it counts cache changes; while idle it
    /// follows the sources.
    pub fn version(&self) -> u64 {
        if self.state.is_live() {
            self.state.update();
            self.state.version.get()
        } else {
            self.state
                .source_versions()
                .into_iter()
                .fold(0, u64::wrapping_add)
        }
    }

    /// Whether the link was built with an inverse.
    pub fn is_writable(&self) -> bool {
        self.state.inverse.is_some()
    }

    /// Write through the inverse.
    pub fn try_set(&self, value: W) -> Result<(), ReactiveError> {
        match &self.state.inverse {
            Some(inverse) => inverse(value),
            None => Err(ReactiveError::ReadOnly),
        }
    }
}

impl<W: Clone + 'static> Source<W> for Derived<W> {
    fn get(&self) -> W {
        Derived::get(self)
    }

    fn subscribe(&self, listener: impl Fn(&W, &W) + 'static) -> Subscription {
        Derived::subscribe(self, listener)
    }

    fn listener_count(&self) -> usize {
        Derived::listener_count(self)
    }

    fn is_live(&self) -> bool {
        Derived::is_live(self)
    }

    fn version(&self) -> u64 {
        Derived::version(self)
    }
}

impl<W: Clone + 'static> Sink<W> for Derived<W> {
    fn try_set(&self, value: W) -> Result<(), ReactiveError> {
        Derived::try_set(self, value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
