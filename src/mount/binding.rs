//! Bindings: reactive expressions attached to element sites.
//!
//! A [`BindingSpec`] is built by rendering code at node-construction time
//! and handed to [`AttachmentTracker::attach`](super::AttachmentTracker::attach).
//! The tracker wraps it in a [`Binding`], which stays inactive (holding no
//! subscription) until the node is connected.

use std::fmt::{self, Display};
use std::rc::Rc;

use crate::dom::{Document, Event, NodeId, PropValue};
use crate::reactive::{Sink, Source, Subscription};

type Connector = Box<dyn Fn(&Document, NodeId, bool) -> Subscription>;

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

/// Where on the element a binding writes (or listens).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Site {
    /// Text content.
    Text,
    /// A markup attribute.
    Attribute(String),
    /// A live property.
    Property(String),
    /// An event handler for the given event kind.
    Handler(String),
    /// Two-way property: written from the source, read back from events.
    Model(String),
}

// ---------------------------------------------------------------------------
// AttrValue
// ---------------------------------------------------------------------------

/// Values that can drive an attribute. `None` removes the attribute.
pub trait AttrValue {
    fn to_attribute(&self) -> Option<String>;
}

impl AttrValue for String {
    fn to_attribute(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl AttrValue for &'static str {
    fn to_attribute(&self) -> Option<String> {
        Some((*self).to_owned())
    }
}

/// Boolean attributes: present (empty) when `true`, absent when `false`.
impl AttrValue for bool {
    fn to_attribute(&self) -> Option<String> {
        self.then(String::new)
    }
}

impl<T: AttrValue> AttrValue for Option<T> {
    fn to_attribute(&self) -> Option<String> {
        self.as_ref().and_then(AttrValue::to_attribute)
    }
}

macro_rules! display_attr {
    ($($ty:ty),*) => {
        $(impl AttrValue for $ty {
            fn to_attribute(&self) -> Option<String> {
                Some(self.to_string())
            }
        })*
    };
}

display_attr!(i32, i64, u32, u64, usize);

// ---------------------------------------------------------------------------
// BindingSpec
// ---------------------------------------------------------------------------

/// A reactive expression paired with the site it drives.
pub struct BindingSpec {
    site: Site,
    connect: Connector,
}

impl fmt::Debug for BindingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSpec")
            .field("site", &self.site)
            .finish_non_exhaustive()
    }
}

impl BindingSpec {
    /// Drive the text content with `source`'s `Display` output.
    pub fn text<T, S>(source: S) -> Self
    where
        T: Display + Clone + 'static,
        S: Source<T>,
    {
        Self::write_site(Site::Text, source, |doc, node, value: &T| {
            doc.set_text(node, value.to_string());
        })
    }

    /// Drive attribute `name`.
    pub fn attribute<T, S>(name: impl Into<String>, source: S) -> Self
    where
        T: AttrValue + Clone + 'static,
        S: Source<T>,
    {
        let name = name.into();
        let attr = name.clone();
        Self::write_site(Site::Attribute(name), source, move |doc, node, value: &T| {
            doc.set_attribute(node, &attr, value.to_attribute());
        })
    }

    /// Drive property `name`.
    pub fn property<T, S>(name: impl Into<String>, source: S) -> Self
    where
        T: Into<PropValue> + Clone + 'static,
        S: Source<T>,
    {
        let name = name.into();
        let prop = name.clone();
        Self::write_site(Site::Property(name), source, move |doc, node, value: &T| {
            doc.set_property(node, &prop, value.clone().into());
        })
    }

    /// Listen for `kind` events while the node is connected.
    pub fn on(kind: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Self {
        let kind = kind.into();
        let handler: Rc<dyn Fn(&Event)> = Rc::new(handler);
        Self {
            site: Site::Handler(kind.clone()),
            connect: Box::new(move |doc: &Document, node: NodeId, _apply: bool| {
                handler_subscription(doc, node, &kind, Rc::clone(&handler))
            }),
        }
    }

    /// Two-way `checked` property: follows `target`, and `change` events
    /// carrying a boolean write back into it.
    ///
    /// # Panics
    ///
    /// The write-back panics like [`Sink::set`] if `target` rejects it.
    pub fn model_checked<S: Sink<bool>>(target: S) -> Self {
        Self::model("checked", "change", target, |value| value.as_bool())
    }

    /// Two-way `value` property: follows `target`, and `input` events
    /// carrying text write back into it.
    ///
    /// # Panics
    ///
    /// The write-back panics like [`Sink::set`] if `target` rejects it.
    pub fn model_value<S: Sink<String>>(target: S) -> Self {
        Self::model("value", "input", target, |value| {
            value.as_text().map(str::to_owned)
        })
    }

    /// The site this spec drives.
    pub fn site(&self) -> &Site {
        &self.site
    }

    fn model<T, S>(
        prop: &'static str,
        event: &'static str,
        target: S,
        extract: fn(&PropValue) -> Option<T>,
    ) -> Self
    where
        T: Into<PropValue> + Clone + 'static,
        S: Sink<T>,
    {
        let property = Self::property(prop, target.clone());
        let handler: Rc<dyn Fn(&Event)> = Rc::new(move |e: &Event| {
            if let Some(value) = e.value.as_ref().and_then(extract) {
                target.set(value);
            }
        });
        Self {
            site: Site::Model(prop.to_owned()),
            connect: Box::new(move |doc: &Document, node: NodeId, apply_now: bool| {
                let write = (property.connect)(doc, node, apply_now);
                let read = handler_subscription(doc, node, event, Rc::clone(&handler));
                Subscription::all(vec![write, read])
            }),
        }
    }

    fn write_site<T, S>(
        site: Site,
        source: S,
        write: impl Fn(&Document, NodeId, &T) + 'static,
    ) -> Self
    where
        T: Clone + 'static,
        S: Source<T>,
    {
        let write = Rc::new(write);
        Self {
            site,
            connect: Box::new(move |doc: &Document, node: NodeId, apply_now: bool| {
                let weak = doc.downgrade();
                let on_change = Rc::clone(&write);
                let subscription = source.subscribe(move |new: &T, _| {
                    if let Some(doc) = weak.upgrade() {
                        on_change(&doc, node, new);
                    }
                });
                if apply_now {
                    write(doc, node, &source.get());
                }
                subscription
            }),
        }
    }
}

fn handler_subscription(
    doc: &Document,
    node: NodeId,
    kind: &str,
    handler: Rc<dyn Fn(&Event)>,
) -> Subscription {
    let Some(id) = doc.add_handler(node, kind, move |e: &Event| handler(e)) else {
        return Subscription::empty();
    };
    let weak = doc.downgrade();
    Subscription::new(move || {
        if let Some(doc) = weak.upgrade() {
            doc.remove_handler(node, id);
        }
    })
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Activation state of a [`Binding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Inactive,
    Active,
}

/// A [`BindingSpec`] owned by a node, plus its activation state.
pub struct Binding {
    spec: BindingSpec,
    subscription: Option<Subscription>,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("site", &self.spec.site)
            .field("state", &self.state())
            .finish()
    }
}

impl Binding {
    /// Wrap a spec; starts inactive.
    pub fn new(spec: BindingSpec) -> Self {
        Self {
            spec,
            subscription: None,
        }
    }

    /// The site this binding drives.
    pub fn site(&self) -> &Site {
        &self.spec.site
    }

    /// Current activation state.
    pub fn state(&self) -> BindingState {
        match self.subscription {
            Some(_) => BindingState::Active,
            None => BindingState::Inactive,
        }
    }

    /// Whether the binding holds a subscription.
    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Subscribe the expression and, if `apply_now`, write its current value.
    ///
    /// Returns `false` (doing nothing) if already active.
    pub fn activate(&mut self, doc: &Document, node: NodeId, apply_now: bool) -> bool {
        if self.subscription.is_some() {
            return false;
        }
        tracing::debug!(?node, site = ?self.spec.site, "activating binding");
        self.subscription = Some((self.spec.connect)(doc, node, apply_now));
        true
    }

    /// Dispose the subscription. Returns `false` if already inactive.
    pub fn deactivate(&mut self) -> bool {
        let Some(mut subscription) = self.subscription.take() else {
            return false;
        };
        tracing::debug!(site = ?self.spec.site, "deactivating binding");
        subscription.dispose();
        true
    }
}
