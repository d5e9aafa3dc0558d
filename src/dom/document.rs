//! `Document`: shared handle over the element tree.
//!
//! Rendering code, bindings, and the attachment tracker all hold clones of
//! the same `Document`. Every method borrows the tree only for its own
//! duration and never while user callbacks run, so handlers and listeners
//! are free to call back into the document. The one exception is
//! [`Document::with`], whose closure runs under a read borrow.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use super::event::{Event, HandlerId};
use super::mutation::MutationRecord;
use super::node::{NodeData, NodeId, PropValue};
use super::tree::{Dom, DomError};

/// Shared handle to an element tree. Clones refer to the same tree.
#[derive(Clone, Default)]
pub struct Document {
    dom: Rc<RefCell<Dom>>,
}

/// Non-owning handle to a [`Document`].
#[derive(Clone, Default)]
pub struct WeakDocument {
    dom: Weak<RefCell<Dom>>,
}

impl WeakDocument {
    /// The document, if it is still alive.
    pub fn upgrade(&self) -> Option<Document> {
        self.dom.upgrade().map(|dom| Document { dom })
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dom = self.dom.borrow();
        f.debug_struct("Document")
            .field("nodes", &dom.len())
            .field("observed", &dom.has_observer())
            .finish()
    }
}

impl fmt::Debug for WeakDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakDocument").finish_non_exhaustive()
    }
}

impl Document {
    /// A document holding only its root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-owning handle, for callbacks stored inside the graph.
    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            dom: Rc::downgrade(&self.dom),
        }
    }

    /// Read access to the underlying tree.
    ///
    /// # Panics
    ///
    /// The tree stays borrowed while `f` runs. Mutating the document from
    /// inside `f`, including indirectly by writing a cell that drives a
    /// binding, panics.
    pub fn with<R>(&self, f: impl FnOnce(&Dom) -> R) -> R {
        f(&self.dom.borrow())
    }

    // -- structure ----------------------------------------------------------

    /// The root node (always connected).
    pub fn root(&self) -> NodeId {
        self.dom.borrow().root()
    }

    /// Create a detached element with the given tag.
    pub fn create_element(&self, tag: impl Into<String>) -> NodeId {
        self.create(NodeData::new(tag))
    }

    /// Create a detached element from prepared data.
    pub fn create(&self, data: NodeData) -> NodeId {
        self.dom.borrow_mut().create(data)
    }

    /// See [`Dom::append_child`].
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.dom.borrow_mut().append_child(parent, child)
    }

    /// See [`Dom::insert_before`].
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        self.dom.borrow_mut().insert_before(parent, child, reference)
    }

    /// See [`Dom::detach`].
    pub fn detach(&self, node: NodeId) -> Result<bool, DomError> {
        self.dom.borrow_mut().detach(node)
    }

    /// See [`Dom::destroy`].
    pub fn destroy(&self, node: NodeId) -> Result<NodeData, DomError> {
        self.dom.borrow_mut().destroy(node)
    }

    /// Whether `node` is reachable from the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.dom.borrow().is_connected(node)
    }

    /// Whether `node` still exists.
    pub fn contains(&self, node: NodeId) -> bool {
        self.dom.borrow().contains(node)
    }

    /// Parent of `node`.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.dom.borrow().parent(node)
    }

    /// Children of `node`, in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.dom.borrow().children(node).to_vec()
    }

    /// `node` and its descendants in pre-order.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        self.dom.borrow().walk_depth_first(node)
    }

    // -- sites --------------------------------------------------------------

    /// Tag of `node`.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.dom.borrow().get(node).map(|data| data.tag.clone())
    }

    /// Text content of `node`.
    pub fn text(&self, node: NodeId) -> Option<String> {
        self.dom.borrow().get(node).and_then(|data| data.text.clone())
    }

    /// Attribute of `node`.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.dom
            .borrow()
            .get(node)
            .and_then(|data| data.attribute(name).map(str::to_owned))
    }

    /// Property of `node`.
    pub fn property(&self, node: NodeId, name: &str) -> Option<PropValue> {
        self.dom
            .borrow()
            .get(node)
            .and_then(|data| data.property(name).cloned())
    }

    /// Replace the text content. Returns `false` if the node is gone.
    pub fn set_text(&self, node: NodeId, text: impl Into<String>) -> bool {
        self.update(node, |data| data.text = Some(text.into()))
    }

    /// Set or remove an attribute. Returns `false` if the node is gone.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: Option<String>) -> bool {
        self.update(node, |data| data.set_attribute(name, value))
    }

    /// Set a property. Returns `false` if the node is gone.
    pub fn set_property(&self, node: NodeId, name: &str, value: PropValue) -> bool {
        self.update(node, |data| data.set_property(name, value))
    }

    fn update(&self, node: NodeId, f: impl FnOnce(&mut NodeData)) -> bool {
        match self.dom.borrow_mut().get_mut(node) {
            Some(data) => {
                f(data);
                true
            }
            None => false,
        }
    }

    // -- events -------------------------------------------------------------

    /// Register a handler for `kind` events on `node`.
    pub fn add_handler(
        &self,
        node: NodeId,
        kind: impl Into<String>,
        handler: impl Fn(&Event) + 'static,
    ) -> Option<HandlerId> {
        self.dom
            .borrow_mut()
            .add_handler(node, kind, Rc::new(handler))
    }

    /// Remove a handler registration.
    pub fn remove_handler(&self, node: NodeId, id: HandlerId) -> bool {
        self.dom.borrow_mut().remove_handler(node, id)
    }

    /// Deliver `event` to the handlers registered on `node` for its kind.
    ///
    /// Handlers are snapshotted first; registrations made or removed by a
    /// handler take effect for the next dispatch. Returns how many ran.
    pub fn dispatch(&self, node: NodeId, event: &Event) -> usize {
        let handlers = self.dom.borrow().handlers_for(node, &event.kind);
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    // -- observation --------------------------------------------------------

    /// Start reporting structural changes; replaces any earlier observer.
    pub fn observe(&self) -> UnboundedReceiver<MutationRecord> {
        let (tx, rx) = unbounded_channel();
        self.dom.borrow_mut().set_observer(Some(tx));
        rx
    }

    /// Stop reporting structural changes. The receiver sees the end of the
    /// stream once buffered records are drained.
    pub fn disconnect_observer(&self) {
        self.dom.borrow_mut().set_observer(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn clones_share_tree() {
        let doc = Document::new();
        let other = doc.clone();
        let li = doc.create_element("li");
        other.append_child(other.root(), li).unwrap();
        assert!(doc.is_connected(li));
        assert_eq!(doc.children(doc.root()), vec![li]);
    }

    #[test]
    fn with_reads_the_tree() {
        let doc = Document::new();
        let ul = doc.create_element("ul");
        let li = doc.create_element("li");
        doc.append_child(ul, li).unwrap();
        doc.append_child(doc.root(), ul).unwrap();
        let walked = doc.with(|dom| dom.walk_depth_first(ul));
        assert_eq!(walked, vec![ul, li]);
    }

    #[test]
    #[should_panic]
    fn with_rejects_mutation_from_inside() {
        let doc = Document::new();
        let li = doc.create_element("li");
        doc.with(|_| doc.set_text(li, "nested"));
    }

    #[test]
    fn site_writes() {
        let doc = Document::new();
        let input = doc.create_element("input");
        assert!(doc.set_text(input, "hello"));
        assert!(doc.set_attribute(input, "class", Some("edit".into())));
        assert!(doc.set_property(input, "checked", true.into()));
        assert_eq!(doc.text(input).as_deref(), Some("hello"));
        assert_eq!(doc.attribute(input, "class").as_deref(), Some("edit"));
        assert_eq!(doc.property(input, "checked"), Some(PropValue::Bool(true)));
        assert_eq!(doc.tag(input).as_deref(), Some("input"));
    }

    #[test]
    fn writes_to_destroyed_nodes_are_ignored() {
        let doc = Document::new();
        let li = doc.create_element("li");
        doc.destroy(li).unwrap();
        assert!(!doc.set_text(li, "gone"));
        assert_eq!(doc.text(li), None);
    }

    #[test]
    fn dispatch_runs_matching_handlers() {
        let doc = Document::new();
        let button = doc.create_element("button");
        let clicks = Rc::new(Cell::new(0));
        let clicks_c = Rc::clone(&clicks);
        doc.add_handler(button, "click", move |_| clicks_c.set(clicks_c.get() + 1));
        assert_eq!(doc.dispatch(button, &Event::new("click")), 1);
        assert_eq!(doc.dispatch(button, &Event::new("dblclick")), 0);
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn handler_may_mutate_document() {
        let doc = Document::new();
        let button = doc.create_element("button");
        doc.append_child(doc.root(), button).unwrap();
        let weak = doc.downgrade();
        doc.add_handler(button, "click", move |_| {
            if let Some(doc) = weak.upgrade() {
                doc.destroy(button).unwrap();
            }
        });
        doc.dispatch(button, &Event::new("click"));
        assert!(!doc.contains(button));
    }

    #[test]
    fn observe_and_disconnect() {
        let doc = Document::new();
        let mut rx = doc.observe();
        let li = doc.create_element("li");
        doc.append_child(doc.root(), li).unwrap();
        doc.disconnect_observer();
        assert_eq!(
            rx.try_recv().unwrap(),
            MutationRecord::Added {
                parent: doc.root(),
                node: li
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
