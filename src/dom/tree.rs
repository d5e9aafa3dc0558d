//! Tree operations: create, insert, detach, destroy, walk.

use std::collections::VecDeque;

use slotmap::{SecondaryMap, SlotMap};
use tokio::sync::mpsc::UnboundedSender;

use super::event::{EventCallback, Handler, HandlerId};
use super::mutation::MutationRecord;
use super::node::{NodeData, NodeId};

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// Invalid structural operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("unknown node")]
    UnknownNode,
    #[error("cannot insert a node into its own subtree")]
    Hierarchy,
    #[error("reference node is not a child of the parent")]
    NotAChild,
    #[error("the document root cannot be moved or destroyed")]
    Root,
}

/// The element tree, backed by a slotmap arena.
///
/// The root is created with the tree and is always connected. Every other
/// node starts detached and is connected exactly when its ancestor chain
/// reaches the root. Child-list changes under a connected parent are reported
/// to the observer channel, if one is registered.
pub struct Dom {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    handlers: SecondaryMap<NodeId, Vec<Handler>>,
    next_handler: u64,
    root: NodeId,
    observer: Option<UnboundedSender<MutationRecord>>,
}

impl Dom {
    /// Create a tree holding only a `body` root.
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(NodeData::new("body"));
        let mut children = SecondaryMap::new();
        children.insert(root, Vec::new());
        Self {
            nodes,
            children,
            parent: SecondaryMap::new(),
            handlers: SecondaryMap::new(),
            next_handler: 0,
            root,
            observer: None,
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        id
    }

    /// Append `child` as the last child of `parent`, moving it if it already
    /// has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_at(parent, child, None)
    }

    /// Insert `child` under `parent` just before `reference`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        self.insert_at(parent, child, Some(reference))
    }

    fn insert_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return Err(DomError::UnknownNode);
        }
        if child == self.root {
            return Err(DomError::Root);
        }
        if child == parent || self.ancestors(parent).contains(&child) {
            return Err(DomError::Hierarchy);
        }
        if let Some(reference) = reference {
            if reference == child || self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild);
            }
        }

        self.detach(child)?;

        let Some(siblings) = self.children.get_mut(parent) else {
            return Err(DomError::UnknownNode);
        };
        let position = reference
            .and_then(|r| siblings.iter().position(|&c| c == r))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        self.parent.insert(child, parent);

        if self.is_connected(parent) {
            self.emit(MutationRecord::Added {
                parent,
                node: child,
            });
        }
        Ok(())
    }

    /// Detach `node` (with its subtree) from its parent.
    ///
    /// Returns `Ok(false)` if it had no parent.
    pub fn detach(&mut self, node: NodeId) -> Result<bool, DomError> {
        if !self.nodes.contains_key(node) {
            return Err(DomError::UnknownNode);
        }
        let Some(parent) = self.parent.remove(node) else {
            return Ok(false);
        };
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.retain(|&child| child != node);
        }
        if self.is_connected(parent) {
            self.emit(MutationRecord::Removed { parent, node });
        }
        Ok(true)
    }

    /// Detach `id` and free it together with all its descendants.
    ///
    /// Returns the `NodeData` for the removed node.
    pub fn destroy(&mut self, id: NodeId) -> Result<NodeData, DomError> {
        if id == self.root {
            return Err(DomError::Root);
        }
        self.detach(id)?;

        // Collect all descendants (BFS) to remove them.
        let mut to_remove = VecDeque::new();
        to_remove.push_back(id);
        let mut removed_root_data = None;

        while let Some(current) = to_remove.pop_front() {
            if let Some(kids) = self.children.remove(current) {
                to_remove.extend(kids);
            }
            self.parent.remove(current);
            self.handlers.remove(current);
            let data = self.nodes.remove(current);
            if current == id {
                removed_root_data = data;
            }
        }

        removed_root_data.ok_or(DomError::UnknownNode)
    }

    /// Whether `id` is the root or has the root among its ancestors.
    pub fn is_connected(&self, id: NodeId) -> bool {
        if !self.nodes.contains_key(id) {
            return false;
        }
        id == self.root || self.ancestors(id).last() == Some(&self.root)
    }

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no children
    /// or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Walk from `id` up to the top of its tree, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself; it starts with the
    /// immediate parent.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// Number of live nodes, the root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Whether the tree contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            let kids = self.children(current);
            for &child in kids.iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    // -- handlers -----------------------------------------------------------

    /// Register an event handler on `node`.
    pub fn add_handler(
        &mut self,
        node: NodeId,
        kind: impl Into<String>,
        callback: EventCallback,
    ) -> Option<HandlerId> {
        if !self.nodes.contains_key(node) {
            return None;
        }
        let id = HandlerId(self.next_handler);
        self.next_handler += 1;
        self.handlers.entry(node)?.or_default().push(Handler {
            id,
            kind: kind.into(),
            callback,
        });
        Some(id)
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn remove_handler(&mut self, node: NodeId, id: HandlerId) -> bool {
        let Some(handlers) = self.handlers.get_mut(node) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|h| h.id != id);
        handlers.len() != before
    }

    /// Snapshot of the callbacks registered on `node` for `kind`.
    pub fn handlers_for(&self, node: NodeId, kind: &str) -> Vec<EventCallback> {
        self.handlers
            .get(node)
            .map(|handlers| {
                handlers
                    .iter()
                    .filter(|h| h.kind == kind)
                    .map(|h| h.callback.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    // -- observer -----------------------------------------------------------

    /// Register (or clear) the channel that receives mutation records.
    pub fn set_observer(&mut self, observer: Option<UnboundedSender<MutationRecord>>) {
        self.observer = observer;
    }

    /// Whether a mutation observer is registered.
    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    fn emit(&mut self, record: MutationRecord) {
        let Some(observer) = &self.observer else {
            return;
        };
        if observer.send(record).is_err() {
            tracing::debug!("mutation observer went away; dropping registration");
            self.observer = None;
        }
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}
