//! Attachment lifecycle: activate bindings while their node is connected.
//!
//! The [`AttachmentTracker`] owns every [`Binding`], keyed by node. It
//! observes the document's structural mutations through a channel and, when
//! it processes them, activates the bindings of inserted subtrees and
//! deactivates those of removed subtrees. Deactivation disposes the binding's
//! subscription, which lets derived values upstream go idle; without it a
//! binding would keep its listeners alive after its node left the tree.
//!
//! Records are only seen when the tracker drains the channel ([`flush`] or
//! [`run`]), so activation always lags the structural change by one turn.
//! Each record is judged against the tree as it is at processing time:
//! `Added` activates only if the node is still connected, `Removed`
//! deactivates only if it is still disconnected. Together with idempotent
//! activation, a remove + reinsert (or insert + remove) landing in the same
//! batch nets to no change, while the same pair split across two batches
//! yields one clean deactivate + reactivate.
//!
//! [`flush`]: AttachmentTracker::flush
//! [`run`]: AttachmentTracker::run

use slotmap::SecondaryMap;
use tokio::sync::mpsc::UnboundedReceiver;

use super::binding::{Binding, BindingSpec, BindingState, Site};
use crate::dom::{Document, MutationRecord, NodeId};

// ---------------------------------------------------------------------------
// ActivationEvent
// ---------------------------------------------------------------------------

/// Binding transitions recorded by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationEvent {
    /// A binding subscribed because its node became connected.
    Activated { node_id: NodeId, site: Site },
    /// A binding unsubscribed because its node left the tree (or was
    /// destroyed, or the tracker stopped).
    Deactivated { node_id: NodeId, site: Site },
}

// ---------------------------------------------------------------------------
// TrackerConfig
// ---------------------------------------------------------------------------

/// Configuration for an [`AttachmentTracker`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Write the current value to the site when a binding activates
    /// (call-on-subscribe). Otherwise the site is first written on the next
    /// change.
    pub apply_on_activate: bool,
    /// Deactivate every binding when the tracker stops.
    pub deactivate_on_stop: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            apply_on_activate: true,
            deactivate_on_stop: true,
        }
    }
}

impl TrackerConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the call-on-subscribe policy (builder).
    pub fn with_apply_on_activate(mut self, apply: bool) -> Self {
        self.apply_on_activate = apply;
        self
    }

    /// Set whether `stop()` deactivates bindings (builder).
    pub fn with_deactivate_on_stop(mut self, deactivate: bool) -> Self {
        self.deactivate_on_stop = deactivate;
        self
    }
}

// ---------------------------------------------------------------------------
// AttachmentTracker
// ---------------------------------------------------------------------------

/// Activates and deactivates bindings as their nodes enter and leave the
/// connected tree.
///
/// Construct one per document at application entry, [`start`] it, and call
/// [`flush`] once per turn (or drive [`run`]).
///
/// [`start`]: AttachmentTracker::start
/// [`flush`]: AttachmentTracker::flush
/// [`run`]: AttachmentTracker::run
#[derive(Debug)]
pub struct AttachmentTracker {
    config: TrackerConfig,
    document: Option<Document>,
    records: Option<UnboundedReceiver<MutationRecord>>,
    bindings: SecondaryMap<NodeId, Vec<Binding>>,
    /// Nodes given bindings while already connected.
    pending: Vec<NodeId>,
    events: Vec<ActivationEvent>,
}

impl AttachmentTracker {
    /// Create a stopped tracker.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            document: None,
            records: None,
            bindings: SecondaryMap::new(),
            pending: Vec::new(),
            events: Vec::new(),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Begin observing `document`. Restarts if already started.
    ///
    /// Bindings on nodes that are already connected activate on the next
    /// [`flush`](Self::flush).
    pub fn start(&mut self, document: &Document) {
        if self.is_started() {
            self.stop();
        }
        tracing::debug!(bindings = self.binding_count(), "attachment tracker starting");
        self.records = Some(document.observe());
        self.document = Some(document.clone());
        self.pending = self.bindings.keys().collect();
    }

    /// Stop observing. With `deactivate_on_stop`, every active binding is
    /// deactivated. Calling this when stopped is a no-op.
    pub fn stop(&mut self) {
        let Some(document) = self.document.take() else {
            return;
        };
        tracing::debug!("attachment tracker stopping");
        document.disconnect_observer();
        self.records = None;
        self.pending.clear();
        if self.config.deactivate_on_stop {
            let nodes: Vec<NodeId> = self.bindings.keys().collect();
            for node in nodes {
                self.deactivate_node(node);
            }
        }
    }

    /// Whether the tracker is observing a document.
    pub fn is_started(&self) -> bool {
        self.document.is_some()
    }

    /// Associate a binding with `node`. Call at node-construction time,
    /// before the node is inserted.
    pub fn attach(&mut self, node: NodeId, spec: BindingSpec) {
        let Some(entry) = self.bindings.entry(node) else {
            tracing::warn!(?node, "ignoring binding for a stale node id");
            return;
        };
        entry.or_default().push(Binding::new(spec));
        if let Some(document) = &self.document {
            if document.is_connected(node) {
                self.pending.push(node);
            }
        }
    }

    /// Deactivate and drop every binding of `node`. Returns how many.
    pub fn release(&mut self, node: NodeId) -> usize {
        self.deactivate_node(node);
        self.bindings.remove(node).map_or(0, |bindings| bindings.len())
    }

    /// Process every mutation record delivered so far. Returns how many.
    pub fn flush(&mut self) -> usize {
        let mut batch = Vec::new();
        if let Some(records) = self.records.as_mut() {
            while let Ok(record) = records.try_recv() {
                batch.push(record);
            }
        }
        let count = batch.len();
        self.process(batch);
        count
    }

    /// Process batches as they arrive until the document stops reporting
    /// (its observer is disconnected or replaced, or it is dropped).
    ///
    /// Each wake-up drains every record already queued and handles them as
    /// one batch. Returns immediately if the tracker is not started.
    pub async fn run(&mut self) {
        loop {
            let batch = {
                let Some(records) = self.records.as_mut() else {
                    return;
                };
                let Some(first) = records.recv().await else {
                    self.records = None;
                    return;
                };
                let mut batch = vec![first];
                while let Ok(record) = records.try_recv() {
                    batch.push(record);
                }
                batch
            };
            self.process(batch);
        }
    }

    fn process(&mut self, batch: Vec<MutationRecord>) {
        let Some(document) = self.document.clone() else {
            return;
        };
        if !batch.is_empty() {
            tracing::debug!(records = batch.len(), "processing mutation batch");
        }
        for record in batch {
            match record {
                MutationRecord::Added { node, .. } => {
                    if document.is_connected(node) {
                        for id in document.subtree(node) {
                            self.activate_node(&document, id);
                        }
                    }
                }
                MutationRecord::Removed { node, .. } => {
                    if !document.is_connected(node) {
                        for id in document.subtree(node) {
                            self.deactivate_node(id);
                        }
                    }
                }
            }
        }
        for node in std::mem::take(&mut self.pending) {
            if document.is_connected(node) {
                self.activate_node(&document, node);
            }
        }
        self.sweep(&document);
    }

    fn activate_node(&mut self, document: &Document, node: NodeId) {
        let apply = self.config.apply_on_activate;
        let Some(bindings) = self.bindings.get_mut(node) else {
            return;
        };
        for binding in bindings.iter_mut() {
            if binding.activate(document, node, apply) {
                self.events.push(ActivationEvent::Activated {
                    node_id: node,
                    site: binding.site().clone(),
                });
            }
        }
    }

    fn deactivate_node(&mut self, node: NodeId) {
        let Some(bindings) = self.bindings.get_mut(node) else {
            return;
        };
        for binding in bindings.iter_mut() {
            if binding.deactivate() {
                self.events.push(ActivationEvent::Deactivated {
                    node_id: node,
                    site: binding.site().clone(),
                });
            }
        }
    }

    /// Drop the bindings of nodes that no longer exist.
    fn sweep(&mut self, document: &Document) {
        let destroyed: Vec<NodeId> = self
            .bindings
            .keys()
            .filter(|&node| !document.contains(node))
            .collect();
        for node in destroyed {
            let released = self.release(node);
            tracing::debug!(?node, released, "released bindings of destroyed node");
        }
    }

    /// Whether any binding of `node` is active.
    pub fn is_active(&self, node: NodeId) -> bool {
        self.bindings
            .get(node)
            .is_some_and(|bindings| bindings.iter().any(Binding::is_active))
    }

    /// States of `node`'s bindings, in attachment order.
    pub fn binding_states(&self, node: NodeId) -> Vec<BindingState> {
        self.bindings
            .get(node)
            .map(|bindings| bindings.iter().map(Binding::state).collect())
            .unwrap_or_default()
    }

    /// Total number of bindings held.
    pub fn binding_count(&self) -> usize {
        self.bindings.values().map(Vec::len).sum()
    }

    /// Number of active bindings.
    pub fn active_binding_count(&self) -> usize {
        self.bindings
            .values()
            .flat_map(|bindings| bindings.iter())
            .filter(|binding| binding.is_active())
            .count()
    }

    /// Drain and return the recorded activation events.
    pub fn drain_events(&mut self) -> Vec<ActivationEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether there are undrained activation events.
    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }
}

impl Default for AttachmentTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl Drop for AttachmentTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Derived, Observable};
    use pretty_assertions::assert_eq;

    fn started(config: TrackerConfig) -> (Document, AttachmentTracker) {
        let doc = Document::new();
        let mut tracker = AttachmentTracker::new(config);
        tracker.start(&doc);
        (doc, tracker)
    }

    fn activated(node_id: NodeId, site: Site) -> ActivationEvent {
        ActivationEvent::Activated { node_id, site }
    }

    fn deactivated(node_id: NodeId, site: Site) -> ActivationEvent {
        ActivationEvent::Deactivated { node_id, site }
    }

    #[test]
    fn new_tracker_is_empty() {
        let tracker = AttachmentTracker::new(TrackerConfig::default());
        assert!(!tracker.is_started());
        assert_eq!(tracker.binding_count(), 0);
        assert!(!tracker.has_pending_events());
    }

    #[test]
    fn config_builder() {
        let config = TrackerConfig::new()
            .with_apply_on_activate(false)
            .with_deactivate_on_stop(false);
        assert!(!config.apply_on_activate);
        assert!(!config.deactivate_on_stop);
    }

    #[test]
    fn insert_activates_after_flush() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let label = Observable::new(String::from("buy milk"));
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));

        doc.append_child(doc.root(), li).unwrap();
        // Deferred until the tracker drains the records.
        assert!(!tracker.is_active(li));
        assert!(!label.is_live());

        assert_eq!(tracker.flush(), 1);
        assert!(tracker.is_active(li));
        assert!(label.is_live());
        assert_eq!(doc.text(li).as_deref(), Some("buy milk"));
        assert_eq!(tracker.drain_events(), vec![activated(li, Site::Text)]);
    }

    #[test]
    fn remove_and_reinsert_cycle() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let label = Observable::new(String::from("a"));
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));

        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();
        assert_eq!(tracker.drain_events().len(), 1);

        doc.detach(li).unwrap();
        tracker.flush();
        assert_eq!(tracker.drain_events(), vec![deactivated(li, Site::Text)]);
        assert!(!label.is_live());

        label.set("b".into());
        assert_eq!(doc.text(li).as_deref(), Some("a"));

        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();
        assert_eq!(tracker.drain_events(), vec![activated(li, Site::Text)]);
        assert_eq!(doc.text(li).as_deref(), Some("b"));
    }

    #[test]
    fn subtree_insert_activates_descendants() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let count = Observable::new(2_usize);
        let ul = doc.create_element("ul");
        let li = doc.create_element("li");
        let span = doc.create_element("span");
        doc.append_child(ul, li).unwrap();
        doc.append_child(li, span).unwrap();
        tracker.attach(span, BindingSpec::text(count.clone()));
        tracker.attach(ul, BindingSpec::attribute("data-count", count.clone()));

        doc.append_child(doc.root(), ul).unwrap();
        assert_eq!(tracker.flush(), 1);
        assert_eq!(tracker.active_binding_count(), 2);
        assert_eq!(count.listener_count(), 2);
        assert_eq!(doc.text(span).as_deref(), Some("2"));
        assert_eq!(doc.attribute(ul, "data-count").as_deref(), Some("2"));

        doc.detach(ul).unwrap();
        tracker.flush();
        assert_eq!(tracker.active_binding_count(), 0);
        assert!(!count.is_live());
    }

    #[test]
    fn remove_then_reinsert_in_one_batch_is_noop() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let label = Observable::new(1);
        let li = doc.create_element("li");
        let other = doc.create_element("ul");
        doc.append_child(doc.root(), other).unwrap();
        tracker.attach(li, BindingSpec::text(label.clone()));
        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();
        tracker.drain_events();

        // Move within the connected tree: Removed + Added in one batch.
        doc.append_child(other, li).unwrap();
        assert_eq!(tracker.flush(), 2);
        assert!(tracker.drain_events().is_empty());
        assert!(tracker.is_active(li));
    }

    #[test]
    fn insert_then_remove_in_one_batch_is_noop() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let label = Observable::new(1);
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));

        doc.append_child(doc.root(), li).unwrap();
        doc.detach(li).unwrap();
        assert_eq!(tracker.flush(), 2);
        assert!(tracker.drain_events().is_empty());
        assert!(!label.is_live());
        assert_eq!(doc.text(li), None);
    }

    #[test]
    fn attach_to_connected_node_activates_on_next_flush() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let li = doc.create_element("li");
        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();

        let label = Observable::new("late");
        tracker.attach(li, BindingSpec::text(label.clone()));
        assert!(!tracker.is_active(li));
        assert_eq!(tracker.flush(), 0);
        assert!(tracker.is_active(li));
        assert_eq!(doc.text(li).as_deref(), Some("late"));
    }

    #[test]
    fn start_activates_already_connected_bindings() {
        let doc = Document::new();
        let mut tracker = AttachmentTracker::new(TrackerConfig::default());
        let li = doc.create_element("li");
        doc.append_child(doc.root(), li).unwrap();
        tracker.attach(li, BindingSpec::text(Observable::new(7)));

        tracker.start(&doc);
        tracker.flush();
        assert!(tracker.is_active(li));
    }

    #[test]
    fn apply_on_activate_disabled() {
        let (doc, mut tracker) = started(TrackerConfig::new().with_apply_on_activate(false));
        let label = Observable::new(1);
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));
        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();
        assert!(tracker.is_active(li));
        assert_eq!(doc.text(li), None);
        label.set(2);
        assert_eq!(doc.text(li).as_deref(), Some("2"));
    }

    #[test]
    fn destroyed_nodes_release_bindings() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let label = Observable::new(1);
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));
        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();
        tracker.drain_events();

        doc.destroy(li).unwrap();
        tracker.flush();
        assert_eq!(tracker.binding_count(), 0);
        assert!(!label.is_live());
        assert_eq!(tracker.drain_events(), vec![deactivated(li, Site::Text)]);
    }

    #[test]
    fn destroyed_detached_nodes_are_swept() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(Observable::new(1)));
        doc.destroy(li).unwrap();
        assert_eq!(tracker.binding_count(), 1);
        tracker.flush();
        assert_eq!(tracker.binding_count(), 0);
    }

    #[test]
    fn derived_chain_goes_idle_on_unmount() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let items = Observable::new(vec![1, 2, 3]);
        let evens = Derived::filter(items.clone(), |v: &i32| v % 2 == 0);
        let count = Derived::map(evens.clone(), |v: &Vec<i32>| v.len());
        let span = doc.create_element("span");
        tracker.attach(span, BindingSpec::text(count.clone()));

        doc.append_child(doc.root(), span).unwrap();
        tracker.flush();
        assert!(count.is_live());
        assert!(evens.is_live());
        assert!(items.is_live());

        items.set(vec![2, 4, 6]);
        assert_eq!(doc.text(span).as_deref(), Some("3"));

        doc.detach(span).unwrap();
        tracker.flush();
        assert!(!count.is_live());
        assert!(!evens.is_live());
        assert!(!items.is_live());
    }

    #[test]
    fn stop_deactivates_everything() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let label = Observable::new(1);
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));
        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();

        tracker.stop();
        assert!(!tracker.is_started());
        assert!(!label.is_live());
        assert_eq!(tracker.binding_count(), 1);

        // No longer observing.
        doc.detach(li).unwrap();
        doc.append_child(doc.root(), li).unwrap();
        assert_eq!(tracker.flush(), 0);
        assert!(!tracker.is_active(li));
    }

    #[test]
    fn stop_can_keep_bindings_active() {
        let (doc, mut tracker) = started(TrackerConfig::new().with_deactivate_on_stop(false));
        let label = Observable::new(1);
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));
        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();
        tracker.stop();
        assert!(label.is_live());
        tracker.stop();
    }

    #[test]
    fn release_drops_bindings() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let label = Observable::new(1);
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));
        tracker.attach(li, BindingSpec::attribute("title", label.clone()));
        doc.append_child(doc.root(), li).unwrap();
        tracker.flush();
        assert_eq!(
            tracker.binding_states(li),
            vec![BindingState::Active, BindingState::Active]
        );
        assert_eq!(tracker.release(li), 2);
        assert!(!label.is_live());
        assert_eq!(tracker.release(li), 0);
    }

    #[test]
    fn run_returns_when_not_started() {
        let mut tracker = AttachmentTracker::new(TrackerConfig::default());
        tokio_test::block_on(tracker.run());
    }

    #[test]
    fn run_drains_until_observer_disconnects() {
        let (doc, mut tracker) = started(TrackerConfig::default());
        let label = Observable::new("x");
        let li = doc.create_element("li");
        tracker.attach(li, BindingSpec::text(label.clone()));
        doc.append_child(doc.root(), li).unwrap();
        doc.disconnect_observer();

        tokio_test::block_on(tracker.run());
        assert!(tracker.is_active(li));
        assert_eq!(doc.text(li).as_deref(), Some("x"));
    }
}
