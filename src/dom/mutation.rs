//! Structural mutation records produced by the connected tree.

use super::node::NodeId;

/// One child-list change under the connected tree.
///
/// Records are only produced when the parent involved is connected at the
/// time of the change; edits inside detached subtrees are silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationRecord {
    /// `node` (with its subtree) was inserted under `parent`.
    Added { parent: NodeId, node: NodeId },
    /// `node` (with its subtree) was removed from `parent`.
    Removed { parent: NodeId, node: NodeId },
}

impl MutationRecord {
    /// The inserted or removed node.
    pub fn node(&self) -> NodeId {
        match self {
            Self::Added { node, .. } | Self::Removed { node, .. } => *node,
        }
    }

    /// The parent it was inserted under or removed from.
    pub fn parent(&self) -> NodeId {
        match self {
            Self::Added { parent, .. } | Self::Removed { parent, .. } => *parent,
        }
    }
}
