use std::collections::BTreeMap;

use crate::id::{NodeId, StateId};

/// A node of an [`super::Adt`]. Parent links and the state of a leaf are plain indices, the
/// arena owns all nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdtNode<I, O> {
    /// Applies `symbol` and branches on the output the system produced.
    Symbol {
        parent: Option<NodeId>,
        symbol: I,
        children: BTreeMap<O, NodeId>,
    },
    /// The system has to be reset (and the access sequence replayed) before continuing with
    /// `successor`.
    Reset {
        parent: Option<NodeId>,
        successor: NodeId,
    },
    /// Identifies exactly one state of the hypothesis.
    Leaf {
        parent: Option<NodeId>,
        state: StateId,
    },
}

impl<I: Copy, O: Ord> AdtNode<I, O> {
    pub(crate) fn symbol_node(parent: Option<NodeId>, symbol: I) -> Self {
        AdtNode::Symbol {
            parent,
            symbol,
            children: BTreeMap::new(),
        }
    }

    /// The parent of the node, `None` for the root and for detached nodes.
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            AdtNode::Symbol { parent, .. }
            | AdtNode::Reset { parent, .. }
            | AdtNode::Leaf { parent, .. } => *parent,
        }
    }

    pub(crate) fn set_parent(&mut self, new_parent: Option<NodeId>) {
        match self {
            AdtNode::Symbol { parent, .. }
            | AdtNode::Reset { parent, .. }
            | AdtNode::Leaf { parent, .. } => *parent = new_parent,
        }
    }

    /// The input symbol of a symbol node.
    pub fn symbol(&self) -> Option<I> {
        match self {
            AdtNode::Symbol { symbol, .. } => Some(*symbol),
            _ => None,
        }
    }

    /// The hypothesis state of a leaf.
    pub fn state(&self) -> Option<StateId> {
        match self {
            AdtNode::Leaf { state, .. } => Some(*state),
            _ => None,
        }
    }

    /// The child reached on `output`, only symbol nodes branch on outputs.
    pub fn child(&self, output: &O) -> Option<NodeId> {
        match self {
            AdtNode::Symbol { children, .. } => children.get(output).copied(),
            _ => None,
        }
    }

    /// All children, ordered by output for symbol nodes.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            AdtNode::Symbol { children, .. } => children.values().copied().collect(),
            AdtNode::Reset { successor, .. } => vec![*successor],
            AdtNode::Leaf { .. } => vec![],
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, AdtNode::Leaf { .. })
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, AdtNode::Reset { .. })
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, AdtNode::Symbol { .. })
    }
}
