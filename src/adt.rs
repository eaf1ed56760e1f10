use std::{collections::BTreeSet, fmt::Debug};

use owo_colors::OwoColorize;
use tracing::trace;

use crate::{
    alphabet::{Color, Symbol},
    error::LearnError,
    id::{NodeId, StateId},
    math,
    show::Show,
    strategy::LeafSplitter,
};

mod ads;
pub use ads::Ads;

mod node;
pub use node::AdtNode;

/// The lowest common ancestor of two leaves together with the outputs that lead from it
/// towards the first and the second leaf, respectively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lca<O> {
    pub node: NodeId,
    pub first_output: O,
    pub second_output: O,
}

/// An adaptive distinguishing-sequence tree.
///
/// Nodes live in an arena and refer to each other through [`NodeId`]s. Subtrees that are cut out
/// of the tree or candidates that are never installed remain in the arena, so a [`NodeId`] is
/// never invalidated, but only nodes reachable from [`Adt::root`] are part of the tree.
///
/// Invariant maintained by the learner: the leaves reachable from the root are in bijection with
/// the states of the hypothesis.
#[derive(Clone)]
pub struct Adt<I, O> {
    nodes: Vec<AdtNode<I, O>>,
    root: Option<NodeId>,
}

impl<I: Symbol, O: Color> Default for Adt<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Symbol, O: Color> Adt<I, O> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: vec![],
            root: None,
        }
    }

    /// Makes a single leaf for `state` the root of the tree.
    pub fn initialize(&mut self, state: StateId) -> NodeId {
        let leaf = self.add_leaf_node(state);
        self.root = Some(leaf);
        leaf
    }

    /// The root of the tree, `None` before [`Adt::initialize`] was called.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Like [`Adt::root`], but fails if the tree is empty.
    pub fn try_root(&self) -> Result<NodeId, LearnError> {
        self.root
            .ok_or_else(|| LearnError::InvalidTree("the tree has no root".into()))
    }

    /// Returns a reference to the node with the given index.
    pub fn node(&self, id: NodeId) -> &AdtNode<I, O> {
        assert!(id.index() < self.nodes.len(), "node {id:?} does not exist");
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut AdtNode<I, O> {
        assert!(id.index() < self.nodes.len(), "node {id:?} does not exist");
        &mut self.nodes[id.index()]
    }

    /// The number of nodes in the arena, including those that are no longer reachable.
    pub fn arena_size(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent()
    }

    pub fn symbol(&self, id: NodeId) -> Option<I> {
        self.node(id).symbol()
    }

    pub fn state(&self, id: NodeId) -> Option<StateId> {
        self.node(id).state()
    }

    pub fn child(&self, id: NodeId, output: &O) -> Option<NodeId> {
        self.node(id).child(output)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).is_leaf()
    }

    pub fn is_reset(&self, id: NodeId) -> bool {
        self.node(id).is_reset()
    }

    pub fn is_symbol(&self, id: NodeId) -> bool {
        self.node(id).is_symbol()
    }

    fn push(&mut self, node: AdtNode<I, O>) -> NodeId {
        self.nodes.push(node);
        NodeId::new(self.nodes.len() - 1)
    }

    /// Creates a detached symbol node without children.
    pub fn add_symbol_node(&mut self, symbol: I) -> NodeId {
        self.push(AdtNode::symbol_node(None, symbol))
    }

    /// Creates a detached leaf for `state`.
    pub fn add_leaf_node(&mut self, state: StateId) -> NodeId {
        self.push(AdtNode::Leaf {
            parent: None,
            state,
        })
    }

    /// Creates a reset node in front of `successor`, which must not have a parent yet.
    pub fn add_reset_node(&mut self, successor: NodeId) -> NodeId {
        let reset = self.push(AdtNode::Reset {
            parent: None,
            successor,
        });
        self.node_mut(successor).set_parent(Some(reset));
        reset
    }

    /// Makes `child` the successor of the symbol node `parent` on `output`, returns the previous
    /// successor on that output.
    pub fn attach(
        &mut self,
        parent: NodeId,
        output: O,
        child: NodeId,
    ) -> Result<Option<NodeId>, LearnError> {
        let AdtNode::Symbol { children, .. } = self.node_mut(parent) else {
            return Err(LearnError::InvalidTree(format!(
                "cannot attach a child to non-symbol node {parent:?}"
            )));
        };
        let previous = children.insert(output, child);
        self.node_mut(child).set_parent(Some(parent));
        if let Some(previous) = previous {
            self.node_mut(previous).set_parent(None);
        }
        Ok(previous)
    }

    /// Attaches a new leaf for `state` below `parent` on `output`. This is how states that were
    /// discovered by a sifting dead end enter the tree.
    pub fn add_leaf(
        &mut self,
        parent: NodeId,
        output: O,
        state: StateId,
    ) -> Result<NodeId, LearnError> {
        if self.child(parent, &output).is_some() {
            return Err(LearnError::InvalidTree(format!(
                "{parent:?} already has a successor for output {}",
                output.show()
            )));
        }
        let leaf = self.add_leaf_node(state);
        self.attach(parent, output, leaf)?;
        Ok(leaf)
    }

    /// Puts `new` into the place of `old`, i.e. into the slot of the parent of `old` or at the
    /// root. Afterwards `old` is detached.
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<(), LearnError> {
        let parent = self.parent(old);
        match parent {
            None => {
                if self.root == Some(old) {
                    self.root = Some(new);
                }
            }
            Some(p) => match self.node_mut(p) {
                AdtNode::Symbol { children, .. } => {
                    for child in children.values_mut().filter(|child| **child == old) {
                        *child = new;
                    }
                }
                AdtNode::Reset { successor, .. } => *successor = new,
                AdtNode::Leaf { .. } => {
                    return Err(LearnError::InvalidTree(format!("leaf {p:?} has a child")))
                }
            },
        }
        self.node_mut(new).set_parent(parent);
        if old != new {
            self.node_mut(old).set_parent(None);
        }
        Ok(())
    }

    /// Returns the first node of the ADS that contains `node`, i.e. the highest ancestor that is
    /// reachable without passing a reset node.
    pub fn start_of_ads(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            if self.is_reset(parent) {
                break;
            }
            current = parent;
        }
        current
    }

    /// Returns the output label of the edge from the symbol node `parent` to `child`.
    pub fn output_for_successor(&self, parent: NodeId, child: NodeId) -> Result<O, LearnError> {
        let AdtNode::Symbol { children, .. } = self.node(parent) else {
            return Err(LearnError::InvalidTree(format!(
                "{parent:?} is not a symbol node"
            )));
        };
        children
            .iter()
            .find(|(_, c)| **c == child)
            .map(|(o, _)| o.clone())
            .ok_or_else(|| LearnError::InvalidTree(format!("{child:?} is no child of {parent:?}")))
    }

    /// Computes the input/output trace that leads from the start of the ADS containing `node`
    /// down to `node`.
    pub fn trace(&self, node: NodeId) -> (Vec<I>, Vec<O>) {
        let mut inputs = vec![];
        let mut outputs = vec![];
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            let AdtNode::Symbol {
                symbol, children, ..
            } = self.node(parent)
            else {
                break;
            };
            inputs.push(*symbol);
            outputs.extend(
                children
                    .iter()
                    .find(|(_, c)| **c == current)
                    .map(|(o, _)| o.clone()),
            );
            current = parent;
        }
        inputs.reverse();
        outputs.reverse();
        (inputs, outputs)
    }

    /// Collects all leaves below (and including) `node` in depth-first order.
    pub fn collect_leaves(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let n = self.node(current);
            if n.is_leaf() {
                out.push(current);
            }
            stack.extend(n.children().into_iter().rev());
        }
        out
    }

    /// The hypothesis states of all leaves below `node`.
    pub fn collect_states(&self, node: NodeId) -> BTreeSet<StateId> {
        self.collect_leaves(node)
            .into_iter()
            .filter_map(|leaf| self.state(leaf))
            .collect()
    }

    /// Collects `root` and the first node of every ADS below it, i.e. every successor of a reset
    /// node.
    pub fn collect_ads_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![root];
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let n = self.node(current);
            if let AdtNode::Reset { successor, .. } = n {
                out.push(*successor);
            }
            stack.extend(n.children().into_iter().rev());
        }
        out
    }

    /// Collects all reset nodes below (and including) `node`.
    pub fn collect_reset_nodes(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let n = self.node(current);
            if n.is_reset() {
                out.push(current);
            }
            stack.extend(n.children().into_iter().rev());
        }
        out
    }

    /// Collects the ADSs that directly follow the ADS of `node`, that is the successors of the
    /// first reset nodes on every path. If `node` is a reset node, this is just its successor.
    pub fn collect_direct_sub_adss(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            match self.node(current) {
                AdtNode::Reset { successor, .. } => out.push(*successor),
                n => stack.extend(n.children().into_iter().rev()),
            }
        }
        out
    }

    /// The cost of the subtree rooted in `node`: for every leaf the number of reset nodes on the
    /// path from `node` to it, summed up over all leaves.
    pub fn effective_resets(&self, node: NodeId) -> usize {
        let mut sum = 0;
        let mut stack = vec![(node, 0)];
        while let Some((current, resets)) = stack.pop() {
            match self.node(current) {
                AdtNode::Leaf { .. } => sum += resets,
                AdtNode::Reset { successor, .. } => stack.push((*successor, resets + 1)),
                AdtNode::Symbol { children, .. } => {
                    stack.extend(children.values().map(|c| (*c, resets)))
                }
            }
        }
        sum
    }

    /// Returns true if `node` is part of the tree.
    pub fn is_reachable(&self, node: NodeId) -> bool {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        self.root == Some(current)
    }

    /// Pairs every hypothesis state with its leaf. Fails if two leaves carry the same state.
    pub fn leaves_by_state(&self) -> Result<math::Bijection<StateId, NodeId>, LearnError> {
        let mut out = math::Bijection::new();
        let Some(root) = self.root else {
            return Ok(out);
        };
        for leaf in self.collect_leaves(root) {
            let state = self.state(leaf).ok_or(LearnError::InvalidTree(format!(
                "{leaf:?} is not a leaf"
            )))?;
            if out.insert_no_overwrite(state, leaf).is_err() {
                return Err(LearnError::InvalidTree(format!(
                    "state {state:?} has more than one leaf"
                )));
            }
        }
        Ok(out)
    }

    /// Finds the leaf that identifies `state`.
    pub fn leaf_of(&self, state: StateId) -> Result<NodeId, LearnError> {
        let root = self.try_root()?;
        self.collect_leaves(root)
            .into_iter()
            .find(|leaf| self.state(*leaf) == Some(state))
            .ok_or(LearnError::MissingLeaf(state))
    }

    /// Copies the given [`Ads`] into the arena and returns its (detached) root.
    pub fn graft(&mut self, ads: &Ads<I, O>) -> NodeId {
        match ads {
            Ads::Leaf(state) => self.add_leaf_node(*state),
            Ads::Symbol { symbol, children } => {
                let node = self.add_symbol_node(*symbol);
                for (output, child) in children {
                    let grafted = self.graft(child);
                    if let AdtNode::Symbol { children, .. } = self.node_mut(node) {
                        children.insert(output.clone(), grafted);
                    }
                    self.node_mut(grafted).set_parent(Some(node));
                }
                node
            }
        }
    }

    /// Builds a detached chain of symbol nodes for the given observation that ends in a leaf for
    /// `state`, returns the head of the chain.
    pub fn build_ads_from_observation(
        &mut self,
        input: &[I],
        output: &[O],
        state: StateId,
    ) -> Result<NodeId, LearnError> {
        if input.is_empty() || input.len() != output.len() {
            return Err(LearnError::InvalidTree(format!(
                "cannot build an ADS from trace {} / {}",
                input.show(),
                output.show()
            )));
        }
        let head = self.add_symbol_node(input[0]);
        let mut tail = head;
        for (symbol, out) in input[1..].iter().zip(output) {
            let next = self.add_symbol_node(*symbol);
            self.attach(tail, out.clone(), next)?;
            tail = next;
        }
        let leaf = self.add_leaf_node(state);
        self.attach(tail, output[output.len() - 1].clone(), leaf)?;
        Ok(head)
    }

    /// Merges the single-trace ADS `child` into the ADS `parent`. Returns true if the trace
    /// eventually leaves `parent` on an output that has no successor yet, in which case the rest
    /// of the trace is attached there. Returns false if the two disagree on a symbol, or if the
    /// trace runs into a leaf or reset node of `parent`.
    pub fn merge_ads(&mut self, parent: NodeId, child: NodeId) -> Result<bool, LearnError> {
        let mut parent_iter = parent;
        let mut child_iter = child;
        loop {
            let (
                AdtNode::Symbol {
                    symbol: parent_symbol,
                    ..
                },
                AdtNode::Symbol {
                    symbol: child_symbol,
                    children: child_children,
                    ..
                },
            ) = (self.node(parent_iter), self.node(child_iter))
            else {
                return Ok(false);
            };
            if parent_symbol != child_symbol {
                return Ok(false);
            }
            let mut successors = child_children.iter();
            let (Some((output, next_child)), None) = (successors.next(), successors.next()) else {
                return Err(LearnError::InvalidTree(format!(
                    "{child_iter:?} does not belong to a single trace"
                )));
            };
            let (output, next_child) = (output.clone(), *next_child);
            match self.child(parent_iter, &output) {
                Some(next_parent) => {
                    parent_iter = next_parent;
                    child_iter = next_child;
                }
                None => {
                    self.attach(parent_iter, output, next_child)?;
                    return Ok(true);
                }
            }
        }
    }

    /// Replaces `old` by `new`. `old` is either the root, a reset node (then `new` continues the
    /// ADS that ends in the reset node) or the first node of an ADS following a reset node (then
    /// `new` follows the same reset node).
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> Result<(), LearnError> {
        let admissible = self.root == Some(old)
            || self.is_reset(old)
            || self.parent(old).is_some_and(|p| self.is_reset(p));
        if !admissible {
            return Err(LearnError::InvalidTree(format!(
                "{old:?} neither starts an ADS nor is a reset node"
            )));
        }
        trace!("replacing {old:?} with {new:?}");
        self.replace_child(old, new)
    }

    /// Finds the lowest common ancestor of the two nodes, which has to be a symbol node.
    pub fn find_lca(&self, first: NodeId, second: NodeId) -> Result<Lca<O>, LearnError> {
        let mut on_path = math::Map::default();
        let mut child = first;
        while let Some(parent) = self.parent(child) {
            on_path.insert(parent, child);
            child = parent;
        }

        let mut child = second;
        while let Some(parent) = self.parent(child) {
            if let Some(&first_child) = on_path.get(&parent) {
                if !self.is_symbol(parent) {
                    return Err(LearnError::InvalidTree(format!(
                        "lowest common ancestor {parent:?} of {first:?} and {second:?} is no symbol node"
                    )));
                }
                return Ok(Lca {
                    node: parent,
                    first_output: self.output_for_successor(parent, first_child)?,
                    second_output: self.output_for_successor(parent, child)?,
                });
            }
            child = parent;
        }
        Err(LearnError::InvalidTree(format!(
            "{first:?} and {second:?} have no common ancestor"
        )))
    }

    /// Splits `leaf` with the given strategy such that it distinguishes its current state from
    /// `state`, which produces `new_output` instead of `old_output` on `suffix`. Returns the leaf
    /// created for `state`.
    pub fn split_leaf(
        &mut self,
        leaf: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
        state: StateId,
        splitter: &dyn LeafSplitter<I, O>,
    ) -> Result<NodeId, LearnError> {
        if !self.is_leaf(leaf) {
            return Err(LearnError::InvalidTree(format!("{leaf:?} is not a leaf")));
        }
        if old_output.iter().zip(new_output).all(|(o, n)| o == n) {
            return Err(LearnError::InvalidTree(format!(
                "outputs {} and {} on {} do not diverge",
                old_output.show(),
                new_output.show(),
                suffix.show()
            )));
        }
        let was_root = self.root == Some(leaf);
        let new_leaf = splitter.split(self, leaf, suffix, old_output, new_output, state)?;
        if was_root {
            self.root = Some(self.start_of_ads(leaf));
        }
        Ok(new_leaf)
    }

    /// Like [`Adt::split_leaf`], but `suffix` starts with the trace of `leaf` in its ADS and the
    /// ADS is continued instead of starting a new one. A root leaf is simply split.
    pub fn extend_leaf(
        &mut self,
        leaf: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
        state: StateId,
        splitter: &dyn LeafSplitter<I, O>,
    ) -> Result<NodeId, LearnError> {
        if self.root == Some(leaf) {
            return self.split_leaf(leaf, suffix, old_output, new_output, state, splitter);
        }
        self.split_parent(leaf, suffix, old_output, new_output, state)
    }

    /// Replaces `leaf` by a new ADS that starts with `suffix`. Unless `leaf` is the root, the new
    /// ADS is preceded by a reset node.
    pub fn split_into_new_ads(
        &mut self,
        leaf: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
        state: StateId,
    ) -> Result<NodeId, LearnError> {
        let first = *suffix
            .first()
            .ok_or_else(|| LearnError::InvalidTree("cannot split with an empty suffix".into()))?;
        let head = self.add_symbol_node(first);
        if self.parent(leaf).is_some() {
            let reset = self.add_reset_node(head);
            self.replace_child(leaf, reset)?;
        }
        self.finalize_split(leaf, head, suffix, old_output, new_output, 0, state)
    }

    /// Checks whether the ADS of `leaf` can be continued, i.e. whether the trace of `leaf` is a
    /// prefix of `suffix` on which both outputs agree with the trace.
    pub fn can_split_parent(
        &self,
        leaf: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
    ) -> bool {
        if self.parent(leaf).is_none() {
            return false;
        }
        let (inputs, outputs) = self.trace(leaf);
        suffix.starts_with(&inputs)
            && old_output.starts_with(&outputs)
            && new_output.starts_with(&outputs)
            && inputs.len() < suffix.len()
    }

    /// Continues the ADS of `leaf`. The outputs in `old_output` have to lead from the start of the
    /// ADS to `leaf`, from there on the remaining suffix takes the place of `leaf`.
    pub fn split_parent(
        &mut self,
        leaf: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
        state: StateId,
    ) -> Result<NodeId, LearnError> {
        let mut current = self.start_of_ads(leaf);
        let mut idx = 0;
        while !self.is_leaf(current) {
            let (Some(symbol), Some(output)) = (suffix.get(idx), old_output.get(idx)) else {
                return Err(LearnError::InvalidTree(format!(
                    "suffix {} ends before reaching {leaf:?}",
                    suffix.show()
                )));
            };
            if self.symbol(current) != Some(*symbol) {
                return Err(LearnError::InvalidTree(format!(
                    "suffix {} deviates from the ADS of {leaf:?}",
                    suffix.show()
                )));
            }
            current = self.child(current, output).ok_or_else(|| {
                LearnError::InvalidTree(format!("outputs leave the ADS of {leaf:?}"))
            })?;
            idx += 1;
        }
        if current != leaf {
            return Err(LearnError::InvalidTree(format!(
                "outputs lead to {current:?} instead of {leaf:?}"
            )));
        }
        let symbol = *suffix.get(idx).ok_or_else(|| {
            LearnError::InvalidTree(format!("suffix {} does not extend the ADS", suffix.show()))
        })?;
        let continued = self.add_symbol_node(symbol);
        self.replace_child(leaf, continued)?;
        self.finalize_split(leaf, continued, suffix, old_output, new_output, idx, state)
    }

    /// Appends symbols of `suffix` below `head` (which applies `suffix[start]`) for as long as
    /// both outputs coincide, then hangs `leaf` and a new leaf for `state` below the diverging
    /// outputs.
    #[allow(clippy::too_many_arguments)]
    fn finalize_split(
        &mut self,
        leaf: NodeId,
        head: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
        start: usize,
        state: StateId,
    ) -> Result<NodeId, LearnError> {
        let mut previous = head;
        let mut idx = start;
        loop {
            let (Some(old), Some(new)) = (old_output.get(idx), new_output.get(idx)) else {
                return Err(LearnError::InvalidTree(format!(
                    "outputs {} and {} do not diverge",
                    old_output.show(),
                    new_output.show()
                )));
            };
            if old != new {
                break;
            }
            let symbol = *suffix.get(idx + 1).ok_or_else(|| {
                LearnError::InvalidTree(format!("suffix {} is too short", suffix.show()))
            })?;
            let next = self.add_symbol_node(symbol);
            self.attach(previous, old.clone(), next)?;
            previous = next;
            idx += 1;
        }

        self.attach(previous, old_output[idx].clone(), leaf)?;
        let new_leaf = self.add_leaf_node(state);
        self.attach(previous, new_output[idx].clone(), new_leaf)?;
        Ok(new_leaf)
    }

    fn fmt_node(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        node: NodeId,
        depth: usize,
    ) -> std::fmt::Result {
        let indent = "  ".repeat(depth);
        match self.node(node) {
            AdtNode::Leaf { state, .. } => {
                writeln!(f, "{indent}{node:?} {}", state.show().green())
            }
            AdtNode::Reset { successor, .. } => {
                writeln!(f, "{indent}{node:?} {}", "reset".red())?;
                self.fmt_node(f, *successor, depth + 1)
            }
            AdtNode::Symbol {
                symbol, children, ..
            } => {
                writeln!(f, "{indent}{node:?} {}", symbol.show().blue())?;
                for (output, child) in children {
                    writeln!(f, "{indent} [{}]", output.show())?;
                    self.fmt_node(f, *child, depth + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl<I: Symbol, O: Color> Debug for Adt<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.root {
            None => write!(f, "empty ADT"),
            Some(root) => self.fmt_node(f, root, 0),
        }
    }
}
