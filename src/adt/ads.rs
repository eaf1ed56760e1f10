use std::collections::{BTreeMap, BTreeSet};

use crate::{
    alphabet::{Color, Symbol},
    id::StateId,
    mealy::Mealy,
};

/// An adaptive distinguishing sequence, i.e. a reset-free tree that is not (yet) part of an
/// [`super::Adt`]. Strategies compute these as proposals, the learner grafts them into its tree
/// with [`super::Adt::graft`] once it decided to look at them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ads<I, O> {
    Symbol {
        symbol: I,
        children: BTreeMap<O, Ads<I, O>>,
    },
    Leaf(StateId),
}

impl<I: Symbol, O: Color> Ads<I, O> {
    /// Creates a leaf for `state`.
    pub fn leaf(state: StateId) -> Self {
        Ads::Leaf(state)
    }

    /// Creates a symbol node with the given children.
    pub fn symbol<X: IntoIterator<Item = (O, Ads<I, O>)>>(symbol: I, children: X) -> Self {
        Ads::Symbol {
            symbol,
            children: children.into_iter().collect(),
        }
    }

    /// Builds the chain of symbol nodes that `trace` induces when it is run in `machine` from
    /// `state`. The last symbol of the trace gets `children` as its children, all other nodes
    /// have a single child labelled with the output `machine` produces. Returns `None` if the
    /// trace is empty or leaves the defined part of `machine`.
    pub fn from_trace<M: Mealy<I, O>>(
        machine: &M,
        state: M::StateIndex,
        trace: &[I],
        children: BTreeMap<O, Ads<I, O>>,
    ) -> Option<Self> {
        let (&last, prefix) = trace.split_last()?;
        let outputs = machine.transform_from(state, prefix)?;
        let mut node = Ads::Symbol {
            symbol: last,
            children,
        };
        for (&symbol, output) in prefix.iter().zip(outputs).rev() {
            node = Ads::symbol(symbol, [(output, node)]);
        }
        Some(node)
    }

    /// The states identified by the leaves.
    pub fn states(&self) -> BTreeSet<StateId> {
        let mut out = BTreeSet::new();
        self.collect_states(&mut out);
        out
    }

    fn collect_states(&self, out: &mut BTreeSet<StateId>) {
        match self {
            Ads::Leaf(state) => {
                out.insert(*state);
            }
            Ads::Symbol { children, .. } => {
                for child in children.values() {
                    child.collect_states(out);
                }
            }
        }
    }

    /// The number of leaves.
    pub fn leaf_count(&self) -> usize {
        match self {
            Ads::Leaf(_) => 1,
            Ads::Symbol { children, .. } => children.values().map(Ads::leaf_count).sum(),
        }
    }

    /// The length of the longest path from the root to a leaf.
    pub fn depth(&self) -> usize {
        match self {
            Ads::Leaf(_) => 0,
            Ads::Symbol { children, .. } => {
                1 + children.values().map(Ads::depth).max().unwrap_or(0)
            }
        }
    }

    /// Every leaf state together with the input/output trace that leads from the root to it.
    pub fn traces(&self) -> Vec<(StateId, Vec<I>, Vec<O>)> {
        let mut out = vec![];
        let mut stack = vec![(self, vec![], vec![])];
        while let Some((node, input, output)) = stack.pop() {
            match node {
                Ads::Leaf(state) => out.push((*state, input, output)),
                Ads::Symbol { symbol, children } => {
                    for (o, child) in children.iter().rev() {
                        let mut input = input.clone();
                        let mut output = output.clone();
                        input.push(*symbol);
                        output.push(o.clone());
                        stack.push((child, input, output));
                    }
                }
            }
        }
        out
    }

    /// Relabels all leaves through `f`.
    pub fn map_states<F: Fn(StateId) -> StateId>(self, f: &F) -> Self {
        match self {
            Ads::Leaf(state) => Ads::Leaf(f(state)),
            Ads::Symbol { symbol, children } => Ads::Symbol {
                symbol,
                children: children
                    .into_iter()
                    .map(|(output, child)| (output, child.map_states(f)))
                    .collect(),
            },
        }
    }
}
