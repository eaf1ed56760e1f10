use tracing::trace;

use crate::{
    adt::{Adt, AdtNode},
    alphabet::{Color, Symbol},
    error::LearnError,
    id::NodeId,
    show::Show,
};

use super::{AdaptiveQuery, Response};

/// Where the traversal of an ADT ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiftEnd<O> {
    /// A leaf was reached, its state is the one the query identified.
    Leaf(NodeId),
    /// The symbol node `node` has no successor for `output`, so a new state was discovered.
    DeadEnd { node: NodeId, output: O },
}

/// The result of a [`SiftQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiftOutcome<O> {
    /// The output of the transition that was sifted.
    pub output: O,
    pub end: SiftEnd<O>,
}

/// Determines the target of a transition: runs the access sequence of its source, then its
/// input, then follows the ADT from the given node. Every reset node of the ADT starts a new
/// session, in which the access sequence and input are replayed before continuing with the
/// reset node's successor.
#[derive(Clone)]
pub struct SiftQuery<'a, I, O> {
    adt: &'a Adt<I, O>,
    prefix: Vec<I>,
    idx: usize,
    current: NodeId,
    output: Option<O>,
    end: Option<SiftEnd<O>>,
}

impl<'a, I: Symbol, O: Color> std::fmt::Debug for SiftQuery<'a, I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiftQuery")
            .field("prefix", &self.prefix.show())
            .field("current", &self.current)
            .field("end", &self.end)
            .finish()
    }
}

impl<'a, I: Symbol, O: Color> SiftQuery<'a, I, O> {
    /// Creates a query for the transition from the state with access sequence `access` on
    /// `input`, which starts sifting at `start`.
    pub fn new(adt: &'a Adt<I, O>, access: &[I], input: I, start: NodeId) -> Self {
        let mut prefix = access.to_vec();
        prefix.push(input);
        Self {
            adt,
            prefix,
            idx: 0,
            current: start,
            output: None,
            end: None,
        }
    }

    /// The access sequence of the source followed by the transition input.
    pub fn long_prefix(&self) -> &[I] {
        &self.prefix
    }

    /// Returns true once the query is answered.
    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    /// Returns the outcome, fails if the oracle did not finish the query.
    pub fn outcome(&self) -> Result<SiftOutcome<O>, LearnError> {
        match (&self.output, &self.end) {
            (Some(output), Some(end)) => Ok(SiftOutcome {
                output: output.clone(),
                end: end.clone(),
            }),
            _ => Err(LearnError::UnansweredQuery),
        }
    }

    // moves past nodes that do not consume an input
    fn settle(&mut self) -> Response {
        match self.adt.node(self.current) {
            AdtNode::Leaf { .. } => {
                self.end = Some(SiftEnd::Leaf(self.current));
                Response::Done
            }
            AdtNode::Reset { successor, .. } => {
                self.current = *successor;
                self.idx = 0;
                Response::Reset
            }
            AdtNode::Symbol { .. } => Response::Continue,
        }
    }
}

impl<'a, I: Symbol, O: Color> AdaptiveQuery<I, O> for SiftQuery<'a, I, O> {
    fn input(&self) -> I {
        match self.prefix.get(self.idx) {
            Some(symbol) => *symbol,
            // settle never stops anywhere but on a symbol node
            None => self
                .adt
                .symbol(self.current)
                .unwrap_or(self.prefix[self.prefix.len() - 1]),
        }
    }

    fn process_output(&mut self, output: O) -> Response {
        if self.idx < self.prefix.len() {
            self.idx += 1;
            if self.idx < self.prefix.len() {
                return Response::Continue;
            }
            if self.output.is_none() {
                self.output = Some(output);
            }
            return self.settle();
        }

        match self.adt.child(self.current, &output) {
            Some(child) => {
                self.current = child;
                self.settle()
            }
            None => {
                trace!("sifting ended in dead end at {:?}", self.current);
                self.end = Some(SiftEnd::DeadEnd {
                    node: self.current,
                    output,
                });
                Response::Done
            }
        }
    }
}
