use crate::{
    adt::{Adt, AdtNode},
    alphabet::{Color, Symbol},
    error::LearnError,
    id::NodeId,
    show::Show,
};

use super::{AdaptiveQuery, Response, SiftEnd};

/// Runs a state's access sequence and a one-shot prefix, then walks an ADS (which may already
/// contain reset nodes from earlier resolutions). After a reset only the access sequence is
/// replayed, the one-shot prefix is applied in the first session only.
#[derive(Clone)]
pub struct AmbiguityQuery<'a, I, O> {
    adt: &'a Adt<I, O>,
    access: Vec<I>,
    one_shot: Vec<I>,
    prefix_done: bool,
    idx: usize,
    current: NodeId,
    fallback: I,
    end: Option<SiftEnd<O>>,
}

impl<'a, I: Symbol, O: Color> std::fmt::Debug for AmbiguityQuery<'a, I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbiguityQuery")
            .field("access", &self.access.show())
            .field("one_shot", &self.one_shot.show())
            .field("current", &self.current)
            .field("end", &self.end)
            .finish()
    }
}

impl<'a, I: Symbol, O: Color> AmbiguityQuery<'a, I, O> {
    /// Creates a query that walks the ADS starting in the symbol node `start`.
    pub fn new(
        adt: &'a Adt<I, O>,
        access: &[I],
        one_shot: &[I],
        start: NodeId,
    ) -> Result<Self, LearnError> {
        let fallback = adt.symbol(start).ok_or_else(|| {
            LearnError::InvalidTree(format!("ambiguity query has to start in a symbol node, not {start:?}"))
        })?;
        Ok(Self {
            adt,
            access: access.to_vec(),
            one_shot: one_shot.to_vec(),
            prefix_done: false,
            idx: 0,
            current: start,
            fallback,
            end: None,
        })
    }

    fn prefix_len(&self) -> usize {
        if self.prefix_done {
            self.access.len()
        } else {
            self.access.len() + self.one_shot.len()
        }
    }

    fn in_prefix(&self) -> bool {
        self.idx < self.prefix_len()
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    /// Where the walk ended, fails if the oracle did not finish the query.
    pub fn outcome(&self) -> Result<SiftEnd<O>, LearnError> {
        self.end.clone().ok_or(LearnError::UnansweredQuery)
    }

    fn settle(&mut self) -> Response {
        match self.adt.node(self.current) {
            AdtNode::Leaf { .. } => {
                self.end = Some(SiftEnd::Leaf(self.current));
                Response::Done
            }
            AdtNode::Reset { successor, .. } => {
                self.current = *successor;
                self.idx = 0;
                if self.access.is_empty() && !self.adt.is_symbol(self.current) {
                    // nothing would be applied in the next session
                    return self.settle();
                }
                Response::Reset
            }
            AdtNode::Symbol { .. } => Response::Continue,
        }
    }
}

impl<'a, I: Symbol, O: Color> AdaptiveQuery<I, O> for AmbiguityQuery<'a, I, O> {
    fn input(&self) -> I {
        if self.in_prefix() {
            match self.access.get(self.idx) {
                Some(symbol) => *symbol,
                None => self.one_shot[self.idx - self.access.len()],
            }
        } else {
            self.adt
                .symbol(self.current)
                .unwrap_or(self.fallback)
        }
    }

    fn process_output(&mut self, output: O) -> Response {
        if self.in_prefix() {
            self.idx += 1;
            if self.in_prefix() {
                return Response::Continue;
            }
            self.prefix_done = true;
            return self.settle();
        }

        match self.adt.child(self.current, &output) {
            Some(child) => {
                self.current = child;
                self.settle()
            }
            None => {
                self.end = Some(SiftEnd::DeadEnd {
                    node: self.current,
                    output,
                });
                Response::Done
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::StateId;

    #[test_log::test]
    fn one_shot_prefix_is_applied_once() {
        let mut adt: Adt<char, u8> = Adt::new();
        // a {0: reset -> b {1: q1}, 1: q0}
        let head = adt.add_symbol_node('a');
        let q0 = adt.add_leaf_node(StateId::new(0));
        adt.attach(head, 1, q0).unwrap();
        let second = adt.add_symbol_node('b');
        let q1 = adt.add_leaf_node(StateId::new(1));
        adt.attach(second, 1, q1).unwrap();
        let reset = adt.add_reset_node(second);
        adt.attach(head, 0, reset).unwrap();

        let mut query = AmbiguityQuery::new(&adt, &['x'], &['y'], head).unwrap();
        let mut sessions = vec![vec![]];
        loop {
            let input = query.input();
            sessions.last_mut().unwrap().push(input);
            let output = if input == 'b' { 1 } else { 0 };
            match query.process_output(output) {
                Response::Continue => {}
                Response::Reset => sessions.push(vec![]),
                Response::Done => break,
            }
        }
        assert_eq!(sessions, vec![vec!['x', 'y', 'a'], vec!['x', 'b']]);
        assert_eq!(query.outcome().unwrap(), SiftEnd::Leaf(q1));
    }

    #[test_log::test]
    fn dead_end_without_prefix() {
        let mut adt: Adt<char, u8> = Adt::new();
        let head = adt.add_symbol_node('a');
        let q0 = adt.add_leaf_node(StateId::new(0));
        adt.attach(head, 1, q0).unwrap();

        let mut query = AmbiguityQuery::new(&adt, &[], &[], head).unwrap();
        assert!(AmbiguityQuery::new(&adt, &[], &[], q0).is_err());
        assert_eq!(query.input(), 'a');
        assert_eq!(query.process_output(0), Response::Done);
        assert_eq!(
            query.outcome().unwrap(),
            SiftEnd::DeadEnd {
                node: head,
                output: 0
            }
        );
    }
}
