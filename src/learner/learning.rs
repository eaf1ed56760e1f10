use std::collections::{BTreeSet, VecDeque};

use itertools::Itertools;
use tracing::{debug, trace};

use crate::{
    adt::Adt,
    alphabet::{Alphabet, Color, Symbol},
    cache::ObservationTree,
    error::LearnError,
    hypothesis::AdtHypothesis,
    id::{NodeId, StateId, TransitionId},
    math,
    mealy::Mealy,
    oracle::{AdaptiveOracle, Counterexample},
    query::{SiftEnd, SiftOutcome, SiftQuery},
    show::Show,
};

use super::PartialTransitionAnalyzer;

/// Everything the learner knows. It lives apart from the strategies, so that a strategy can
/// borrow it as a [`PartialTransitionAnalyzer`].
pub(super) struct Learning<I, O, A> {
    pub(super) alphabet: Alphabet<I>,
    pub(super) hypothesis: AdtHypothesis<I, O>,
    pub(super) adt: Adt<I, O>,
    pub(super) observations: ObservationTree<I, O, A>,
    pub(super) open_transitions: VecDeque<TransitionId>,
    pub(super) open_counterexamples: VecDeque<Counterexample<I, O>>,
    pub(super) all_counterexamples: math::OrderedSet<Counterexample<I, O>>,
}

impl<I: Symbol, O: Color, A> Learning<I, O, A> {
    pub(super) fn new(alphabet: Alphabet<I>, oracle: A, use_observation_tree: bool) -> Self {
        Self {
            hypothesis: AdtHypothesis::new(alphabet.clone()),
            adt: Adt::new(),
            observations: ObservationTree::new(alphabet.clone(), oracle, use_observation_tree),
            alphabet,
            open_transitions: VecDeque::new(),
            open_counterexamples: VecDeque::new(),
            all_counterexamples: math::OrderedSet::default(),
        }
    }
}

impl<I: Symbol, O: Color, A: AdaptiveOracle<I, O>> Learning<I, O, A> {
    /// Sifts all open transitions in batches until none is left. Transitions that lead to new
    /// states open further transitions, which end up in the next batch.
    pub(super) fn close_transitions(&mut self) -> Result<(), LearnError> {
        while !self.open_transitions.is_empty() {
            let hypothesis = &self.hypothesis;
            let batch = self
                .open_transitions
                .drain(..)
                .filter(|t| hypothesis.transition(*t).needs_sifting())
                .unique()
                .collect_vec();
            if batch.is_empty() {
                continue;
            }
            trace!("sifting {} transitions", batch.len());

            let outcomes = {
                let mut queries = batch
                    .iter()
                    .map(|t| {
                        let transition = self.hypothesis.transition(*t);
                        let node = sift_node(&self.hypothesis, *t)?;
                        Ok(SiftQuery::new(
                            &self.adt,
                            self.hypothesis.access_sequence(transition.source()),
                            transition.input(),
                            node,
                        ))
                    })
                    .collect::<Result<Vec<_>, LearnError>>()?;
                self.observations.process_queries(&mut queries);
                queries
                    .iter()
                    .map(SiftQuery::outcome)
                    .collect::<Result<Vec<_>, _>>()?
            };

            for (t, outcome) in batch.into_iter().zip(outcomes) {
                self.process_sift(t, outcome)?;
            }
        }
        Ok(())
    }

    /// Applies the result of sifting transition `t`. A dead end in the tree means that the
    /// transition leads to a state that was not known before.
    fn process_sift(&mut self, t: TransitionId, outcome: SiftOutcome<O>) -> Result<(), LearnError> {
        let SiftOutcome { output, end } = outcome;
        self.hypothesis.set_output(t, output.clone());

        let (node, reached) = match end {
            SiftEnd::Leaf(leaf) => {
                let state = self.state_of_leaf(leaf)?;
                self.hypothesis.set_target(t, Some(state));
                return Ok(());
            }
            SiftEnd::DeadEnd { node, output } => (node, output),
        };
        // an earlier transition of the same batch may have discovered the state already
        if let Some(existing) = self.adt.child(node, &reached) {
            let state = self.state_of_leaf(existing)?;
            self.hypothesis.set_target(t, Some(state));
            return Ok(());
        }

        let transition = self.hypothesis.transition(t);
        let mut access = self.hypothesis.access_sequence(transition.source()).to_vec();
        access.push(transition.input());
        let state = self.hypothesis.add_state(access.clone());
        self.hypothesis.set_target(t, Some(state));
        self.hypothesis.set_spanning_tree_edge(t, true);
        self.adt.add_leaf(node, reached, state)?;
        self.observations.add_state(state, &access, output)?;
        debug!("discovered {} with access sequence {}", state.show(), access.show());

        let root = self.adt.try_root()?;
        for input in self.alphabet.symbols().to_vec() {
            let next = self.hypothesis.create_open_transition(state, input, root);
            self.open_transitions.push_back(next);
        }
        Ok(())
    }

    fn state_of_leaf(&self, leaf: NodeId) -> Result<StateId, LearnError> {
        self.adt
            .state(leaf)
            .ok_or_else(|| LearnError::InvalidTree(format!("sifting ended in non-leaf {leaf:?}")))
    }

    /// Opens all non-spanning-tree transitions into `states` again, to be sifted from
    /// `sift_node`.
    pub(super) fn resift_affected_transitions(
        &mut self,
        states: &BTreeSet<StateId>,
        sift_node: NodeId,
    ) {
        for state in states {
            for t in self.hypothesis.incoming_non_spanning(*state) {
                self.hypothesis.set_target(t, None);
                self.hypothesis.set_sift_node(t, sift_node);
                self.open_transitions.push_back(t);
            }
        }
    }

    /// Checks that the hypothesis agrees with every trace that leads to `leaf`, i.e. the trace
    /// in its own ADS and those of all reset nodes on the way up. Disagreements are queued as
    /// counterexamples.
    pub(super) fn ensure_consistency(&mut self, leaf: NodeId) -> Result<(), LearnError> {
        let state = self.state_of_leaf(leaf)?;
        let access = self.hypothesis.access_sequence(state).to_vec();
        let access_output = self.hypothesis.compute_output(&access)?;

        let mut current = Some(leaf);
        while let Some(node) = current {
            let (input, output) = self.adt.trace(node);
            if self.hypothesis.compute_state_output(state, &input)? != output {
                let mut ce_input = access.clone();
                let mut ce_output = access_output.clone();
                ce_input.extend(input);
                ce_output.extend(output);
                let counterexample = Counterexample::new(ce_input, ce_output);
                debug!(
                    "{} contradicts the tree, queueing {counterexample:?}",
                    state.show()
                );
                self.open_counterexamples.push_back(counterexample);
            }
            current = self.adt.parent(self.adt.start_of_ads(node));
        }
        Ok(())
    }
}

fn sift_node<I: Symbol, O: Color>(
    hypothesis: &AdtHypothesis<I, O>,
    t: TransitionId,
) -> Result<NodeId, LearnError> {
    hypothesis.transition(t).sift_node().ok_or_else(|| {
        LearnError::UndefinedHypothesis(format!("open transition {t:?} has no sift node"))
    })
}

impl<I: Symbol, O: Color, A: AdaptiveOracle<I, O>> PartialTransitionAnalyzer<I, O>
    for Learning<I, O, A>
{
    fn hypothesis(&self) -> &AdtHypothesis<I, O> {
        &self.hypothesis
    }

    fn adt(&self) -> &Adt<I, O> {
        &self.adt
    }

    fn alphabet(&self) -> &Alphabet<I> {
        &self.alphabet
    }

    fn is_transition_defined(&self, state: StateId, input: I) -> bool {
        self.hypothesis.successor(state, input).is_some()
    }

    fn close_transition(&mut self, state: StateId, input: I) -> Result<(), LearnError> {
        let t = self.hypothesis.transition_id(state, input).ok_or_else(|| {
            LearnError::UndefinedHypothesis(format!(
                "{} has no transition on {}",
                state.show(),
                input.show()
            ))
        })?;
        if !self.hypothesis.transition(t).needs_sifting() {
            return Ok(());
        }

        let node = sift_node(&self.hypothesis, t)?;
        let leaves = self.adt.collect_leaves(node).len();
        let outcome = {
            let mut query = SiftQuery::new(
                &self.adt,
                self.hypothesis.access_sequence(state),
                input,
                node,
            );
            self.observations.process_query(&mut query);
            query.outcome()?
        };
        self.process_sift(t, outcome)?;

        if self.adt.collect_leaves(node).len() > leaves {
            trace!("closing {t:?} discovered a new state");
            return Err(LearnError::HypothesisModified);
        }
        Ok(())
    }
}
