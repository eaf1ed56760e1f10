use tracing::{debug, info, trace, warn};

use crate::{
    adt::Adt,
    alphabet::{Alphabet, Color, Symbol},
    cache::ObservationTree,
    error::LearnError,
    hypothesis::AdtHypothesis,
    id::StateId,
    mealy::{Mealy, MealyMachine},
    oracle::{AdaptiveOracle, Counterexample, EquivalenceOracle},
    show::show_duration,
    strategy::{AdtExtender, LeafSplitter, LocalSuffixFinder, SubtreeReplacer},
};

mod builder;
pub use builder::AdtLearnerBuilder;

mod learning;
use learning::Learning;

mod refinement;

mod replacement;

/// Upper bound on the number of equivalence queries [`AdtLearner::infer`] poses, can be
/// overridden through the `MAX_ITERATIONS` environment variable.
pub const ITERATION_THRESHOLD: usize = if cfg!(debug_assertions) { 300 } else { 200000 };

/// Gives strategies read access to the partial hypothesis and the tree while the learner is in
/// the middle of a refinement, and lets them close transitions they need.
pub trait PartialTransitionAnalyzer<I, O> {
    fn hypothesis(&self) -> &AdtHypothesis<I, O>;

    fn adt(&self) -> &Adt<I, O>;

    fn alphabet(&self) -> &Alphabet<I>;

    /// Returns true if the transition of `state` on `input` has a target.
    fn is_transition_defined(&self, state: StateId, input: I) -> bool;

    /// Determines the target of the transition of `state` on `input`. If this discovers a new
    /// state, the transition structure the caller relied on is outdated and
    /// [`LearnError::HypothesisModified`] is returned, the caller is expected to start over.
    fn close_transition(&mut self, state: StateId, input: I) -> Result<(), LearnError>;
}

/// A snapshot of a learner, taken with [`AdtLearner::suspend`] and restored with
/// [`AdtLearner::resume`].
#[derive(Clone)]
pub struct LearnerState<I, O> {
    hypothesis: AdtHypothesis<I, O>,
    adt: Adt<I, O>,
}

impl<I, O> LearnerState<I, O> {
    pub fn hypothesis(&self) -> &AdtHypothesis<I, O> {
        &self.hypothesis
    }

    pub fn adt(&self) -> &Adt<I, O> {
        &self.adt
    }
}

impl<I: Symbol, O: Color> std::fmt::Debug for LearnerState<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "hypothesis\n{:?}\ntree\n{:?}", self.hypothesis, self.adt)
    }
}

struct Strategies<I, O> {
    leaf_splitter: Box<dyn LeafSplitter<I, O>>,
    extender: Box<dyn AdtExtender<I, O>>,
    replacer: Box<dyn SubtreeReplacer<I, O>>,
    suffix_finder: Box<dyn LocalSuffixFinder<I, O>>,
}

/// Learns a Mealy machine by maintaining an adaptive distinguishing-sequence tree whose leaves
/// are the states of the hypothesis.
///
/// All queries go to the [`AdaptiveOracle`] `A`, which is wrapped in an [`ObservationTree`].
/// How the tree is grown and optimized is decided by the strategies that are configured through
/// [`AdtLearner::builder`].
///
/// ```
/// use adt_learning::prelude::*;
///
/// let target = MealyMachine::builder()
///     .with_transitions([
///         (0, 'a', 0u8, 0),
///         (0, 'b', 1, 1),
///         (1, 'a', 0, 0),
///         (1, 'b', 0, 1),
///     ])
///     .into_mealy(0);
/// let oracle = SulOracle::new(MealySul::new(target.clone()));
/// let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle);
/// let model = learner.infer(&mut MealyOracle::new(target)).unwrap();
/// assert_eq!(model.size(), 2);
/// ```
pub struct AdtLearner<I, O, A> {
    core: Learning<I, O, A>,
    strategies: Strategies<I, O>,
}

impl<I: Symbol, O: Color, A: AdaptiveOracle<I, O>> AdtLearner<I, O, A> {
    /// Creates a learner with the default strategies.
    pub fn new(alphabet: Alphabet<I>, oracle: A) -> Self {
        Self::builder(alphabet, oracle).build()
    }

    /// Starts configuring a learner for `alphabet` that poses its queries to `oracle`.
    pub fn builder(alphabet: Alphabet<I>, oracle: A) -> AdtLearnerBuilder<I, O, A> {
        AdtLearnerBuilder::new(alphabet, oracle)
    }

    pub fn alphabet(&self) -> &Alphabet<I> {
        &self.core.alphabet
    }

    /// The current hypothesis. Between refinements all of its transitions are closed.
    pub fn hypothesis_model(&self) -> &AdtHypothesis<I, O> {
        &self.core.hypothesis
    }

    pub fn adt(&self) -> &Adt<I, O> {
        &self.core.adt
    }

    /// The oracle that answers the queries the observation tree cannot answer.
    pub fn oracle(&self) -> &A {
        self.core.observations.delegate()
    }

    pub fn observations(&self) -> &ObservationTree<I, O, A> {
        &self.core.observations
    }

    /// Every counterexample that was processed so far, in the order they were first seen.
    pub fn counterexamples(&self) -> impl Iterator<Item = &Counterexample<I, O>> + '_ {
        self.core.all_counterexamples.iter()
    }

    /// Creates the initial state and closes its transitions, which may already discover further
    /// states.
    pub fn start_learning(&mut self) -> Result<(), LearnError> {
        let core = &mut self.core;
        let initial = core.hypothesis.add_initial_state();
        core.observations.initialize(initial);
        let root = core.adt.initialize(initial);
        for input in core.alphabet.symbols().to_vec() {
            let t = core.hypothesis.create_open_transition(initial, input, root);
            core.open_transitions.push_back(t);
        }
        core.close_transitions()?;
        debug!(
            "initial hypothesis has {} states",
            core.hypothesis.size()
        );
        Ok(())
    }

    /// Refines the hypothesis with `counterexample`. Returns false if it is no counterexample
    /// for the current hypothesis. Otherwise the counterexample, together with everything that
    /// comes up while processing it, is used until the hypothesis agrees with all of them.
    pub fn refine_hypothesis(
        &mut self,
        counterexample: &Counterexample<I, O>,
    ) -> Result<bool, LearnError> {
        if !counterexample.is_counterexample_for(&self.core.hypothesis) {
            return Ok(false);
        }
        let start = std::time::Instant::now();

        self.evaluate_subtree_replacement()?;
        self.core
            .open_counterexamples
            .push_back(counterexample.clone());

        while !self.core.open_counterexamples.is_empty() {
            while let Some(current) = self.core.open_counterexamples.pop_front() {
                self.core.all_counterexamples.insert(current.clone());
                while self.refine_internal(&current)? {}
            }

            // replacements may have undone the effect of earlier counterexamples
            let reopened = self
                .core
                .all_counterexamples
                .iter()
                .filter(|ce| ce.is_counterexample_for(&self.core.hypothesis))
                .cloned()
                .collect::<Vec<_>>();
            self.core.open_counterexamples.extend(reopened);

            let root = self.core.adt.try_root()?;
            for leaf in self.core.adt.collect_leaves(root) {
                self.core.ensure_consistency(leaf)?;
            }
        }

        debug!(
            "refinement took {}, hypothesis has {} states",
            show_duration(start.elapsed()),
            self.core.hypothesis.size()
        );
        Ok(true)
    }

    /// Runs the complete learning loop: starts learning (unless that already happened) and
    /// refines the hypothesis with the counterexamples of `equivalence` until there are none.
    pub fn infer<E: EquivalenceOracle<I, O>>(
        &mut self,
        equivalence: &mut E,
    ) -> Result<MealyMachine<I, O>, LearnError> {
        let start = std::time::Instant::now();
        let threshold = std::env::var("MAX_ITERATIONS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(ITERATION_THRESHOLD);

        if self.core.hypothesis.size() == 0 {
            self.start_learning()?;
        }

        for iteration in 0..threshold {
            let Some(counterexample) = equivalence.find_counterexample(&self.core.hypothesis)
            else {
                info!(
                    "learned {} states in {} after {iteration} equivalence queries",
                    self.core.hypothesis.size(),
                    show_duration(start.elapsed())
                );
                return self.core.hypothesis.to_mealy();
            };
            trace!("iteration {iteration} with counterexample {counterexample:?}");
            if !self.refine_hypothesis(&counterexample)? {
                warn!("equivalence oracle returned spurious counterexample {counterexample:?}");
            }
        }

        Err(LearnError::IterationThreshold(threshold))
    }

    /// Adds `symbol` to the input alphabet and determines the transitions of all states on it.
    pub fn add_alphabet_symbol(&mut self, symbol: I) -> Result<(), LearnError> {
        let core = &mut self.core;
        core.alphabet.add_symbol(symbol);
        core.hypothesis.add_alphabet_symbol(symbol);
        core.observations.add_alphabet_symbol(symbol);

        let Some(root) = core.adt.root() else {
            return Ok(());
        };
        let states = core.hypothesis.state_ids().collect::<Vec<_>>();
        for state in states {
            if core.hypothesis.transition_id(state, symbol).is_none() {
                let t = core.hypothesis.create_open_transition(state, symbol, root);
                core.open_transitions.push_back(t);
            }
        }
        core.close_transitions()
    }

    /// Takes a snapshot of the hypothesis and the tree.
    pub fn suspend(&self) -> LearnerState<I, O> {
        LearnerState {
            hypothesis: self.core.hypothesis.clone(),
            adt: self.core.adt.clone(),
        }
    }

    /// Continues from a snapshot. The observation tree forgets its state mapping and learns the
    /// access sequences of the snapshot, with the outputs the snapshot's hypothesis predicts.
    pub fn resume(&mut self, state: LearnerState<I, O>) -> Result<(), LearnError> {
        if state.hypothesis.alphabet() != &self.core.alphabet {
            warn!(
                "resuming with alphabet {:?} while the learner uses {:?}",
                state.hypothesis.alphabet(),
                self.core.alphabet
            );
        }
        let LearnerState { hypothesis, adt } = state;
        let access = hypothesis
            .state_ids()
            .map(|q| {
                let word = hypothesis.access_sequence(q).to_vec();
                let output = hypothesis.compute_output(&word)?;
                Ok((q, word, output))
            })
            .collect::<Result<Vec<_>, LearnError>>()?;
        self.core.observations.initialize_from(access);
        self.core.hypothesis = hypothesis;
        self.core.adt = adt;
        self.core.open_transitions.clear();
        self.core.open_counterexamples.clear();
        Ok(())
    }
}

impl<I: Symbol, O: Color, A> std::fmt::Debug for AdtLearner<I, O, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hypothesis\n{:?}\ntree\n{:?}",
            self.core.hypothesis, self.core.adt
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        adt::{AdtNode, Ads},
        oracle::{MealyOracle, MealySul, SulOracle},
        strategy::{
            DefaultExtender, DefaultSplitter, ExhaustiveReplacer, ExtendParentSplitter,
            LevelOrderReplacer, LinearForward, LinearReverse, NeverReplace, NopExtender,
            Replacement, RivestSchapire, SingleReplacer,
        },
    };

    type Oracle = SulOracle<MealySul<char, u8>>;

    fn oracle(target: &MealyMachine<char, u8>) -> Oracle {
        SulOracle::new(MealySul::new(target.clone()))
    }

    fn ce(input: &str, output: &[u8]) -> Counterexample<char, u8> {
        Counterexample::new(input.chars().collect(), output.to_vec())
    }

    /// Outputs `a/0` and `b/1` everywhere, both states are equivalent.
    fn equivalent_states() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0, 0),
                (0, 'b', 1, 1),
                (1, 'a', 0, 0),
                (1, 'b', 1, 1),
            ])
            .into_mealy(0)
    }

    /// Like [`equivalent_states`], but `b` outputs 0 in the second state.
    fn two_states() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0, 0),
                (0, 'b', 1, 1),
                (1, 'a', 0, 0),
                (1, 'b', 0, 1),
            ])
            .into_mealy(0)
    }

    /// Like [`two_states`], but `a` outputs 1 in the second state.
    fn modified_two_states() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0, 0),
                (0, 'b', 1, 1),
                (1, 'a', 1, 0),
                (1, 'b', 0, 1),
            ])
            .into_mealy(0)
    }

    /// A counter modulo 4 on `a`, which only reports an overflow. `b` resets the counter and
    /// reports whether it was even.
    fn counter() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0, 1),
                (1, 'a', 0, 2),
                (2, 'a', 0, 3),
                (3, 'a', 1, 0),
                (0, 'b', 1, 0),
                (1, 'b', 0, 0),
                (2, 'b', 1, 0),
                (3, 'b', 0, 0),
            ])
            .into_mealy(0)
    }

    /// A combination lock that opens (outputs 1) after reading `abba`, every wrong symbol
    /// starts over. The lock stays open once it is open.
    fn lock() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0, 1),
                (0, 'b', 0, 0),
                (1, 'a', 0, 1),
                (1, 'b', 0, 2),
                (2, 'a', 0, 1),
                (2, 'b', 0, 3),
                (3, 'a', 1, 4),
                (3, 'b', 0, 0),
                (4, 'a', 1, 4),
                (4, 'b', 1, 4),
            ])
            .into_mealy(0)
    }

    fn targets() -> Vec<MealyMachine<char, u8>> {
        let mut out = vec![
            equivalent_states(),
            two_states(),
            modified_two_states(),
            counter(),
            lock(),
        ];
        #[cfg(feature = "random")]
        for seed in 0..4 {
            out.push(MealyMachine::random(
                alphabet!(simple 'a', 'b', 'c'),
                8,
                &[0, 1],
                seed,
            ));
        }
        out
    }

    fn assert_learned(model: &MealyMachine<char, u8>, target: &MealyMachine<char, u8>) {
        assert_eq!(
            crate::mealy::find_separating_word(model, target, target.alphabet()),
            None
        );
        #[cfg(feature = "minimize")]
        assert_eq!(model.size(), target.minimize().size());
    }

    fn assert_bijection(learner: &AdtLearner<char, u8, Oracle>) {
        let leaves = learner.adt().leaves_by_state().unwrap();
        assert_eq!(leaves.len(), learner.hypothesis_model().size());
        for state in learner.hypothesis_model().state_ids() {
            assert!(leaves.contains_left(&state));
        }
    }

    #[test_log::test]
    fn single_state_for_equivalent_states() {
        let target = equivalent_states();
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&target));
        learner.start_learning().unwrap();
        assert_eq!(learner.hypothesis_model().size(), 1);
        assert!(!learner.refine_hypothesis(&ce("bb", &[1, 1])).unwrap());
        assert_eq!(learner.hypothesis_model().size(), 1);
        assert!(learner.hypothesis_model().is_closed());
    }

    #[test_log::test]
    fn one_refinement_splits_the_root() {
        let target = two_states();
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&target));
        learner.start_learning().unwrap();
        assert_eq!(learner.hypothesis_model().size(), 1);
        assert!(learner.refine_hypothesis(&ce("bb", &[1, 0])).unwrap());

        let hypothesis = learner.hypothesis_model();
        assert_eq!(hypothesis.size(), 2);
        let (q0, q1) = (StateId::new(0), StateId::new(1));
        assert_eq!(hypothesis.access_sequence(q1), &['b']);
        let spanning = hypothesis
            .transition_ids()
            .filter(|t| hypothesis.transition(*t).is_spanning_tree_edge())
            .collect::<Vec<_>>();
        assert_eq!(spanning.len(), 1);
        assert_eq!(hypothesis.transition(spanning[0]).source(), q0);
        assert_eq!(hypothesis.transition(spanning[0]).input(), 'b');
        assert_eq!(hypothesis.successor(q0, 'a'), Some(q0));

        let adt = learner.adt();
        let root = adt.root().unwrap();
        assert_eq!(adt.symbol(root), Some('b'));
        assert_eq!(adt.effective_resets(root), 0);
        assert_eq!(adt.state(adt.child(root, &1).unwrap()), Some(q0));
        assert_eq!(adt.state(adt.child(root, &0).unwrap()), Some(q1));
        assert_bijection(&learner);
        assert_learned(&learner.hypothesis_model().to_mealy().unwrap(), &target);

        assert!(!learner.refine_hypothesis(&ce("bb", &[1, 0])).unwrap());
    }

    /// Proposes a fixed set of replacements.
    struct Fixed(Vec<Replacement<char, u8>>);

    impl SubtreeReplacer<char, u8> for Fixed {
        fn compute_replacements(
            &self,
            _hypothesis: &AdtHypothesis<char, u8>,
            _alphabet: &Alphabet<char>,
            _adt: &Adt<char, u8>,
        ) -> Vec<Replacement<char, u8>> {
            self.0.clone()
        }
    }

    #[test_log::test]
    fn verification_turns_deviations_into_counterexamples() {
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&two_states()));
        learner
            .infer(&mut MealyOracle::new(two_states()))
            .unwrap();
        let snapshot = learner.suspend();
        let root = snapshot.adt().root().unwrap();

        let (q0, q1) = (StateId::new(0), StateId::new(1));
        let candidate = Ads::symbol(
            'b',
            [
                (1, Ads::symbol('a', [(0, Ads::leaf(q0))])),
                (0, Ads::symbol('a', [(0, Ads::leaf(q1))])),
            ],
        );
        let target = modified_two_states();
        let mut resumed = AdtLearner::builder(alphabet!(simple 'a', 'b'), oracle(&target))
            .subtree_replacer(Fixed(vec![Replacement::new(root, candidate)]))
            .build();
        resumed.resume(snapshot).unwrap();
        let arena = resumed.adt().arena_size();

        resumed.evaluate_subtree_replacement().unwrap();
        assert_eq!(
            resumed
                .core
                .open_counterexamples
                .iter()
                .cloned()
                .collect::<Vec<_>>(),
            vec![ce("bba", &[1, 0, 1]), ce("ba", &[1, 1])]
        );
        // the verified tree has no fewer resets, so nothing was installed
        let adt = resumed.adt();
        assert_eq!(adt.root(), Some(root));
        assert!(adt.arena_size() > arena);
        assert!(matches!(adt.node(root), AdtNode::Symbol { symbol: 'b', .. }));
        assert_eq!(adt.state(adt.child(root, &1).unwrap()), Some(q0));
        assert_eq!(adt.state(adt.child(root, &0).unwrap()), Some(q1));
        assert_bijection(&resumed);
    }

    #[test_log::test]
    fn resuming_continues_learning() {
        let target = lock();
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&target));
        learner.start_learning().unwrap();
        learner.refine_hypothesis(&ce("abba", &[0, 0, 0, 1])).unwrap();
        let snapshot = learner.suspend();
        let size = snapshot.hypothesis().size();
        assert!(size > 1);

        let mut resumed = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&target));
        resumed.resume(snapshot).unwrap();
        assert_eq!(resumed.hypothesis_model().size(), size);
        assert_eq!(resumed.oracle().queries(), 0);
        let model = resumed.infer(&mut MealyOracle::new(target.clone())).unwrap();
        assert_learned(&model, &target);
    }

    #[test_log::test]
    fn closing_defined_transitions_poses_no_queries() {
        let target = counter();
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&target));
        learner.infer(&mut MealyOracle::new(target.clone())).unwrap();
        let queries = learner.oracle().queries();
        let states = learner.hypothesis_model().state_ids().collect::<Vec<_>>();
        for state in states {
            for input in ['a', 'b'] {
                assert!(learner.core.is_transition_defined(state, input));
                learner.core.close_transition(state, input).unwrap();
            }
        }
        assert_eq!(learner.oracle().queries(), queries);
        assert_bijection(&learner);
    }

    #[test_log::test]
    fn closing_a_batch_of_defined_transitions_poses_no_queries() {
        let target = counter();
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&target));
        learner.infer(&mut MealyOracle::new(target.clone())).unwrap();
        let count = |learner: &AdtLearner<char, u8, Oracle>| {
            let oracle = learner.oracle();
            (oracle.queries(), oracle.sessions(), oracle.symbols())
        };
        let before = count(&learner);
        let size = learner.hypothesis_model().size();

        assert!(learner.core.open_transitions.is_empty());
        learner.core.close_transitions().unwrap();
        assert_eq!(count(&learner), before);

        let all = learner.hypothesis_model().transition_ids().collect::<Vec<_>>();
        learner.core.open_transitions.extend(all.iter().copied());
        learner.core.open_transitions.extend(all);
        learner.core.close_transitions().unwrap();
        assert_eq!(count(&learner), before);
        assert!(learner.core.open_transitions.is_empty());
        assert_eq!(learner.hypothesis_model().size(), size);
        assert!(learner.hypothesis_model().is_closed());
    }

    /// `aa` tells all four states apart: `q0` outputs `00`, `q1` `01`, `q2` `11` and `q3` `10`.
    fn four_states() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0, 1),
                (0, 'b', 0, 2),
                (1, 'a', 0, 3),
                (1, 'b', 1, 1),
                (2, 'a', 1, 2),
                (2, 'b', 0, 3),
                (3, 'a', 1, 0),
                (3, 'b', 1, 3),
            ])
            .into_mealy(0)
    }

    /// Like [`four_states`], but `a` leads from the fourth state into a fifth one, which
    /// outputs 2 on `a`.
    fn five_states() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0, 1),
                (0, 'b', 0, 2),
                (1, 'a', 0, 3),
                (1, 'b', 1, 1),
                (2, 'a', 1, 2),
                (2, 'b', 0, 3),
                (3, 'a', 1, 4),
                (3, 'b', 1, 3),
                (4, 'a', 2, 4),
                (4, 'b', 0, 0),
            ])
            .into_mealy(0)
    }

    /// The correct hypothesis for [`four_states`], with a tree that splits on `a` and tells the
    /// states apart with `b` behind two reset nodes.
    fn snapshot_with_resets() -> LearnerState<char, u8> {
        let mut hypothesis = AdtHypothesis::new(alphabet!(simple 'a', 'b'));
        let q0 = hypothesis.add_initial_state();
        let q1 = hypothesis.add_state(vec!['a']);
        let q2 = hypothesis.add_state(vec!['b']);
        let q3 = hypothesis.add_state(vec!['a', 'a']);

        let mut adt = Adt::new();
        let first = adt.initialize(q0);
        let top = adt.add_symbol_node('a');
        for (output, low, high) in [(0, q0, q1), (1, q2, q3)] {
            let separator = adt.add_symbol_node('b');
            adt.add_leaf(separator, 0, low).unwrap();
            adt.add_leaf(separator, 1, high).unwrap();
            let reset = adt.add_reset_node(separator);
            adt.attach(top, output, reset).unwrap();
        }
        adt.replace_node(first, top).unwrap();

        for (source, input, output, target) in [
            (q0, 'a', 0, q1),
            (q0, 'b', 0, q2),
            (q1, 'a', 0, q3),
            (q1, 'b', 1, q1),
            (q2, 'a', 1, q2),
            (q2, 'b', 0, q3),
            (q3, 'a', 1, q0),
            (q3, 'b', 1, q3),
        ] {
            let mut access = hypothesis.access_sequence(source).to_vec();
            access.push(input);
            let spanning = hypothesis.access_sequence(target) == &access[..];
            let t = hypothesis.create_open_transition(source, input, top);
            hypothesis.set_output(t, output);
            hypothesis.set_target(t, Some(target));
            hypothesis.set_spanning_tree_edge(t, spanning);
        }
        LearnerState { hypothesis, adt }
    }

    #[test_log::test]
    fn level_order_replacement_saves_resets() {
        let target = four_states();
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&target));
        learner.resume(snapshot_with_resets()).unwrap();
        let root = learner.adt().root().unwrap();
        assert_eq!(learner.adt().effective_resets(root), 4);

        learner.evaluate_subtree_replacement().unwrap();
        let adt = learner.adt();
        let installed = adt.root().unwrap();
        assert!(adt.effective_resets(installed) < 4);
        assert!(learner.core.open_counterexamples.is_empty());
        assert!(learner.core.open_transitions.is_empty());
        assert!(learner.hypothesis_model().is_closed());
        assert_eq!(learner.hypothesis_model().size(), 4);
        assert_bijection(&learner);
        assert_learned(&learner.hypothesis_model().to_mealy().unwrap(), &target);
    }

    /// `aa` as an ADS for the states of [`snapshot_with_resets`].
    fn preset_aa() -> Ads<char, u8> {
        let q = StateId::new;
        Ads::symbol(
            'a',
            [
                (0, Ads::symbol('a', [(0, Ads::leaf(q(0))), (1, Ads::leaf(q(1)))])),
                (1, Ads::symbol('a', [(0, Ads::leaf(q(3))), (1, Ads::leaf(q(2)))])),
            ],
        )
    }

    #[test_log::test]
    fn cheaper_replacement_is_installed_as_observed() {
        let sut = five_states();
        let snapshot = snapshot_with_resets();
        let root = snapshot.adt().root().unwrap();
        let mut learner = AdtLearner::builder(alphabet!(simple 'a', 'b'), oracle(&sut))
            .subtree_replacer(Fixed(vec![Replacement::new(root, preset_aa())]))
            .build();
        learner.resume(snapshot).unwrap();

        learner.evaluate_subtree_replacement().unwrap();
        let divergence = ce("aaaa", &[0, 0, 1, 2]);
        assert_eq!(
            learner.core.open_counterexamples.iter().collect::<Vec<_>>(),
            vec![&divergence]
        );

        // the third state answers `12` instead of the predicted `10`
        let adt = learner.adt();
        let installed = adt.root().unwrap();
        assert_ne!(installed, root);
        assert!(!adt.is_reachable(root));
        assert_eq!(adt.effective_resets(installed), 0);
        let high = adt.child(installed, &1).unwrap();
        assert_eq!(adt.state(adt.child(high, &2).unwrap()), Some(StateId::new(3)));
        assert_eq!(adt.child(high, &0), None);
        assert_eq!(adt.state(adt.child(high, &1).unwrap()), Some(StateId::new(2)));

        // resifting the transitions into the replaced states discovers the fifth state
        assert_eq!(adt.state(adt.child(installed, &2).unwrap()), Some(StateId::new(4)));
        let hypothesis = learner.hypothesis_model();
        assert_eq!(hypothesis.size(), 5);
        assert_eq!(hypothesis.access_sequence(StateId::new(4)), &['a', 'a', 'a']);
        assert!(hypothesis.is_closed());
        assert!(!divergence.is_counterexample_for(hypothesis));
        assert_bijection(&learner);
        assert_learned(&hypothesis.to_mealy().unwrap(), &sut);
    }

    #[test_log::test]
    fn colliding_traces_are_separated_behind_a_reset() {
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&two_states()));
        learner
            .infer(&mut MealyOracle::new(two_states()))
            .unwrap();
        let snapshot = learner.suspend();

        // both states output 1 on `b` in the system
        let mut resumed = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&equivalent_states()));
        resumed.resume(snapshot).unwrap();
        let root = resumed.adt().root().unwrap();
        let leaves = resumed.adt().leaves_by_state().unwrap();
        let (q0, q1) = (StateId::new(0), StateId::new(1));
        let candidate = Ads::symbol('b', [(1, Ads::leaf(q0)), (0, Ads::leaf(q1))]);

        let verified = resumed
            .core
            .verify_ads(root, &candidate, &leaves, &BTreeSet::new())
            .unwrap();
        assert_eq!(
            resumed.core.open_counterexamples.iter().collect::<Vec<_>>(),
            vec![&ce("bb", &[1, 1])]
        );

        let adt = resumed.adt();
        assert_eq!(adt.root(), Some(root));
        assert_eq!(adt.symbol(verified), Some('b'));
        assert_eq!(adt.child(verified, &0), None);
        let reset = adt.child(verified, &1).unwrap();
        let AdtNode::Reset { successor, .. } = adt.node(reset) else {
            panic!("{reset:?} is no reset node");
        };
        // the current tree tells them apart by the output of `b` at its root
        assert_eq!(adt.symbol(*successor), Some('b'));
        assert_eq!(adt.state(adt.child(*successor, &0).unwrap()), Some(q1));
        assert_eq!(adt.state(adt.child(*successor, &1).unwrap()), Some(q0));
        assert_eq!(adt.effective_resets(verified), 2);
        assert_eq!(adt.collect_states(verified), BTreeSet::from([q0, q1]));
    }

    #[test_log::test]
    fn snapshots_and_oracles_print() {
        let target = two_states();
        let mut learner = AdtLearner::new(alphabet!(simple 'a', 'b'), oracle(&target));
        learner.infer(&mut MealyOracle::new(target.clone())).unwrap();

        let snapshot = format!("{:?}", learner.suspend());
        assert!(snapshot.starts_with("hypothesis\n"));
        assert!(snapshot.contains("\ntree\n"));
        assert!(format!("{:?}", learner.observations()).starts_with("ObservationTree"));
        assert!(format!("{:?}", learner.oracle().sul()).starts_with("in state "));
        assert!(format!("{:?}", MealyOracle::new(target)).starts_with("MealyOracle"));
    }

    #[test_log::test]
    fn growing_the_alphabet() {
        let target = counter();
        let only_a = MealyMachine::builder()
            .with_transitions([(0, 'a', 0, 1), (1, 'a', 0, 2), (2, 'a', 0, 3), (3, 'a', 1, 0)])
            .into_mealy(0);
        let mut learner = AdtLearner::new(alphabet!(simple 'a'), oracle(&target));
        let model = learner.infer(&mut MealyOracle::new(only_a.clone())).unwrap();
        assert_learned(&model, &only_a);

        learner.add_alphabet_symbol('b').unwrap();
        assert!(learner.hypothesis_model().is_closed());
        assert_eq!(learner.alphabet().size(), 2);
        let model = learner.infer(&mut MealyOracle::new(target.clone())).unwrap();
        assert_learned(&model, &target);
        assert_bijection(&learner);
    }

    fn splitter(i: usize) -> Box<dyn LeafSplitter<char, u8>> {
        match i {
            0 => Box::new(DefaultSplitter),
            _ => Box::new(ExtendParentSplitter),
        }
    }

    fn extender(i: usize) -> Box<dyn AdtExtender<char, u8>> {
        match i {
            0 => Box::new(NopExtender),
            _ => Box::new(DefaultExtender),
        }
    }

    fn replacer(i: usize) -> Box<dyn SubtreeReplacer<char, u8>> {
        match i {
            0 => Box::new(NeverReplace),
            1 => Box::new(SingleReplacer),
            2 => Box::new(ExhaustiveReplacer),
            _ => Box::new(LevelOrderReplacer),
        }
    }

    fn suffix_finder(i: usize) -> Box<dyn LocalSuffixFinder<char, u8>> {
        match i {
            0 => Box::new(RivestSchapire),
            1 => Box::new(LinearForward),
            _ => Box::new(LinearReverse),
        }
    }

    #[test_log::test]
    fn every_strategy_combination_learns() {
        for target in targets() {
            for (s, e, r) in itertools::iproduct!(0..2, 0..2, 0..4) {
                let mut learner = AdtLearner::builder(target.alphabet().clone(), oracle(&target))
                    .boxed_leaf_splitter(splitter(s))
                    .boxed_extender(extender(e))
                    .boxed_subtree_replacer(replacer(r))
                    .build();
                let model = learner
                    .infer(&mut MealyOracle::new(target.clone()))
                    .unwrap();
                assert_learned(&model, &target);
                assert_bijection(&learner);
            }
        }
    }

    #[test_log::test]
    fn suffix_finders_and_caching() {
        for target in targets() {
            for (f, cache) in itertools::iproduct!(0..3, [true, false]) {
                let mut learner = AdtLearner::builder(target.alphabet().clone(), oracle(&target))
                    .boxed_suffix_finder(suffix_finder(f))
                    .use_observation_tree(cache)
                    .build();
                let model = learner
                    .infer(&mut MealyOracle::new(target.clone()))
                    .unwrap();
                assert_learned(&model, &target);
                assert_bijection(&learner);
            }
        }
    }
}
