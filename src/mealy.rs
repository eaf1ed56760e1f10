use std::{collections::VecDeque, fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::{
    alphabet::{Alphabet, Color, Symbol},
    math,
};

/// A read-only view on a deterministic Mealy machine, which may be partial. Both the hypothesis
/// of the learner and the concrete [`MealyMachine`] implement this trait, which is all that is
/// needed to compare them or to run words through them.
pub trait Mealy<I: Symbol, O: Color> {
    /// The type used for identifying states.
    type StateIndex: Copy + Eq + Ord + Hash + Debug;

    /// The initial state, if there is one.
    fn initial(&self) -> Option<Self::StateIndex>;

    /// The state that is reached from `state` on `input`.
    fn successor(&self, state: Self::StateIndex, input: I) -> Option<Self::StateIndex>;

    /// The output that is emitted when reading `input` in `state`.
    fn output(&self, state: Self::StateIndex, input: I) -> Option<O>;

    /// The number of states.
    fn size(&self) -> usize;

    /// Runs `word` from `state` and returns the reached state.
    fn reached_from(&self, state: Self::StateIndex, word: &[I]) -> Option<Self::StateIndex> {
        word.iter()
            .try_fold(state, |current, &symbol| self.successor(current, symbol))
    }

    /// Runs `word` from the initial state and returns the reached state.
    fn reached(&self, word: &[I]) -> Option<Self::StateIndex> {
        self.reached_from(self.initial()?, word)
    }

    /// Runs `word` from `state` and collects the emitted outputs.
    fn transform_from(&self, state: Self::StateIndex, word: &[I]) -> Option<Vec<O>> {
        let mut current = state;
        let mut out = Vec::with_capacity(word.len());
        for &symbol in word {
            out.push(self.output(current, symbol)?);
            current = self.successor(current, symbol)?;
        }
        Some(out)
    }

    /// Runs `word` from the initial state and collects the emitted outputs.
    fn transform(&self, word: &[I]) -> Option<Vec<O>> {
        self.transform_from(self.initial()?, word)
    }

    /// Runs `prefix` from the initial state and returns only the outputs emitted on `suffix`
    /// afterwards.
    fn transform_suffix(&self, prefix: &[I], suffix: &[I]) -> Option<Vec<O>> {
        self.transform_from(self.reached(prefix)?, suffix)
    }
}

/// Searches a shortest word on which `left` started in `left_state` and `right` started in
/// `right_state` produce different outputs. Transitions that are undefined in either machine are
/// not explored.
pub fn separating_word_from<I, O, L, R>(
    left: &L,
    left_state: L::StateIndex,
    right: &R,
    right_state: R::StateIndex,
    alphabet: &Alphabet<I>,
) -> Option<Vec<I>>
where
    I: Symbol,
    O: Color,
    L: Mealy<I, O>,
    R: Mealy<I, O>,
{
    let mut seen = math::Set::default();
    seen.insert((left_state, right_state));
    let mut queue = VecDeque::from([(left_state, right_state, vec![])]);

    while let Some((l, r, word)) = queue.pop_front() {
        for symbol in alphabet.universe() {
            let (Some(lo), Some(ro)) = (left.output(l, symbol), right.output(r, symbol)) else {
                continue;
            };
            let mut extended = word.clone();
            extended.push(symbol);
            if lo != ro {
                return Some(extended);
            }
            let (Some(ls), Some(rs)) = (left.successor(l, symbol), right.successor(r, symbol))
            else {
                continue;
            };
            if seen.insert((ls, rs)) {
                queue.push_back((ls, rs, extended));
            }
        }
    }
    None
}

/// Searches a shortest word on which the two machines differ when started in their initial states.
pub fn find_separating_word<I, O, L, R>(left: &L, right: &R, alphabet: &Alphabet<I>) -> Option<Vec<I>>
where
    I: Symbol,
    O: Color,
    L: Mealy<I, O>,
    R: Mealy<I, O>,
{
    separating_word_from(left, left.initial()?, right, right.initial()?, alphabet)
}

/// A deterministic Mealy machine with states `0..size`. It is mostly used as the target that is
/// simulated during tests and benchmarks, and as the materialized form of a hypothesis.
#[derive(Clone)]
pub struct MealyMachine<I, O> {
    alphabet: Alphabet<I>,
    initial: usize,
    // outgoing transitions per state, mapping each input to its output and target
    transitions: Vec<math::Map<I, (O, usize)>>,
}

impl<I: Symbol, O: Color> MealyMachine<I, O> {
    /// Creates a machine with `size` states and no transitions.
    pub fn with_states(alphabet: Alphabet<I>, size: usize, initial: usize) -> Self {
        assert!(initial < size, "initial state {initial} does not exist");
        Self {
            alphabet,
            initial,
            transitions: vec![math::Map::default(); size],
        }
    }

    /// Returns a [`MealyBuilder`].
    pub fn builder() -> MealyBuilder<I, O> {
        MealyBuilder { edges: vec![] }
    }

    /// The input alphabet.
    pub fn alphabet(&self) -> &Alphabet<I> {
        &self.alphabet
    }

    /// Adds a state and returns its index.
    pub fn add_state(&mut self) -> usize {
        self.transitions.push(math::Map::default());
        self.transitions.len() - 1
    }

    /// Inserts or overwrites the transition from `source` on `input`.
    pub fn add_transition(&mut self, source: usize, input: I, output: O, target: usize) {
        assert!(target < self.transitions.len(), "target {target} does not exist");
        self.alphabet.add_symbol(input);
        self.transitions[source].insert(input, (output, target));
    }

    /// Returns true if every state has a transition for every symbol.
    pub fn is_complete(&self) -> bool {
        self.transitions
            .iter()
            .all(|edges| self.alphabet.universe().all(|sym| edges.contains_key(&sym)))
    }

    /// Returns the states reachable from the initial state, in breadth-first order.
    pub fn reachable_states(&self) -> Vec<usize> {
        let mut seen = math::Set::default();
        seen.insert(self.initial);
        let mut order = vec![self.initial];
        let mut next = 0;
        while next < order.len() {
            let state = order[next];
            next += 1;
            for symbol in self.alphabet.universe() {
                if let Some((_, target)) = self.transitions[state].get(&symbol) {
                    if seen.insert(*target) {
                        order.push(*target);
                    }
                }
            }
        }
        order
    }

    /// Computes the minimal Mealy machine that is equivalent to `self` through partition
    /// refinement. Unreachable states are dropped and the states of the result are numbered in
    /// breadth-first order from the initial state.
    #[cfg(feature = "minimize")]
    pub fn minimize(&self) -> Self {
        let reachable = self.reachable_states();
        let symbols = self.alphabet.symbols();
        let mut class: math::Map<usize, usize> = reachable.iter().map(|&q| (q, 0)).collect();
        let mut classes = 1;

        loop {
            let mut signatures: math::Map<(usize, Vec<Option<(O, usize)>>), usize> =
                math::Map::default();
            let mut refined = math::Map::default();
            for &q in &reachable {
                let signature = symbols
                    .iter()
                    .map(|sym| {
                        self.transitions[q]
                            .get(sym)
                            .map(|(out, target)| (out.clone(), class[target]))
                    })
                    .collect_vec();
                let next = signatures.len();
                let id = *signatures.entry((class[&q], signature)).or_insert(next);
                refined.insert(q, id);
            }
            class = refined;
            if signatures.len() == classes {
                break;
            }
            classes = signatures.len();
        }

        let mut renumbering = math::Map::default();
        for &q in &reachable {
            let next = renumbering.len();
            renumbering.entry(class[&q]).or_insert(next);
        }
        let mut out = Self::with_states(self.alphabet.clone(), renumbering.len(), 0);
        for &q in &reachable {
            let source = renumbering[&class[&q]];
            for (sym, (output, target)) in &self.transitions[q] {
                out.transitions[source].insert(*sym, (output.clone(), renumbering[&class[target]]));
            }
        }
        out
    }

    /// Generates a complete machine with `size` states over `alphabet`, in which every state is
    /// reachable. Outputs are drawn uniformly from `outputs`.
    #[cfg(feature = "random")]
    pub fn random(alphabet: Alphabet<I>, size: usize, outputs: &[O], seed: u64) -> Self {
        assert!(size > 0 && !alphabet.is_empty() && !outputs.is_empty());
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut out = Self::with_states(alphabet, size, 0);
        let symbols = out.alphabet.symbols().to_vec();
        let output = |rng: &mut fastrand::Rng| outputs[rng.usize(..outputs.len())].clone();

        // spanning tree first, so that every state is reachable
        let mut free = symbols.iter().map(|&sym| (0, sym)).collect_vec();
        for target in 1..size {
            let (source, sym) = free.swap_remove(rng.usize(..free.len()));
            let emitted = output(&mut rng);
            out.transitions[source].insert(sym, (emitted, target));
            free.extend(symbols.iter().map(|&sym| (target, sym)));
        }
        for (source, sym) in free {
            let emitted = output(&mut rng);
            out.transitions[source].insert(sym, (emitted, rng.usize(..size)));
        }
        out
    }
}

impl<I: Symbol, O: Color> Mealy<I, O> for MealyMachine<I, O> {
    type StateIndex = usize;

    fn initial(&self) -> Option<usize> {
        Some(self.initial)
    }

    fn successor(&self, state: usize, input: I) -> Option<usize> {
        self.transitions.get(state)?.get(&input).map(|(_, q)| *q)
    }

    fn output(&self, state: usize, input: I) -> Option<O> {
        self.transitions
            .get(state)?
            .get(&input)
            .map(|(o, _)| o.clone())
    }

    fn size(&self) -> usize {
        self.transitions.len()
    }
}

impl<I: Symbol, O: Color> Debug for MealyMachine<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mealy machine with initial state {}", self.initial)?;
        for (source, edges) in self.transitions.iter().enumerate() {
            let line = self
                .alphabet
                .universe()
                .filter_map(|sym| {
                    edges
                        .get(&sym)
                        .map(|(o, q)| format!("{}/{} -> {q}", sym.show(), o.show()))
                })
                .join(", ");
            writeln!(f, "{source}: {line}")?;
        }
        Ok(())
    }
}

/// Collects transitions of the form `(source, input, output, target)` and turns them into a
/// [`MealyMachine`].
#[derive(Clone, Debug)]
pub struct MealyBuilder<I, O> {
    edges: Vec<(usize, I, O, usize)>,
}

impl<I: Symbol, O: Color> MealyBuilder<I, O> {
    /// Adds the given transitions.
    pub fn with_transitions<X: IntoIterator<Item = (usize, I, O, usize)>>(
        mut self,
        transitions: X,
    ) -> Self {
        self.edges.extend(transitions);
        self
    }

    /// Builds the machine with the given initial state. The alphabet consists of all symbols
    /// that occur on some transition, in order of their first occurrence.
    pub fn into_mealy(self, initial: usize) -> MealyMachine<I, O> {
        let size = self
            .edges
            .iter()
            .flat_map(|(p, _, _, q)| [*p, *q])
            .chain([initial])
            .max()
            .unwrap_or(0)
            + 1;
        let alphabet = Alphabet::new(self.edges.iter().map(|(_, sym, _, _)| *sym));
        let mut mm = MealyMachine::with_states(alphabet, size, initial);
        for (source, sym, output, target) in self.edges {
            assert!(
                mm.transitions[source].insert(sym, (output, target)).is_none(),
                "transition from {source} on {} is given twice",
                sym.show()
            );
        }
        mm
    }
}
