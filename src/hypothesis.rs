use std::{collections::BTreeSet, fmt::Debug};

use itertools::Itertools;

use crate::{
    alphabet::{Alphabet, Color, Symbol},
    error::LearnError,
    id::{NodeId, StateId, TransitionId},
    math,
    mealy::{Mealy, MealyMachine},
    show::Show,
};

/// A state of the hypothesis.
#[derive(Debug, Clone)]
pub struct HypothesisState<I> {
    access_sequence: Vec<I>,
    transitions: math::Map<I, TransitionId>,
    incoming: BTreeSet<TransitionId>,
}

impl<I: Symbol> HypothesisState<I> {
    /// The word that leads from the initial state to this state. It never changes.
    pub fn access_sequence(&self) -> &[I] {
        &self.access_sequence
    }

    /// The transitions whose target is this state.
    pub fn incoming(&self) -> impl Iterator<Item = TransitionId> + '_ {
        self.incoming.iter().copied()
    }
}

/// A transition of the hypothesis. As long as its target is unknown, it remembers the node of
/// the ADT where sifting has to start.
#[derive(Debug, Clone)]
pub struct HypothesisTransition<I, O> {
    source: StateId,
    input: I,
    target: Option<StateId>,
    output: Option<O>,
    sift_node: Option<NodeId>,
    spanning_tree: bool,
}

impl<I: Symbol, O: Color> HypothesisTransition<I, O> {
    pub fn source(&self) -> StateId {
        self.source
    }

    pub fn input(&self) -> I {
        self.input
    }

    pub fn target(&self) -> Option<StateId> {
        self.target
    }

    pub fn output(&self) -> Option<&O> {
        self.output.as_ref()
    }

    pub fn sift_node(&self) -> Option<NodeId> {
        self.sift_node
    }

    /// Returns true if the target of this transition was discovered through it, such
    /// transitions are never sifted again.
    pub fn is_spanning_tree_edge(&self) -> bool {
        self.spanning_tree
    }

    /// Returns true if the target is unknown.
    pub fn needs_sifting(&self) -> bool {
        self.target.is_none()
    }
}

/// The hypothesis of the ADT learner: a partial Mealy machine whose states carry access
/// sequences and whose transitions are either closed or still waiting to be sifted.
#[derive(Clone)]
pub struct AdtHypothesis<I, O> {
    alphabet: Alphabet<I>,
    states: Vec<HypothesisState<I>>,
    transitions: Vec<HypothesisTransition<I, O>>,
}

impl<I: Symbol, O: Color> AdtHypothesis<I, O> {
    pub fn new(alphabet: Alphabet<I>) -> Self {
        Self {
            alphabet,
            states: vec![],
            transitions: vec![],
        }
    }

    pub fn alphabet(&self) -> &Alphabet<I> {
        &self.alphabet
    }

    pub fn add_alphabet_symbol(&mut self, symbol: I) {
        self.alphabet.add_symbol(symbol);
    }

    /// Adds a state with the given access sequence. The first state that is added is the
    /// initial one.
    pub fn add_state(&mut self, access_sequence: Vec<I>) -> StateId {
        self.states.push(HypothesisState {
            access_sequence,
            transitions: math::Map::default(),
            incoming: BTreeSet::new(),
        });
        StateId::new(self.states.len() - 1)
    }

    /// Adds the initial state, whose access sequence is empty.
    pub fn add_initial_state(&mut self) -> StateId {
        self.add_state(vec![])
    }

    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        (0..self.states.len()).map(StateId::new)
    }

    pub fn state(&self, id: StateId) -> &HypothesisState<I> {
        &self.states[id.index()]
    }

    pub fn access_sequence(&self, id: StateId) -> &[I] {
        self.state(id).access_sequence()
    }

    pub fn transition(&self, id: TransitionId) -> &HypothesisTransition<I, O> {
        &self.transitions[id.index()]
    }

    pub fn transition_ids(&self) -> impl Iterator<Item = TransitionId> {
        (0..self.transitions.len()).map(TransitionId::new)
    }

    /// The transition leaving `state` on `input`, if it was created yet.
    pub fn transition_id(&self, state: StateId, input: I) -> Option<TransitionId> {
        self.states.get(state.index())?.transitions.get(&input).copied()
    }

    /// Opens the transition from `source` on `input`, which has to be sifted starting in
    /// `sift_node`. An existing transition is reused and loses its target.
    pub fn create_open_transition(
        &mut self,
        source: StateId,
        input: I,
        sift_node: NodeId,
    ) -> TransitionId {
        match self.transition_id(source, input) {
            Some(id) => {
                self.set_target(id, None);
                self.transitions[id.index()].sift_node = Some(sift_node);
                id
            }
            None => {
                self.transitions.push(HypothesisTransition {
                    source,
                    input,
                    target: None,
                    output: None,
                    sift_node: Some(sift_node),
                    spanning_tree: false,
                });
                let id = TransitionId::new(self.transitions.len() - 1);
                self.states[source.index()].transitions.insert(input, id);
                id
            }
        }
    }

    /// Sets (or clears) the target of a transition and keeps the incoming transitions of the
    /// states up to date. A transition with a target needs no sift node.
    pub fn set_target(&mut self, id: TransitionId, target: Option<StateId>) {
        let transition = &mut self.transitions[id.index()];
        let previous = std::mem::replace(&mut transition.target, target);
        if target.is_some() {
            transition.sift_node = None;
        }
        if let Some(previous) = previous {
            self.states[previous.index()].incoming.remove(&id);
        }
        if let Some(target) = target {
            self.states[target.index()].incoming.insert(id);
        }
    }

    pub fn set_output(&mut self, id: TransitionId, output: O) {
        self.transitions[id.index()].output = Some(output);
    }

    pub fn set_sift_node(&mut self, id: TransitionId, node: NodeId) {
        self.transitions[id.index()].sift_node = Some(node);
    }

    pub fn set_spanning_tree_edge(&mut self, id: TransitionId, spanning: bool) {
        self.transitions[id.index()].spanning_tree = spanning;
    }

    /// The incoming transitions of `state` that are not part of the spanning tree.
    pub fn incoming_non_spanning(&self, state: StateId) -> Vec<TransitionId> {
        self.state(state)
            .incoming()
            .filter(|t| !self.transition(*t).is_spanning_tree_edge())
            .collect()
    }

    /// Returns true if every transition of every state is closed.
    pub fn is_closed(&self) -> bool {
        self.state_ids().all(|q| {
            self.alphabet.universe().all(|sym| {
                self.transition_id(q, sym)
                    .is_some_and(|t| !self.transition(t).needs_sifting())
            })
        })
    }

    /// The outputs the hypothesis produces on `word`, fails if a transition is undefined.
    pub fn compute_output(&self, word: &[I]) -> Result<Vec<O>, LearnError> {
        self.transform(word).ok_or_else(|| {
            LearnError::UndefinedHypothesis(format!("cannot compute output of {}", word.show()))
        })
    }

    /// The outputs on `input` from `state`, fails if a transition is undefined.
    pub fn compute_state_output(&self, state: StateId, input: &[I]) -> Result<Vec<O>, LearnError> {
        self.transform_from(state, input).ok_or_else(|| {
            LearnError::UndefinedHypothesis(format!(
                "cannot compute output of {} from {}",
                input.show(),
                state.show()
            ))
        })
    }

    /// The state reached on `word`, fails if a transition is undefined.
    pub fn state_of(&self, word: &[I]) -> Result<StateId, LearnError> {
        self.reached(word).ok_or_else(|| {
            LearnError::UndefinedHypothesis(format!("{} does not reach a state", word.show()))
        })
    }

    /// Copies the hypothesis into a [`MealyMachine`], which requires all transitions to be
    /// closed.
    pub fn to_mealy(&self) -> Result<MealyMachine<I, O>, LearnError> {
        if self.states.is_empty() {
            return Err(LearnError::UndefinedHypothesis("no states".into()));
        }
        let mut mm = MealyMachine::with_states(self.alphabet.clone(), self.states.len(), 0);
        for q in self.state_ids() {
            for sym in self.alphabet.universe() {
                let (Some(output), Some(target)) = (self.output(q, sym), self.successor(q, sym))
                else {
                    return Err(LearnError::UndefinedHypothesis(format!(
                        "transition from {} on {} is open",
                        q.show(),
                        sym.show()
                    )));
                };
                mm.add_transition(q.index(), sym, output, target.index());
            }
        }
        Ok(mm)
    }
}

impl<I: Symbol, O: Color> Mealy<I, O> for AdtHypothesis<I, O> {
    type StateIndex = StateId;

    fn initial(&self) -> Option<StateId> {
        (!self.states.is_empty()).then(|| StateId::new(0))
    }

    fn successor(&self, state: StateId, input: I) -> Option<StateId> {
        self.transition(self.transition_id(state, input)?).target
    }

    fn output(&self, state: StateId, input: I) -> Option<O> {
        self.transition(self.transition_id(state, input)?)
            .output
            .clone()
    }

    fn size(&self) -> usize {
        self.states.len()
    }
}

impl<I: Symbol, O: Color> Debug for AdtHypothesis<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(
            ["State".to_string(), "Access".to_string()]
                .into_iter()
                .chain(self.alphabet.universe().map(|sym| sym.show())),
        );
        for q in self.state_ids() {
            let mut row = vec![q.show(), self.access_sequence(q).show()];
            for sym in self.alphabet.universe() {
                let cell = match self.transition_id(q, sym).map(|t| self.transition(t)) {
                    None => "-".to_string(),
                    Some(t) => {
                        let target = match (t.target, t.sift_node) {
                            (Some(target), _) => target.show(),
                            (None, Some(node)) => format!("?{node:?}"),
                            (None, None) => "?".to_string(),
                        };
                        let marker = if t.spanning_tree { "*" } else { "" };
                        format!("{}/{}{}", t.output.show(), target, marker)
                    }
                };
                row.push(cell);
            }
            builder.push_record(row);
        }
        write!(
            f,
            "{}",
            builder
                .build()
                .with(tabled::settings::Style::rounded())
        )
    }
}

impl<I: Symbol, O: Color> AdtHypothesis<I, O> {
    /// Lists all transitions that are currently open, in order of creation.
    pub fn open_transitions(&self) -> Vec<TransitionId> {
        self.transition_ids()
            .filter(|t| self.transition(*t).needs_sifting())
            .collect_vec()
    }
}
