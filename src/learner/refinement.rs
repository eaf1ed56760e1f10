use itertools::Itertools;
use tracing::debug;

use crate::{
    alphabet::{Color, Symbol},
    cache::ObservationTree,
    error::LearnError,
    id::StateId,
    oracle::{AdaptiveOracle, Counterexample, MembershipOracle, MembershipWrapper},
    show::Show,
};

use super::AdtLearner;

fn observed<I: Symbol, O: Color, A>(
    observations: &ObservationTree<I, O, A>,
    state: StateId,
    input: &[I],
) -> Result<Vec<O>, LearnError> {
    observations.trace(state, input).ok_or_else(|| {
        LearnError::MissingObservation(format!(
            "no outputs of {} on {}",
            state.show(),
            input.show()
        ))
    })
}

impl<I: Symbol, O: Color, A: AdaptiveOracle<I, O>> AdtLearner<I, O, A> {
    /// Uses `counterexample` to add one state to the hypothesis. Returns false if the
    /// hypothesis already agrees with the counterexample.
    ///
    /// The counterexample is decomposed into `u·a·v` such that `v` tells apart the state the
    /// hypothesis reaches on `u·a` from the state that is actually reached by the access
    /// sequence of `u` followed by `a`. The latter becomes a new state, whose leaf is split off
    /// the leaf of the former.
    pub(super) fn refine_internal(
        &mut self,
        counterexample: &Counterexample<I, O>,
    ) -> Result<bool, LearnError> {
        if !counterexample.is_counterexample_for(&self.core.hypothesis) {
            return Ok(false);
        }
        let reduced = counterexample.reduced(&self.core.hypothesis);
        let index = {
            let mut mqo = MembershipWrapper::new(&mut self.core.observations);
            self.strategies.suffix_finder.find_suffix_index(
                &reduced,
                &self.core.hypothesis,
                &mut mqo,
            )
        };
        let index = index
            .filter(|j| (1..reduced.len()).contains(j))
            .ok_or_else(|| {
                LearnError::Decomposition(format!("no suffix index for {counterexample:?}"))
            })?;

        let core = &mut self.core;
        let splitter = self.strategies.leaf_splitter.as_ref();
        let word = &reduced.input;
        let (u, a, v) = (&word[..index - 1], word[index - 1], &word[index..]);
        let u_state = core.hypothesis.state_of(u)?;
        let ua_state = core.hypothesis.state_of(&word[..index])?;

        let old = core.hypothesis.transition_id(u_state, a).ok_or_else(|| {
            LearnError::UndefinedHypothesis(format!("{} has no transition on {}", u_state.show(), a.show()))
        })?;
        if core.hypothesis.transition(old).is_spanning_tree_edge() {
            return Err(LearnError::Decomposition(format!(
                "{} on {} is a spanning tree transition",
                u_state.show(),
                a.show()
            )));
        }
        let output = core.hypothesis.transition(old).output().cloned().ok_or_else(|| {
            LearnError::UndefinedHypothesis(format!("{old:?} has no output"))
        })?;

        let mut access = core.hypothesis.access_sequence(u_state).to_vec();
        access.push(a);
        let new_state = core.hypothesis.add_state(access.clone());
        core.hypothesis.set_target(old, Some(new_state));
        core.hypothesis.set_spanning_tree_edge(old, true);
        debug!(
            "split {} with access sequence {} off {} using {}",
            new_state.show(),
            access.show(),
            ua_state.show(),
            v.show()
        );

        let node_to_split = core.adt.leaf_of(ua_state)?;
        core.observations.add_state(new_state, &access, output)?;
        core.observations.add_trace_for_node(new_state, &core.adt, node_to_split)?;
        let (previous_trace, _) = core.adt.trace(node_to_split);

        match core
            .observations
            .find_separating_word(ua_state, new_state, Some(&previous_trace))
        {
            Some(extension) => {
                let mut complete = previous_trace;
                complete.extend(extension);
                let old_output = observed(&core.observations, ua_state, &complete)?;
                let new_output = observed(&core.observations, new_state, &complete)?;
                core.adt.extend_leaf(
                    node_to_split,
                    &complete,
                    &old_output,
                    &new_output,
                    new_state,
                    splitter,
                )?;
            }
            None => {
                let ua_access = core.hypothesis.access_sequence(ua_state).to_vec();
                let ua_output =
                    MembershipWrapper::new(&mut core.observations).answer_query(&ua_access, v);
                core.observations.add_trace(ua_state, v, &ua_output)?;
                let new_output =
                    MembershipWrapper::new(&mut core.observations).answer_query(&access, v);
                core.observations.add_trace(new_state, v, &new_output)?;

                let separator = match core.observations.find_separating_word(ua_state, new_state, None)
                {
                    Some(word) if word.len() < v.len() => word,
                    _ => v.to_vec(),
                };
                let old_output = observed(&core.observations, ua_state, &separator)?;
                let new_output = observed(&core.observations, new_state, &separator)?;
                core.adt.split_leaf(
                    node_to_split,
                    &separator,
                    &old_output,
                    &new_output,
                    new_state,
                    splitter,
                )?;
            }
        }

        let temporary = core.adt.start_of_ads(node_to_split);
        let root = core.adt.try_root()?;
        let new_transitions = core
            .alphabet
            .symbols()
            .iter()
            .map(|input| core.hypothesis.create_open_transition(new_state, *input, root))
            .collect_vec();
        let to_refine = core.hypothesis.incoming_non_spanning(ua_state);
        for t in &to_refine {
            core.hypothesis.set_target(*t, None);
            core.hypothesis.set_sift_node(*t, temporary);
        }

        let finalized = self.evaluate_adt_extension(temporary)?;

        let core = &mut self.core;
        for t in to_refine {
            if core.hypothesis.transition(t).needs_sifting() {
                core.hypothesis.set_sift_node(t, finalized);
                core.open_transitions.push_back(t);
            }
        }
        for t in new_transitions {
            if core.hypothesis.transition(t).needs_sifting() {
                core.open_transitions.push_back(t);
            }
        }
        core.close_transitions()?;
        Ok(true)
    }
}
