use std::collections::BTreeSet;

use tracing::{debug, trace, warn};

use crate::{
    adt::Ads,
    alphabet::{Color, Symbol},
    error::LearnError,
    id::{NodeId, StateId},
    math,
    mealy::Mealy,
    oracle::AdaptiveOracle,
    query::{AmbiguityQuery, SiftEnd, VerificationOutcome, VerificationQuery},
    show::Show,
    strategy::Extension,
};

use super::{learning::Learning, AdtLearner};

impl<I: Symbol, O: Color, A: AdaptiveOracle<I, O>> Learning<I, O, A> {
    /// Checks that `replacement` may take the place of `node`: `node` has to be part of the
    /// tree, the replacement together with `cutout` has to cover exactly the states below
    /// `node`, and the hypothesis has to agree with every trace of the replacement.
    pub(super) fn validate(
        &self,
        node: NodeId,
        replacement: &Ads<I, O>,
        cutout: &BTreeSet<StateId>,
    ) -> bool {
        let Some(root) = self.adt.root() else {
            return false;
        };
        let admissible = if self.adt.is_reset(node) {
            self.adt.collect_reset_nodes(root)
        } else {
            self.adt.collect_ads_nodes(root)
        };
        if !admissible.contains(&node) {
            warn!("cannot replace {node:?}, it does not start an ADS of the tree");
            return false;
        }
        if matches!(replacement, Ads::Leaf(_)) {
            warn!("replacement for {node:?} is a single leaf");
            return false;
        }

        let states = replacement.states();
        if states.len() != replacement.leaf_count() || !states.is_disjoint(cutout) {
            warn!("replacement for {node:?} identifies some state more than once");
            return false;
        }
        let covered = states.union(cutout).copied().collect::<BTreeSet<_>>();
        if covered != self.adt.collect_states(node) {
            warn!("replacement for {node:?} does not cover the states below it");
            return false;
        }

        let (parent_input, _) = self.adt.trace(node);
        for (state, input, output) in replacement.traces() {
            let mut word = parent_input.clone();
            word.extend(input);
            let agrees = self
                .hypothesis
                .transform_from(state, &word)
                .is_some_and(|predicted| predicted[parent_input.len()..] == output[..]);
            if !agrees {
                warn!(
                    "replacement for {node:?} contradicts the hypothesis in {}",
                    state.show()
                );
                return false;
            }
        }
        true
    }

    /// Runs every trace of `replacement` on the system and builds the tree that was actually
    /// observed. Deviations are queued as counterexamples. States whose traces cannot be told
    /// apart, as well as the states in `cutout`, are placed with [`Self::resolve_ambiguities`].
    /// Returns the (detached) root of the verified tree.
    pub(super) fn verify_ads(
        &mut self,
        node: NodeId,
        replacement: &Ads<I, O>,
        leaves: &math::Bijection<StateId, NodeId>,
        cutout: &BTreeSet<StateId>,
    ) -> Result<NodeId, LearnError> {
        let (parent_input, _) = self.adt.trace(node);
        let mut queries = replacement
            .traces()
            .into_iter()
            .filter(|(_, input, _)| !input.is_empty())
            .map(|(state, input, output)| {
                let mut prefix = self.hypothesis.access_sequence(state).to_vec();
                prefix.extend(parent_input.iter().copied());
                VerificationQuery::new(state, prefix, input, output)
            })
            .collect::<Vec<_>>();
        self.observations.process_queries(&mut queries);

        let mut result: Option<NodeId> = None;
        for query in &queries {
            let trace = match query.outcome() {
                Some(VerificationOutcome::Verified) => self.adt.build_ads_from_observation(
                    query.suffix(),
                    query.expected_output(),
                    query.state(),
                )?,
                Some(VerificationOutcome::Diverged {
                    counterexample,
                    input,
                    output,
                }) => {
                    debug!("verification of {} failed: {counterexample:?}", query.state().show());
                    self.open_counterexamples.push_back(counterexample.clone());
                    self.adt
                        .build_ads_from_observation(input, output, query.state())?
                }
                None => return Err(LearnError::UnansweredQuery),
            };
            match result {
                None => result = Some(trace),
                Some(head) => {
                    if !self.adt.merge_ads(head, trace)? {
                        self.resolve_ambiguities(node, head, query.state(), leaves)?;
                    }
                }
            }
        }

        let result = result.ok_or_else(|| {
            LearnError::InvalidTree(format!("replacement for {node:?} has no traces"))
        })?;
        for state in cutout {
            self.resolve_ambiguities(node, result, *state, leaves)?;
        }
        Ok(result)
    }

    /// Places `state` in the detached ADS `ads`. If the system leaves `ads` on a new output,
    /// `state` gets a leaf there. If it ends in the leaf of another state, both are told apart
    /// by the symbol at the lowest common ancestor of their leaves in the current tree, which
    /// is appended behind a reset node.
    fn resolve_ambiguities(
        &mut self,
        node: NodeId,
        ads: NodeId,
        state: StateId,
        leaves: &math::Bijection<StateId, NodeId>,
    ) -> Result<(), LearnError> {
        let (parent_input, _) = self.adt.trace(node);
        let end = {
            let mut query = AmbiguityQuery::new(
                &self.adt,
                self.hypothesis.access_sequence(state),
                &parent_input,
                ads,
            )?;
            self.observations.process_query(&mut query);
            query.outcome()?
        };

        let final_node = match end {
            SiftEnd::DeadEnd { node, output } => {
                trace!("{} leaves the ADS at {node:?}", state.show());
                self.adt.add_leaf(node, output, state)?;
                return Ok(());
            }
            SiftEnd::Leaf(leaf) => leaf,
        };
        let final_state = self
            .adt
            .state(final_node)
            .ok_or_else(|| LearnError::InvalidTree(format!("{final_node:?} is no leaf")))?;
        let old_reference = *leaves
            .get_by_left(&final_state)
            .ok_or(LearnError::MissingLeaf(final_state))?;
        let new_reference = *leaves
            .get_by_left(&state)
            .ok_or(LearnError::MissingLeaf(state))?;
        let lca = self.adt.find_lca(old_reference, new_reference)?;
        trace!(
            "{} and {} are ambiguous, separating them at {:?}",
            final_state.show(),
            state.show(),
            lca.node
        );

        let (mut separator, lca_output) = self.adt.trace(lca.node);
        separator.push(self.adt.symbol(lca.node).ok_or_else(|| {
            LearnError::InvalidTree(format!("{:?} is no symbol node", lca.node))
        })?);
        let mut old_output = lca_output.clone();
        old_output.push(lca.first_output);
        let mut new_output = lca_output;
        new_output.push(lca.second_output);

        let old_trace = self
            .adt
            .build_ads_from_observation(&separator, &old_output, final_state)?;
        let new_trace = self
            .adt
            .build_ads_from_observation(&separator, &new_output, state)?;
        if !self.adt.merge_ads(old_trace, new_trace)? {
            return Err(LearnError::AmbiguityMerge);
        }

        let parent = self.adt.parent(final_node).ok_or_else(|| {
            LearnError::InvalidTree(format!("{final_node:?} has no parent"))
        })?;
        let output = self.adt.output_for_successor(parent, final_node)?;
        let reset = self.adt.add_reset_node(old_trace);
        self.adt.attach(parent, output, reset)?;
        Ok(())
    }
}

impl<I: Symbol, O: Color, A: AdaptiveOracle<I, O>> AdtLearner<I, O, A> {
    /// Asks the extender whether the reset in front of the freshly split ADS `ads` can be
    /// avoided. Returns the node that transitions into the split states should be sifted from.
    pub(super) fn evaluate_adt_extension(&mut self, ads: NodeId) -> Result<NodeId, LearnError> {
        let extension = self.strategies.extender.compute_extension(&mut self.core, ads)?;
        let replacement = match extension {
            Extension::Empty => return Ok(ads),
            Extension::Counterexample(counterexample) => {
                self.core.open_counterexamples.push_back(counterexample);
                return Ok(ads);
            }
            Extension::Replacement(replacement) => replacement,
        };

        let core = &mut self.core;
        let Some(node_to_replace) = core.adt.parent(ads) else {
            return Ok(ads);
        };
        let none = BTreeSet::new();
        if !core.validate(node_to_replace, &replacement, &none) {
            return Ok(ads);
        }
        let leaves = core.adt.leaves_by_state()?;
        let verified = core.verify_ads(node_to_replace, &replacement, &leaves, &none)?;

        let old_cost = core.adt.effective_resets(node_to_replace);
        let new_cost = core.adt.effective_resets(verified);
        if new_cost >= old_cost {
            trace!("extension of {ads:?} costs {new_cost} resets, keeping {old_cost}");
            return Ok(ads);
        }
        debug!("extending the ADS in front of {ads:?}, saving {} resets", old_cost - new_cost);
        core.adt.replace_node(node_to_replace, verified)?;
        let finalized = core.adt.start_of_ads(verified);
        core.resift_affected_transitions(&replacement.states(), finalized);
        Ok(finalized)
    }

    /// Asks the replacer for cheaper subtrees, verifies them against the system and installs
    /// those that still save resets afterwards.
    pub(super) fn evaluate_subtree_replacement(&mut self) -> Result<(), LearnError> {
        if self.core.hypothesis.size() == 1 {
            return Ok(());
        }
        let proposals = self.strategies.replacer.compute_replacements(
            &self.core.hypothesis,
            &self.core.alphabet,
            &self.core.adt,
        );
        if proposals.is_empty() {
            return Ok(());
        }

        let core = &mut self.core;
        let leaves = core.adt.leaves_by_state()?;
        let mut accepted = vec![];
        for proposal in proposals {
            let node = proposal.node_to_replace;
            if !core.validate(node, &proposal.replacement, &proposal.cutout) {
                continue;
            }
            let verified =
                core.verify_ads(node, &proposal.replacement, &leaves, &proposal.cutout)?;
            let old_cost = core.adt.effective_resets(node);
            let new_cost = core.adt.effective_resets(verified);
            if new_cost >= old_cost {
                debug!("rejecting replacement of {node:?}: {new_cost} resets instead of {old_cost}");
                continue;
            }
            debug!("replacing {node:?}: {new_cost} resets instead of {old_cost}");
            accepted.push((node, verified));
        }

        for (node, verified) in accepted {
            if !core.adt.is_reachable(node) {
                warn!("{node:?} was removed by an earlier replacement, skipping");
                continue;
            }
            core.adt.replace_node(node, verified)?;
            let states = core.adt.collect_states(verified);
            let finalized = core.adt.start_of_ads(verified);
            core.resift_affected_transitions(&states, finalized);
        }
        core.close_transitions()
    }
}
