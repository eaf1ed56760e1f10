use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::{
    adt::Ads,
    alphabet::{Color, Symbol},
    error::LearnError,
    id::{NodeId, StateId},
    learner::PartialTransitionAnalyzer,
    mealy::Mealy,
    oracle::Counterexample,
};

use super::compute_defensive_ads;

/// What an [`AdtExtender`] proposes for a freshly split ADS.
#[derive(Clone, PartialEq, Eq)]
pub enum Extension<I, O> {
    /// Nothing to improve.
    Empty,
    /// A reset-free continuation of the parent ADS that distinguishes the states of the ADS. It
    /// replaces the reset node in front of the ADS.
    Replacement(Ads<I, O>),
    /// While replaying the parent trace, the hypothesis contradicted the tree.
    Counterexample(Counterexample<I, O>),
}

impl<I: Symbol, O: Color> std::fmt::Debug for Extension<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Extension::Empty => write!(f, "Empty"),
            Extension::Replacement(ads) => f.debug_tuple("Replacement").field(ads).finish(),
            Extension::Counterexample(ce) => write!(f, "Counterexample({ce:?})"),
        }
    }
}

/// Looks for ways to avoid the reset node in front of a freshly created ADS. `ads` is the first
/// node of that ADS. Transitions that are needed for the computation can be closed through the
/// analyzer.
pub trait AdtExtender<I, O> {
    fn compute_extension(
        &self,
        analyzer: &mut dyn PartialTransitionAnalyzer<I, O>,
        ads: NodeId,
    ) -> Result<Extension<I, O>, LearnError>;
}

/// Never proposes an extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopExtender;

impl<I: Symbol, O: Color> AdtExtender<I, O> for NopExtender {
    fn compute_extension(
        &self,
        _analyzer: &mut dyn PartialTransitionAnalyzer<I, O>,
        _ads: NodeId,
    ) -> Result<Extension<I, O>, LearnError> {
        Ok(Extension::Empty)
    }
}

/// Tries to continue the parent ADS with a defensively computed ADS. Only handles ADSs with at
/// most two leaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtender;

impl DefaultExtender {
    fn try_extend<I: Symbol, O: Color>(
        analyzer: &mut dyn PartialTransitionAnalyzer<I, O>,
        initial: &BTreeSet<StateId>,
        inputs: &[I],
        outputs: &[O],
    ) -> Result<Extension<I, O>, LearnError> {
        let mut mapping: Vec<(StateId, StateId)> = initial.iter().map(|q| (*q, *q)).collect();

        for (idx, (input, output)) in inputs.iter().zip(outputs).enumerate() {
            let mut next = Vec::with_capacity(mapping.len());
            for (current, origin) in &mapping {
                if !analyzer.is_transition_defined(*current, *input) {
                    analyzer.close_transition(*current, *input)?;
                }
                let hypothesis = analyzer.hypothesis();

                if hypothesis.output(*current, *input).as_ref() != Some(output) {
                    let mut ce_input = hypothesis.access_sequence(*origin).to_vec();
                    let mut ce_output = hypothesis.compute_output(&ce_input)?;
                    ce_input.extend_from_slice(&inputs[..=idx]);
                    ce_output.extend_from_slice(&outputs[..=idx]);
                    let counterexample = Counterexample::new(ce_input, ce_output);
                    debug!("parent trace contradicts the hypothesis: {counterexample:?}");
                    return Ok(Extension::Counterexample(counterexample));
                }

                let successor = hypothesis.successor(*current, *input).ok_or_else(|| {
                    LearnError::UndefinedHypothesis(format!(
                        "transition of {current:?} on {input:?} is still open"
                    ))
                })?;
                if next.iter().any(|(q, _)| *q == successor) {
                    trace!("states converge on the parent trace");
                    return Ok(Extension::Empty);
                }
                next.push((successor, *origin));
            }
            mapping = next;
        }

        let current = mapping.iter().map(|(q, _)| *q).collect();
        let Some(ads) = compute_defensive_ads(analyzer, &current)? else {
            return Ok(Extension::Empty);
        };
        let origin = |q: StateId| {
            mapping
                .iter()
                .find(|(current, _)| *current == q)
                .map_or(q, |(_, origin)| *origin)
        };
        Ok(Extension::Replacement(ads.map_states(&origin)))
    }
}

impl<I: Symbol, O: Color> AdtExtender<I, O> for DefaultExtender {
    fn compute_extension(
        &self,
        analyzer: &mut dyn PartialTransitionAnalyzer<I, O>,
        ads: NodeId,
    ) -> Result<Extension<I, O>, LearnError> {
        let adt = analyzer.adt();
        let Some(parent) = adt.parent(ads) else {
            return Ok(Extension::Empty);
        };
        if adt.collect_leaves(ads).len() > 2 {
            return Ok(Extension::Empty);
        }
        let initial = adt.collect_states(ads);
        let (inputs, outputs) = adt.trace(parent);

        loop {
            match Self::try_extend(analyzer, &initial, &inputs, &outputs) {
                Err(e) if e.is_recoverable() => {
                    trace!("hypothesis changed while extending {ads:?}, starting over");
                }
                result => return result,
            }
        }
    }
}
