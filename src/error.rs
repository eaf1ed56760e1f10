use thiserror::Error;

use crate::id::StateId;

/// Everything that can go wrong while learning.
///
/// Apart from [`LearnError::HypothesisModified`], all variants signal that an internal invariant
/// was broken, typically because a pluggable strategy or the system under learning did not honor
/// its contract (e.g. a nondeterministic system). Such errors abort the run. Mismatches between
/// the hypothesis and the observed behavior are never errors, they become counterexamples.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LearnError {
    /// No leaf of the tree is associated with the given state.
    #[error("no leaf found for hypothesis state {0:?}")]
    MissingLeaf(StateId),
    /// The counterexample could not be decomposed into prefix, symbol and suffix.
    #[error("could not decompose counterexample: {0}")]
    Decomposition(String),
    /// Two distinguishing traces built from a lowest common ancestor could not be merged.
    #[error("ambiguity resolution could not merge the distinguishing traces")]
    AmbiguityMerge,
    /// A precondition of a tree operation does not hold.
    #[error("invalid tree operation: {0}")]
    InvalidTree(String),
    /// The oracle returned without finishing a query.
    #[error("oracle returned without finishing a query")]
    UnansweredQuery,
    /// The hypothesis has no transition where one is required.
    #[error("hypothesis is undefined: {0}")]
    UndefinedHypothesis(String),
    /// The observation tree does not hold a trace it is supposed to hold.
    #[error("observation tree is missing a trace: {0}")]
    MissingObservation(String),
    /// Closing a transition introduced new states, iterations over the previous transition set
    /// have to be restarted.
    #[error("hypothesis was modified while closing a transition")]
    HypothesisModified,
    /// The equivalence loop did not converge within the given number of iterations.
    #[error("iteration threshold of {0} exceeded")]
    IterationThreshold(usize),
}

impl LearnError {
    /// Returns true if the caller can recover from the error by restarting what it was doing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LearnError::HypothesisModified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_modification_is_recoverable() {
        assert!(LearnError::HypothesisModified.is_recoverable());
        assert!(!LearnError::MissingLeaf(StateId::new(1)).is_recoverable());
        assert_eq!(
            LearnError::MissingLeaf(StateId::new(1)).to_string(),
            "no leaf found for hypothesis state q1"
        );
    }
}
