//! Active learning of Mealy machines with an adaptive distinguishing-sequence tree (ADT).
//!
//! Instead of an observation table, the learner keeps a tree whose inner nodes are input symbols
//! (branching on the observed output) or reset nodes, and whose leaves are in one-to-one
//! correspondence with the states of the current hypothesis. Unknown transition targets are
//! determined by *sifting* them through this tree, which is done by adaptive queries that pick
//! their next input depending on the outputs the system under learning produced so far.
//!
//! The main entry point is [`learner::AdtLearner`]. It is constructed from an input alphabet and
//! an [`oracle::AdaptiveOracle`] that answers adaptive queries, for example a [`oracle::SulOracle`]
//! driving a simulated [`mealy::MealyMachine`]. Counterexamples are fed back through
//! [`learner::AdtLearner::refine_hypothesis`], or an [`oracle::EquivalenceOracle`] is handed to
//! [`learner::AdtLearner::infer`] which runs the whole loop.
//!
//! How the tree is grown and optimized is configurable: leaf splitters, ADT extenders, subtree
//! replacers and local suffix finders live in [`strategy`] and are injected through the
//! [`learner::AdtLearnerBuilder`].

/// The prelude is supposed to make using this package easier. Including everything, i.e.
/// `use adt_learning::prelude::*;` should be enough to use the package.
pub mod prelude {
    pub use super::{
        adt::{Adt, AdtNode, Ads, Lca},
        alphabet,
        alphabet::{Alphabet, Color, Symbol},
        cache::ObservationTree,
        error::LearnError,
        hypothesis::AdtHypothesis,
        id::{NodeId, StateId, TransitionId},
        learner::{AdtLearner, AdtLearnerBuilder, LearnerState, PartialTransitionAnalyzer},
        math,
        mealy::{Mealy, MealyMachine},
        oracle::{
            AdaptiveOracle, Counterexample, EquivalenceOracle, MealyOracle, MealySul,
            MembershipOracle, MembershipWrapper, Sul, SulOracle,
        },
        query::{AdaptiveQuery, Response},
        show::Show,
        strategy::{
            AdtExtender, DefaultExtender, DefaultSplitter, ExhaustiveReplacer,
            ExtendParentSplitter, LeafSplitter, LevelOrderReplacer, LinearForward, LinearReverse,
            LocalSuffixFinder, NeverReplace, NopExtender, RivestSchapire, SingleReplacer,
            SubtreeReplacer,
        },
    };
}

/// Type aliases for the collections used throughout the crate.
pub mod math;

/// Human readable representations of symbols, words and identifiers.
pub mod show;

/// Input alphabets and the traits that input and output symbols must satisfy.
#[macro_use]
pub mod alphabet;

/// Index types for hypothesis states, transitions and tree nodes.
pub mod id;

/// The error type of the learner.
pub mod error;

/// Mealy machines, both as a read-only view and as a concrete implementation.
pub mod mealy;

/// The adaptive distinguishing-sequence tree.
pub mod adt;

/// Adaptive queries, i.e. resumable state machines that decide on their next input symbol based
/// on the outputs observed so far.
pub mod query;

/// Oracles that answer adaptive, membership and equivalence queries.
pub mod oracle;

/// The observation tree, a cache of everything the system under learning answered.
pub mod cache;

/// The incrementally constructed hypothesis.
pub mod hypothesis;

/// Pluggable strategies for growing and optimizing the tree and for analyzing counterexamples.
pub mod strategy;

/// The learning algorithm itself.
pub mod learner;
