use crate::{
    alphabet::{Alphabet, Color, Symbol},
    oracle::AdaptiveOracle,
    strategy::{
        AdtExtender, DefaultExtender, DefaultSplitter, LeafSplitter, LevelOrderReplacer,
        LocalSuffixFinder, RivestSchapire, SubtreeReplacer,
    },
};

use super::{learning::Learning, AdtLearner, Strategies};

/// Configures an [`AdtLearner`]. Every strategy starts out with its default, which is
/// [`DefaultSplitter`], [`DefaultExtender`], [`LevelOrderReplacer`] and [`RivestSchapire`].
/// The observation tree caches all answers of the oracle unless this is turned off with
/// [`Self::use_observation_tree`].
pub struct AdtLearnerBuilder<I, O, A> {
    alphabet: Alphabet<I>,
    oracle: A,
    leaf_splitter: Box<dyn LeafSplitter<I, O>>,
    extender: Box<dyn AdtExtender<I, O>>,
    replacer: Box<dyn SubtreeReplacer<I, O>>,
    suffix_finder: Box<dyn LocalSuffixFinder<I, O>>,
    use_observation_tree: bool,
}

impl<I: Symbol, O: Color, A: AdaptiveOracle<I, O>> AdtLearnerBuilder<I, O, A> {
    pub fn new(alphabet: Alphabet<I>, oracle: A) -> Self {
        Self {
            alphabet,
            oracle,
            leaf_splitter: Box::new(DefaultSplitter),
            extender: Box::new(DefaultExtender),
            replacer: Box::new(LevelOrderReplacer),
            suffix_finder: Box::new(RivestSchapire),
            use_observation_tree: true,
        }
    }

    pub fn leaf_splitter(self, leaf_splitter: impl LeafSplitter<I, O> + 'static) -> Self {
        self.boxed_leaf_splitter(Box::new(leaf_splitter))
    }

    pub fn boxed_leaf_splitter(mut self, leaf_splitter: Box<dyn LeafSplitter<I, O>>) -> Self {
        self.leaf_splitter = leaf_splitter;
        self
    }

    pub fn extender(self, extender: impl AdtExtender<I, O> + 'static) -> Self {
        self.boxed_extender(Box::new(extender))
    }

    pub fn boxed_extender(mut self, extender: Box<dyn AdtExtender<I, O>>) -> Self {
        self.extender = extender;
        self
    }

    pub fn subtree_replacer(self, replacer: impl SubtreeReplacer<I, O> + 'static) -> Self {
        self.boxed_subtree_replacer(Box::new(replacer))
    }

    pub fn boxed_subtree_replacer(mut self, replacer: Box<dyn SubtreeReplacer<I, O>>) -> Self {
        self.replacer = replacer;
        self
    }

    pub fn suffix_finder(self, suffix_finder: impl LocalSuffixFinder<I, O> + 'static) -> Self {
        self.boxed_suffix_finder(Box::new(suffix_finder))
    }

    pub fn boxed_suffix_finder(
        mut self,
        suffix_finder: Box<dyn LocalSuffixFinder<I, O>>,
    ) -> Self {
        self.suffix_finder = suffix_finder;
        self
    }

    /// If false, the observation tree only keeps what the learner explicitly stores in it and
    /// every adaptive query is posed to the oracle.
    pub fn use_observation_tree(mut self, use_observation_tree: bool) -> Self {
        self.use_observation_tree = use_observation_tree;
        self
    }

    pub fn build(self) -> AdtLearner<I, O, A> {
        AdtLearner {
            core: Learning::new(self.alphabet, self.oracle, self.use_observation_tree),
            strategies: Strategies {
                leaf_splitter: self.leaf_splitter,
                extender: self.extender,
                replacer: self.replacer,
                suffix_finder: self.suffix_finder,
            },
        }
    }
}
