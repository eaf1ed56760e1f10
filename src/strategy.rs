mod splitter;
pub use splitter::{DefaultSplitter, ExtendParentSplitter, LeafSplitter};

mod ads;
pub use ads::{compute_ads, compute_defensive_ads, maximum_splitting_word_length};

mod extender;
pub use extender::{AdtExtender, DefaultExtender, Extension, NopExtender};

mod replacer;
pub use replacer::{
    ExhaustiveReplacer, LevelOrderReplacer, NeverReplace, Replacement, SingleReplacer,
    SubtreeReplacer,
};

mod suffix;
pub use suffix::{LinearForward, LinearReverse, LocalSuffixFinder, RivestSchapire};
