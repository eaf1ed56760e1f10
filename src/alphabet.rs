use std::{fmt::Debug, hash::Hash};

use itertools::Itertools;

use crate::show::Show;

/// An input symbol. Symbols are small values that can be copied around freely, hashed and
/// ordered, which is for example the case for `char` or the unsigned integer types.
pub trait Symbol: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show {}
impl<S: PartialEq + Eq + Debug + Copy + Ord + PartialOrd + Hash + Show> Symbol for S {}

/// An output symbol produced by the system under learning. Outputs label the branches of
/// symbol nodes in the tree, which is why they have to be ordered.
pub trait Color: Clone + Eq + Ord + Hash + Debug + Show {}
impl<C: Clone + Eq + Ord + Hash + Debug + Show> Color for C {}

/// A finite input alphabet. In contrast to a set, the alphabet remembers the order in which
/// symbols were added, and it may grow during learning (see
/// [`crate::learner::AdtLearner::add_alphabet_symbol`]).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Alphabet<I>(Vec<I>);

impl<I: Symbol> Alphabet<I> {
    /// Creates a new [`Alphabet`] from an iterator over the symbols. Duplicates are dropped,
    /// the first occurrence determines the position of a symbol.
    pub fn new<X: IntoIterator<Item = I>>(symbols: X) -> Self {
        Self(symbols.into_iter().unique().collect())
    }

    /// Returns an iterator over all symbols in the order of their insertion.
    pub fn universe(&self) -> impl Iterator<Item = I> + '_ {
        self.0.iter().copied()
    }

    /// Returns the symbols as a slice.
    pub fn symbols(&self) -> &[I] {
        &self.0
    }

    /// The number of symbols.
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the alphabet has no symbols.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks whether `symbol` belongs to the alphabet.
    pub fn contains(&self, symbol: I) -> bool {
        self.0.contains(&symbol)
    }

    /// Adds the given symbol, returns `false` if it was already present.
    pub fn add_symbol(&mut self, symbol: I) -> bool {
        if self.contains(symbol) {
            return false;
        }
        self.0.push(symbol);
        true
    }
}

impl Alphabet<char> {
    /// Creates an alphabet consisting of the first `size` lowercase letters.
    pub fn of_size(size: usize) -> Self {
        assert!(size <= 26, "Alphabet of size {size} is too large");
        Self::new((0..size).map(|i| (b'a' + i as u8) as char))
    }
}

impl<I: Symbol> FromIterator<I> for Alphabet<I> {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl<I: Symbol> From<Vec<I>> for Alphabet<I> {
    fn from(value: Vec<I>) -> Self {
        Self::new(value)
    }
}

impl<I: Symbol> Debug for Alphabet<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0.iter().map(|sym| sym.show()).join(", "))
    }
}

/// Creates an [`Alphabet`] from a list of symbols, e.g. `alphabet!(simple 'a', 'b')`.
#[macro_export]
macro_rules! alphabet {
    (simple $($c:expr),*) => {
        $crate::alphabet::Alphabet::new(vec![$($c),*])
    };
}
