/// Unordered set of states, nodes or partition blocks.
pub type Set<S> = fxhash::FxHashSet<S>;
/// Unordered map, e.g. from input symbols to transitions or observation tree nodes.
pub type Map<K, V> = fxhash::FxHashMap<K, V>;

/// Pairs hypothesis states with their leaves in the tree. Replacements look up leaves by state
/// and states by leaf while they resolve ambiguities.
pub type Bijection<L, R> = bimap::BiBTreeMap<L, R>;

/// Keeps counterexamples in the order in which they were first processed.
pub type OrderedSet<S> = indexmap::IndexSet<S, fxhash::FxBuildHasher>;

/// Computes the binomial coefficient `n` choose `k`, saturating at `u64::MAX`.
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut out: u64 = 1;
    for i in 0..k {
        // multiplying first keeps every intermediate value an integer
        let Some(next) = out
            .checked_mul((n - i) as u64)
            .map(|product| product / (i as u64 + 1))
        else {
            return u64::MAX;
        };
        out = next;
    }
    out
}
