use tracing::trace;

use crate::{
    alphabet::{Color, Symbol},
    hypothesis::AdtHypothesis,
    mealy::Mealy,
    oracle::{Counterexample, MembershipOracle},
};

/// Locates the position at which a counterexample can be decomposed. The returned index `j`
/// splits the input into `u = w[..j-1]`, `a = w[j-1]` and `v = w[j..]` such that the state the
/// hypothesis reaches on `u` followed by `a` and the state it reaches on `u·a` are told apart by
/// `v` in the system under learning.
///
/// All finders work on the counterexample reduced to its first diverging output. Position `i`
/// is *consistent* if the system, started in the access sequence of the hypothesis state reached
/// by `w[..i]`, answers `w[i..]` the way the hypothesis does. Position `0` is inconsistent and,
/// because transition outputs are observed, the last position is consistent; the finders
/// look for an inconsistent position followed by a consistent one.
pub trait LocalSuffixFinder<I, O> {
    fn find_suffix_index(
        &self,
        counterexample: &Counterexample<I, O>,
        hypothesis: &AdtHypothesis<I, O>,
        oracle: &mut dyn MembershipOracle<I, O>,
    ) -> Option<usize>;
}

struct Effects<'a, I, O> {
    word: &'a [I],
    hypothesis: &'a AdtHypothesis<I, O>,
    oracle: &'a mut dyn MembershipOracle<I, O>,
}

impl<'a, I: Symbol, O: Color> Effects<'a, I, O> {
    fn consistent(&mut self, i: usize) -> Option<bool> {
        let state = self.hypothesis.reached(&self.word[..i])?;
        let suffix = &self.word[i..];
        let expected = self.hypothesis.transform_from(state, suffix)?;
        let observed = self
            .oracle
            .answer_query(self.hypothesis.access_sequence(state), suffix);
        trace!("position {i} is consistent: {}", expected == observed);
        Some(expected == observed)
    }
}

fn effects<'a, I: Symbol, O: Color>(
    counterexample: &'a Counterexample<I, O>,
    hypothesis: &'a AdtHypothesis<I, O>,
    oracle: &'a mut dyn MembershipOracle<I, O>,
) -> Effects<'a, I, O> {
    Effects {
        word: &counterexample.input,
        hypothesis,
        oracle,
    }
}

/// Binary search for a breakpoint, needs a logarithmic number of queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct RivestSchapire;

impl<I: Symbol, O: Color> LocalSuffixFinder<I, O> for RivestSchapire {
    fn find_suffix_index(
        &self,
        counterexample: &Counterexample<I, O>,
        hypothesis: &AdtHypothesis<I, O>,
        oracle: &mut dyn MembershipOracle<I, O>,
    ) -> Option<usize> {
        let reduced = counterexample.reduced(hypothesis);
        if reduced.len() < 2 {
            return None;
        }
        let mut effects = effects(&reduced, hypothesis, oracle);
        let (mut low, mut high) = (0, reduced.len() - 1);
        while high - low > 1 {
            let mid = low + (high - low) / 2;
            if effects.consistent(mid)? {
                high = mid;
            } else {
                low = mid;
            }
        }
        Some(low + 1)
    }
}

/// Scans from the front and returns the first breakpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearForward;

impl<I: Symbol, O: Color> LocalSuffixFinder<I, O> for LinearForward {
    fn find_suffix_index(
        &self,
        counterexample: &Counterexample<I, O>,
        hypothesis: &AdtHypothesis<I, O>,
        oracle: &mut dyn MembershipOracle<I, O>,
    ) -> Option<usize> {
        let reduced = counterexample.reduced(hypothesis);
        if reduced.len() < 2 {
            return None;
        }
        let mut effects = effects(&reduced, hypothesis, oracle);
        for i in 1..reduced.len() {
            if effects.consistent(i)? {
                return Some(i);
            }
        }
        None
    }
}

/// Scans from the back and returns the last breakpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearReverse;

impl<I: Symbol, O: Color> LocalSuffixFinder<I, O> for LinearReverse {
    fn find_suffix_index(
        &self,
        counterexample: &Counterexample<I, O>,
        hypothesis: &AdtHypothesis<I, O>,
        oracle: &mut dyn MembershipOracle<I, O>,
    ) -> Option<usize> {
        let reduced = counterexample.reduced(hypothesis);
        if reduced.len() < 2 {
            return None;
        }
        let mut effects = effects(&reduced, hypothesis, oracle);
        for i in (0..reduced.len() - 1).rev() {
            if !effects.consistent(i)? {
                return Some(i + 1);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;

    /// Answers every query with zeros, except that the last output is 1 for the given suffix
    /// lengths.
    struct Marked(Vec<usize>, usize);

    impl MembershipOracle<char, u8> for Marked {
        fn answer_query(&mut self, _prefix: &[char], suffix: &[char]) -> Vec<u8> {
            self.1 += 1;
            let mut out = vec![0; suffix.len()];
            if self.0.contains(&suffix.len()) {
                if let Some(last) = out.last_mut() {
                    *last = 1;
                }
            }
            out
        }
    }

    fn single_state() -> AdtHypothesis<char, u8> {
        let mut hyp = AdtHypothesis::new(alphabet!(simple 'a'));
        let q0 = hyp.add_initial_state();
        let t = hyp.create_open_transition(q0, 'a', NodeId::new(0));
        hyp.set_output(t, 0);
        hyp.set_target(t, Some(q0));
        hyp
    }

    #[test_log::test]
    fn finders_pick_different_breakpoints() {
        let hyp = single_state();
        let ce = Counterexample::new(vec!['a'; 4], vec![0, 0, 0, 1]);
        // positions 0 and 2 are inconsistent, 1 and 3 are consistent
        let mut oracle = Marked(vec![4, 2], 0);
        assert_eq!(RivestSchapire.find_suffix_index(&ce, &hyp, &mut oracle), Some(1));
        assert_eq!(oracle.1, 1);
        assert_eq!(LinearForward.find_suffix_index(&ce, &hyp, &mut oracle), Some(1));
        assert_eq!(LinearReverse.find_suffix_index(&ce, &hyp, &mut oracle), Some(3));

        let mut oracle = Marked(vec![4, 3, 2], 0);
        assert_eq!(RivestSchapire.find_suffix_index(&ce, &hyp, &mut oracle), Some(3));
        assert_eq!(LinearForward.find_suffix_index(&ce, &hyp, &mut oracle), Some(3));
        assert_eq!(LinearReverse.find_suffix_index(&ce, &hyp, &mut oracle), Some(3));
    }

    #[test_log::test]
    fn counterexamples_are_reduced_first() {
        let hyp = single_state();
        // everything after the first mismatch is ignored
        let ce = Counterexample::new(vec!['a'; 5], vec![0, 0, 1, 1, 1]);
        let mut oracle = Marked(vec![3], 0);
        assert_eq!(RivestSchapire.find_suffix_index(&ce, &hyp, &mut oracle), Some(1));
        assert_eq!(LinearReverse.find_suffix_index(&ce, &hyp, &mut oracle), Some(1));

        let short = Counterexample::new(vec!['a'], vec![1]);
        assert_eq!(RivestSchapire.find_suffix_index(&short, &hyp, &mut oracle), None);
        assert_eq!(LinearForward.find_suffix_index(&short, &hyp, &mut oracle), None);
    }
}
