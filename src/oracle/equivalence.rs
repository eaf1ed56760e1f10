use std::fmt::Debug;

use tracing::trace;

use crate::{
    alphabet::{Color, Symbol},
    mealy::{find_separating_word, Mealy, MealyMachine},
    show::Show,
};

/// An input word together with the outputs the system under learning produces on it. It is a
/// counterexample for a hypothesis if the hypothesis produces different outputs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Counterexample<I, O> {
    pub input: Vec<I>,
    pub output: Vec<O>,
}

impl<I: Symbol, O: Color> Counterexample<I, O> {
    pub fn new(input: Vec<I>, output: Vec<O>) -> Self {
        assert_eq!(input.len(), output.len(), "input and output differ in length");
        Self { input, output }
    }

    pub fn len(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Returns true if `hypothesis` does not produce exactly [`Counterexample::output`]. A
    /// hypothesis that is undefined somewhere along the input is contradicted as well.
    pub fn is_counterexample_for<M: Mealy<I, O>>(&self, hypothesis: &M) -> bool {
        hypothesis.transform(&self.input).as_deref() != Some(self.output.as_slice())
    }

    /// The index of the first output on which `hypothesis` deviates.
    pub fn first_mismatch<M: Mealy<I, O>>(&self, hypothesis: &M) -> Option<usize> {
        let mut state = hypothesis.initial()?;
        for (i, (symbol, output)) in self.input.iter().zip(&self.output).enumerate() {
            if hypothesis.output(state, *symbol).as_ref() != Some(output) {
                return Some(i);
            }
            let Some(next) = hypothesis.successor(state, *symbol) else {
                return Some(i + 1).filter(|i| *i < self.len());
            };
            state = next;
        }
        None
    }

    /// Cuts both words after the first position on which `hypothesis` deviates.
    pub fn reduced<M: Mealy<I, O>>(&self, hypothesis: &M) -> Self {
        match self.first_mismatch(hypothesis) {
            Some(i) => Self {
                input: self.input[..=i].to_vec(),
                output: self.output[..=i].to_vec(),
            },
            None => self.clone(),
        }
    }
}

impl<I: Symbol, O: Color> Debug for Counterexample<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.input.show(), self.output.show())
    }
}

/// Decides whether a hypothesis is correct, and provides a counterexample if it is not.
pub trait EquivalenceOracle<I: Symbol, O: Color> {
    fn find_counterexample<H: Mealy<I, O>>(&mut self, hypothesis: &H)
        -> Option<Counterexample<I, O>>;
}

/// Compares hypotheses to a known [`MealyMachine`].
#[derive(Clone)]
pub struct MealyOracle<I, O> {
    target: MealyMachine<I, O>,
    queries: usize,
}

impl<I: Symbol, O: Color> MealyOracle<I, O> {
    pub fn new(target: MealyMachine<I, O>) -> Self {
        Self { target, queries: 0 }
    }

    /// The number of equivalence queries answered so far.
    pub fn queries(&self) -> usize {
        self.queries
    }
}

impl<I: Symbol, O: Color> Debug for MealyOracle<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MealyOracle")
            .field("target", &self.target)
            .field("queries", &self.queries)
            .finish()
    }
}

impl<I: Symbol, O: Color> EquivalenceOracle<I, O> for MealyOracle<I, O> {
    fn find_counterexample<H: Mealy<I, O>>(
        &mut self,
        hypothesis: &H,
    ) -> Option<Counterexample<I, O>> {
        self.queries += 1;
        let input = find_separating_word(&self.target, hypothesis, self.target.alphabet())?;
        let output = self.target.transform(&input)?;
        trace!("found counterexample {}/{}", input.show(), output.show());
        Some(Counterexample::new(input, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn reducing_counterexamples() {
        let single = MealyMachine::builder()
            .with_transitions([(0, 'a', 0u8, 0), (0, 'b', 1, 0)])
            .into_mealy(0);
        let ce = Counterexample::new(vec!['b', 'b', 'a', 'a'], vec![1, 0, 0, 0]);
        assert!(ce.is_counterexample_for(&single));
        assert_eq!(ce.first_mismatch(&single), Some(1));
        assert_eq!(
            ce.reduced(&single),
            Counterexample::new(vec!['b', 'b'], vec![1, 0])
        );
        let fine = Counterexample::new(vec!['b', 'a'], vec![1, 0]);
        assert!(!fine.is_counterexample_for(&single));
        assert_eq!(fine.reduced(&single), fine);
    }

    #[test_log::test]
    fn mealy_oracle_finds_shortest_counterexample() {
        let target = MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0u8, 0),
                (0, 'b', 1, 1),
                (1, 'a', 0, 0),
                (1, 'b', 0, 1),
            ])
            .into_mealy(0);
        let single = MealyMachine::builder()
            .with_transitions([(0, 'a', 0u8, 0), (0, 'b', 1, 0)])
            .into_mealy(0);
        let mut oracle = MealyOracle::new(target.clone());
        assert_eq!(
            oracle.find_counterexample(&single),
            Some(Counterexample::new(vec!['b', 'b'], vec![1, 0]))
        );
        assert_eq!(oracle.find_counterexample(&target), None);
        assert_eq!(oracle.queries(), 2);
    }
}
