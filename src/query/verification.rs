use crate::{
    alphabet::{Color, Symbol},
    id::StateId,
    oracle::Counterexample,
    show::Show,
};

use super::{AdaptiveQuery, Response};

/// The result of a [`VerificationQuery`].
#[derive(Clone, PartialEq, Eq)]
pub enum VerificationOutcome<I, O> {
    /// The system produced exactly the expected output.
    Verified,
    /// The system deviated from the expected output on the last symbol of `input`.
    Diverged {
        /// The full word that was run, from the initial state of the system.
        counterexample: Counterexample<I, O>,
        /// The part of the suffix that was run.
        input: Vec<I>,
        /// The outputs observed on `input`.
        output: Vec<O>,
    },
}

/// Checks whether the system produces `expected` on `suffix` after running `prefix`. Stops at the
/// first deviation.
#[derive(Clone)]
pub struct VerificationQuery<I, O> {
    state: StateId,
    prefix: Vec<I>,
    suffix: Vec<I>,
    expected: Vec<O>,
    observed: Vec<O>,
    outcome: Option<VerificationOutcome<I, O>>,
}

impl<I: Symbol, O: Color> std::fmt::Debug for VerificationOutcome<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationOutcome::Verified => write!(f, "Verified"),
            VerificationOutcome::Diverged {
                counterexample,
                input,
                output,
            } => write!(
                f,
                "Diverged on {}/{} with {counterexample:?}",
                input.show(),
                output.show()
            ),
        }
    }
}

impl<I: Symbol, O: Color> std::fmt::Debug for VerificationQuery<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "verify {} after {} for {}, expecting {}",
            self.suffix.show(),
            self.prefix.show(),
            self.state.show(),
            self.expected.show()
        )?;
        if let Some(outcome) = &self.outcome {
            write!(f, ": {outcome:?}")?;
        }
        Ok(())
    }
}

impl<I: Symbol, O: Color> VerificationQuery<I, O> {
    pub fn new(state: StateId, prefix: Vec<I>, suffix: Vec<I>, expected: Vec<O>) -> Self {
        assert_eq!(
            suffix.len(),
            expected.len(),
            "expected output does not match the suffix"
        );
        let outcome = suffix.is_empty().then_some(VerificationOutcome::Verified);
        Self {
            state,
            prefix,
            suffix,
            expected,
            observed: vec![],
            outcome,
        }
    }

    /// The hypothesis state whose ADS trace is verified.
    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn suffix(&self) -> &[I] {
        &self.suffix
    }

    pub fn expected_output(&self) -> &[O] {
        &self.expected
    }

    /// Returns true if the query needs no (further) interaction with the system.
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<&VerificationOutcome<I, O>> {
        self.outcome.as_ref()
    }
}

impl<I: Symbol, O: Color> AdaptiveQuery<I, O> for VerificationQuery<I, O> {
    fn input(&self) -> I {
        let idx = self.observed.len();
        match self.prefix.get(idx) {
            Some(symbol) => *symbol,
            None => self.suffix[idx - self.prefix.len()],
        }
    }

    fn process_output(&mut self, output: O) -> Response {
        self.observed.push(output);
        let Some(position) = self.observed.len().checked_sub(self.prefix.len() + 1) else {
            return Response::Continue;
        };

        if self.observed[self.observed.len() - 1] != self.expected[position] {
            let k = position + 1;
            let mut input = self.prefix.clone();
            input.extend_from_slice(&self.suffix[..k]);
            self.outcome = Some(VerificationOutcome::Diverged {
                counterexample: Counterexample::new(input, self.observed.clone()),
                input: self.suffix[..k].to_vec(),
                output: self.observed[self.prefix.len()..].to_vec(),
            });
            return Response::Done;
        }

        if position + 1 == self.suffix.len() {
            self.outcome = Some(VerificationOutcome::Verified);
            return Response::Done;
        }
        Response::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(query: &mut VerificationQuery<char, u8>, outputs: &[u8]) {
        for output in outputs {
            let _ = query.input();
            if query.process_output(*output) == Response::Done {
                return;
            }
        }
    }

    #[test_log::test]
    fn mismatch_in_the_second_suffix_symbol() {
        let mut query = VerificationQuery::new(
            StateId::new(1),
            vec!['b', 'b'],
            vec!['a', 'b', 'a'],
            vec![0, 1, 1],
        );
        drive(&mut query, &[1, 0, 0, 0, 1]);
        assert_eq!(
            query.outcome(),
            Some(&VerificationOutcome::Diverged {
                counterexample: Counterexample::new(vec!['b', 'b', 'a', 'b'], vec![1, 0, 0, 0]),
                input: vec!['a', 'b'],
                output: vec![0, 0],
            })
        );
    }

    #[test_log::test]
    fn queries_and_outcomes_print() {
        let mut query = VerificationQuery::new(StateId::new(1), vec!['b'], vec!['a'], vec![0]);
        assert!(format!("{query:?}").starts_with("verify "));
        drive(&mut query, &[1, 1]);
        let outcome = format!("{:?}", query.outcome().unwrap());
        assert!(outcome.starts_with("Diverged on "));
        assert_eq!(format!("{:?}", VerificationOutcome::<char, u8>::Verified), "Verified");
    }

    #[test_log::test]
    fn matching_outputs_verify() {
        let mut query = VerificationQuery::new(StateId::new(0), vec![], vec!['a', 'b'], vec![0, 1]);
        assert!(!query.is_finished());
        drive(&mut query, &[0, 1]);
        assert_eq!(query.outcome(), Some(&VerificationOutcome::Verified));
        assert!(VerificationQuery::<char, u8>::new(StateId::new(0), vec!['a'], vec![], vec![])
            .is_finished());
    }
}
