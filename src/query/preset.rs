use crate::alphabet::{Color, Symbol};

use super::{AdaptiveQuery, Response};

/// A non-adaptive query: runs `prefix` followed by `suffix` in a single session and records the
/// outputs on `suffix`.
#[derive(Debug, Clone)]
pub struct PresetQuery<I, O> {
    prefix: Vec<I>,
    suffix: Vec<I>,
    idx: usize,
    output: Vec<O>,
}

impl<I: Symbol, O: Color> PresetQuery<I, O> {
    /// Creates the query, `prefix` and `suffix` must not both be empty.
    pub fn new(prefix: &[I], suffix: &[I]) -> Self {
        assert!(
            !(prefix.is_empty() && suffix.is_empty()),
            "cannot pose a query for the empty word"
        );
        Self {
            prefix: prefix.to_vec(),
            suffix: suffix.to_vec(),
            idx: 0,
            output: Vec::with_capacity(suffix.len()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.idx == self.prefix.len() + self.suffix.len()
    }

    /// The outputs observed on the suffix.
    pub fn output(&self) -> &[O] {
        &self.output
    }

    pub fn into_output(self) -> Vec<O> {
        self.output
    }
}

impl<I: Symbol, O: Color> AdaptiveQuery<I, O> for PresetQuery<I, O> {
    fn input(&self) -> I {
        match self.prefix.get(self.idx) {
            Some(symbol) => *symbol,
            None => self.suffix[self.idx - self.prefix.len()],
        }
    }

    fn process_output(&mut self, output: O) -> Response {
        if self.idx >= self.prefix.len() {
            self.output.push(output);
        }
        self.idx += 1;
        if self.is_finished() {
            Response::Done
        } else {
            Response::Continue
        }
    }
}
