use crate::{
    alphabet::{Color, Symbol},
    query::PresetQuery,
};

use super::AdaptiveOracle;

/// Answers classical membership queries, i.e. returns the outputs the system produces on `suffix`
/// after running `prefix` from its initial state.
pub trait MembershipOracle<I, O> {
    fn answer_query(&mut self, prefix: &[I], suffix: &[I]) -> Vec<O>;
}

/// Poses membership queries as [`PresetQuery`]s to an [`AdaptiveOracle`].
#[derive(Debug)]
pub struct MembershipWrapper<'a, A> {
    oracle: &'a mut A,
}

impl<'a, A> MembershipWrapper<'a, A> {
    pub fn new(oracle: &'a mut A) -> Self {
        Self { oracle }
    }
}

impl<'a, I: Symbol, O: Color, A: AdaptiveOracle<I, O>> MembershipOracle<I, O>
    for MembershipWrapper<'a, A>
{
    fn answer_query(&mut self, prefix: &[I], suffix: &[I]) -> Vec<O> {
        if suffix.is_empty() {
            return vec![];
        }
        let mut query = PresetQuery::new(prefix, suffix);
        self.oracle.process_query(&mut query);
        query.into_output()
    }
}
