use crate::query::AdaptiveQuery;

mod sul;
pub use sul::{MealySul, Sul, SulOracle};

mod membership;
pub use membership::{MembershipOracle, MembershipWrapper};

mod equivalence;
pub use equivalence::{Counterexample, EquivalenceOracle, MealyOracle};

/// Answers batches of [`AdaptiveQuery`]s. An implementation has to drive every query until it
/// returns [`crate::query::Response::Done`], starting a fresh session of the system whenever a
/// query asks for a reset. The queries of one batch are independent of each other, so they may
/// be processed in any order or in parallel.
pub trait AdaptiveOracle<I, O> {
    /// Answers all queries in the batch.
    fn process_queries<Q: AdaptiveQuery<I, O>>(&mut self, queries: &mut [Q]);

    /// Answers a single query.
    fn process_query<Q: AdaptiveQuery<I, O>>(&mut self, query: &mut Q) {
        self.process_queries(std::slice::from_mut(query))
    }
}

impl<I, O, A: AdaptiveOracle<I, O>> AdaptiveOracle<I, O> for &mut A {
    fn process_queries<Q: AdaptiveQuery<I, O>>(&mut self, queries: &mut [Q]) {
        (**self).process_queries(queries)
    }
}
