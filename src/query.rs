//! Adaptive queries are small resumable state machines. An oracle repeatedly asks a query for the
//! next input, feeds the observed output back and obeys the returned [`Response`].

mod sift;
pub use sift::{SiftEnd, SiftOutcome, SiftQuery};

mod verification;
pub use verification::{VerificationOutcome, VerificationQuery};

mod ambiguity;
pub use ambiguity::AmbiguityQuery;

mod preset;
pub use preset::PresetQuery;

/// What the oracle should do after it passed an output to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Keep asking for inputs in the current session.
    Continue,
    /// Discard the current session, reset the system and continue with a fresh one.
    Reset,
    /// The query is answered, no more inputs will be requested.
    Done,
}

/// A query that is answered symbol by symbol. Implementations must return the same symbol from
/// [`AdaptiveQuery::input`] until the next call of [`AdaptiveQuery::process_output`], and each
/// session starts from the initial state of the system.
pub trait AdaptiveQuery<I, O> {
    /// The input that should be applied next.
    fn input(&self) -> I;

    /// Consumes the output the system produced for the last input.
    fn process_output(&mut self, output: O) -> Response;
}

impl<I, O, Q: AdaptiveQuery<I, O> + ?Sized> AdaptiveQuery<I, O> for &mut Q {
    fn input(&self) -> I {
        (**self).input()
    }

    fn process_output(&mut self, output: O) -> Response {
        (**self).process_output(output)
    }
}
