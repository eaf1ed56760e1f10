use tracing::{trace, warn};

use crate::{
    alphabet::{Color, Symbol},
    mealy::{Mealy, MealyMachine},
    query::{AdaptiveQuery, Response},
};

use super::AdaptiveOracle;

/// A system under learning that can be reset and stimulated one input at a time.
pub trait Sul<I, O> {
    /// Brings the system into its initial state, called before every session.
    fn pre(&mut self);

    /// Applies `input` and returns the output, `None` if the system cannot process `input`.
    fn step(&mut self, input: I) -> Option<O>;

    /// Called after every session.
    fn post(&mut self) {}
}

/// Simulates a [`MealyMachine`].
#[derive(Clone)]
pub struct MealySul<I, O> {
    machine: MealyMachine<I, O>,
    current: usize,
}

impl<I: Symbol, O: Color> MealySul<I, O> {
    pub fn new(machine: MealyMachine<I, O>) -> Self {
        let current = machine.initial().unwrap_or(0);
        Self { machine, current }
    }

    pub fn machine(&self) -> &MealyMachine<I, O> {
        &self.machine
    }
}

impl<I: Symbol, O: Color> std::fmt::Debug for MealySul<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "in state {} of\n{:?}", self.current, self.machine)
    }
}

impl<I: Symbol, O: Color> Sul<I, O> for MealySul<I, O> {
    fn pre(&mut self) {
        self.current = self.machine.initial().unwrap_or(0);
    }

    fn step(&mut self, input: I) -> Option<O> {
        let output = self.machine.output(self.current, input)?;
        self.current = self.machine.successor(self.current, input)?;
        Some(output)
    }
}

/// Answers adaptive queries by running them on a [`Sul`], one after the other. Keeps track of
/// how much work that was.
#[derive(Debug, Clone)]
pub struct SulOracle<S> {
    sul: S,
    queries: usize,
    sessions: usize,
    symbols: usize,
}

impl<S> SulOracle<S> {
    pub fn new(sul: S) -> Self {
        Self {
            sul,
            queries: 0,
            sessions: 0,
            symbols: 0,
        }
    }

    pub fn sul(&self) -> &S {
        &self.sul
    }

    /// The number of queries answered so far.
    pub fn queries(&self) -> usize {
        self.queries
    }

    /// The number of sessions, i.e. resets of the system.
    pub fn sessions(&self) -> usize {
        self.sessions
    }

    /// The number of input symbols applied to the system.
    pub fn symbols(&self) -> usize {
        self.symbols
    }
}

impl<I: Symbol, O: Color, S: Sul<I, O>> AdaptiveOracle<I, O> for SulOracle<S> {
    fn process_queries<Q: AdaptiveQuery<I, O>>(&mut self, queries: &mut [Q]) {
        for query in queries {
            self.queries += 1;
            self.sessions += 1;
            self.sul.pre();
            loop {
                let input = query.input();
                let Some(output) = self.sul.step(input) else {
                    warn!("system cannot process {}, giving up on query", input.show());
                    break;
                };
                self.symbols += 1;
                match query.process_output(output) {
                    Response::Continue => {}
                    Response::Reset => {
                        self.sul.post();
                        self.sessions += 1;
                        self.sul.pre();
                    }
                    Response::Done => break,
                }
            }
            self.sul.post();
        }
        trace!(
            "answered {} queries, {} sessions and {} symbols in total",
            self.queries,
            self.sessions,
            self.symbols
        );
    }
}
