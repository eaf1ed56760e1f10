use tracing::{debug, trace};

use crate::{
    adt::Adt,
    alphabet::{Alphabet, Color, Symbol},
    error::LearnError,
    id::{NodeId, StateId},
    math,
    mealy::{separating_word_from, Mealy},
    oracle::AdaptiveOracle,
    query::{AdaptiveQuery, Response},
    show::Show,
};

/// A trie of all traces the system under learning produced, shaped like a (partial) Mealy
/// machine whose initial state is node `0`. Every hypothesis state is mapped to the node reached
/// by its access sequence.
///
/// It wraps the actual oracle and answers adaptive queries from stored traces for as long as it
/// can, only the remainder of a query is passed on to the wrapped oracle. Everything the wrapped
/// oracle observes is stored. Besides caching, the tree is used to find separating words for
/// hypothesis states.
#[derive(Clone)]
pub struct ObservationTree<I, O, M> {
    alphabet: Alphabet<I>,
    delegate: M,
    use_cache: bool,
    nodes: Vec<math::Map<I, (O, usize)>>,
    states: math::Map<StateId, usize>,
}

impl<I: Symbol, O: Color, M> std::fmt::Debug for ObservationTree<I, O, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationTree")
            .field("alphabet", &self.alphabet)
            .field("use_cache", &self.use_cache)
            .field("nodes", &self.nodes.len())
            .field("states", &self.states)
            .finish()
    }
}

impl<I: Symbol, O: Color, M> ObservationTree<I, O, M> {
    /// Creates an empty observation tree on top of `delegate`. If `use_cache` is false, all
    /// queries are passed to `delegate` unchanged and the tree only holds what was explicitly
    /// inserted.
    pub fn new(alphabet: Alphabet<I>, delegate: M, use_cache: bool) -> Self {
        Self {
            alphabet,
            delegate,
            use_cache,
            nodes: vec![math::Map::default()],
            states: math::Map::default(),
        }
    }

    pub fn delegate(&self) -> &M {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut M {
        &mut self.delegate
    }

    pub fn into_delegate(self) -> M {
        self.delegate
    }

    /// The number of nodes, i.e. one more than the number of distinct non-empty stored prefixes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_alphabet_symbol(&mut self, symbol: I) {
        self.alphabet.add_symbol(symbol);
    }

    /// Maps the initial hypothesis state to the root of the trie.
    pub fn initialize(&mut self, state: StateId) {
        self.states.insert(state, 0);
    }

    /// Forgets all state mappings and stores the given access sequences together with their
    /// outputs, mapping each state to the node its access sequence reaches.
    pub fn initialize_from<X>(&mut self, states: X)
    where
        X: IntoIterator<Item = (StateId, Vec<I>, Vec<O>)>,
    {
        self.states.clear();
        for (state, access, output) in states {
            let node = self.insert(0, &access, &output);
            self.states.insert(state, node);
        }
    }

    fn node_of(&self, state: StateId) -> Result<usize, LearnError> {
        self.states.get(&state).copied().ok_or_else(|| {
            LearnError::MissingObservation(format!("state {state:?} is not registered"))
        })
    }

    /// Registers `state` whose access sequence ends with a symbol that produced `output`. All
    /// proper prefixes of `access` have to be stored already.
    pub fn add_state(
        &mut self,
        state: StateId,
        access: &[I],
        output: O,
    ) -> Result<(), LearnError> {
        let (&last, prefix) = access.split_last().ok_or_else(|| {
            LearnError::MissingObservation("cannot add a state with empty access sequence".into())
        })?;
        let predecessor = self.reached_from(0, prefix).ok_or_else(|| {
            LearnError::MissingObservation(format!("prefix {} is not stored", prefix.show()))
        })?;
        let node = self.insert(predecessor, &[last], &[output]);
        self.states.insert(state, node);
        Ok(())
    }

    /// Stores that `state` produces `output` on `input`.
    pub fn add_trace(&mut self, state: StateId, input: &[I], output: &[O]) -> Result<(), LearnError> {
        let node = self.node_of(state)?;
        self.insert(node, input, output);
        Ok(())
    }

    /// Stores the traces `state` produces in the tree as seen from `node`: the trace of `node`
    /// in its ADS, and the traces of every reset node that precedes an enclosing ADS.
    pub fn add_trace_for_node(
        &mut self,
        state: StateId,
        adt: &Adt<I, O>,
        node: NodeId,
    ) -> Result<(), LearnError> {
        let internal = self.node_of(state)?;
        let mut current = Some(node);
        while let Some(n) = current {
            let (input, output) = adt.trace(n);
            self.insert(internal, &input, &output);
            current = adt.parent(adt.start_of_ads(n));
        }
        Ok(())
    }

    /// Searches a shortest word that separates `first` and `second` according to the stored
    /// traces, after both ran `prefix`. Returns `None` if `prefix` leaves the stored traces of
    /// either state or if no separating word is stored.
    pub fn find_separating_word(
        &self,
        first: StateId,
        second: StateId,
        prefix: Option<&[I]>,
    ) -> Option<Vec<I>> {
        let prefix = prefix.unwrap_or(&[]);
        let left = self.reached_from(*self.states.get(&first)?, prefix)?;
        let right = self.reached_from(*self.states.get(&second)?, prefix)?;
        separating_word_from(self, left, self, right, &self.alphabet)
    }

    /// The stored outputs of `state` on `input`.
    pub fn trace(&self, state: StateId, input: &[I]) -> Option<Vec<O>> {
        self.transform_from(*self.states.get(&state)?, input)
    }

    /// Inserts the trace starting at `node` and returns the node that is reached. An output that
    /// contradicts a stored one is ignored in favour of the stored one.
    fn insert(&mut self, node: usize, input: &[I], output: &[O]) -> usize {
        let mut current = node;
        for (symbol, out) in input.iter().zip(output) {
            current = match self.nodes[current].get(symbol) {
                Some((stored, target)) => {
                    if stored != out {
                        debug!(
                            "observed {} on {} where {} was stored before, keeping the stored output",
                            out.show(),
                            symbol.show(),
                            stored.show()
                        );
                    }
                    *target
                }
                None => {
                    self.nodes.push(math::Map::default());
                    let target = self.nodes.len() - 1;
                    self.nodes[current].insert(*symbol, (out.clone(), target));
                    target
                }
            };
        }
        current
    }

    // answers the query from stored traces, returns the inputs of the current session if the
    // trie does not know how to continue
    fn answer_from_cache<Q: AdaptiveQuery<I, O>>(&self, query: &mut Q) -> Option<Vec<I>> {
        let mut node = 0;
        let mut session = vec![];
        loop {
            let input = query.input();
            let Some((output, target)) = self.nodes[node].get(&input).cloned() else {
                return Some(session);
            };
            match query.process_output(output) {
                Response::Continue => {
                    session.push(input);
                    node = target;
                }
                Response::Reset => {
                    session.clear();
                    node = 0;
                }
                Response::Done => return None,
            }
        }
    }
}

impl<I: Symbol, O: Color, M> Mealy<I, O> for ObservationTree<I, O, M> {
    type StateIndex = usize;

    fn initial(&self) -> Option<usize> {
        Some(0)
    }

    fn successor(&self, state: usize, input: I) -> Option<usize> {
        self.nodes.get(state)?.get(&input).map(|(_, q)| *q)
    }

    fn output(&self, state: usize, input: I) -> Option<O> {
        self.nodes.get(state)?.get(&input).map(|(o, _)| o.clone())
    }

    fn size(&self) -> usize {
        self.nodes.len()
    }
}

impl<I: Symbol, O: Color, M: AdaptiveOracle<I, O>> AdaptiveOracle<I, O>
    for ObservationTree<I, O, M>
{
    fn process_queries<Q: AdaptiveQuery<I, O>>(&mut self, queries: &mut [Q]) {
        if !self.use_cache {
            self.delegate.process_queries(queries);
            return;
        }

        let mut pending = (0..queries.len()).collect::<Vec<_>>();
        while !pending.is_empty() {
            let mut backlogs = math::Map::default();
            for idx in pending.drain(..) {
                if let Some(backlog) = self.answer_from_cache(&mut queries[idx]) {
                    backlogs.insert(idx, backlog);
                }
            }
            if backlogs.is_empty() {
                break;
            }
            trace!("passing {} queries on to the wrapped oracle", backlogs.len());

            let mut tracking = queries
                .iter_mut()
                .enumerate()
                .filter_map(|(idx, query)| {
                    backlogs
                        .remove(&idx)
                        .map(|backlog| TrackingQuery::new(idx, query, backlog))
                })
                .collect::<Vec<_>>();
            self.delegate.process_queries(&mut tracking);

            let sessions = tracking
                .into_iter()
                .map(TrackingQuery::into_session)
                .collect::<Vec<_>>();
            for (idx, input, output, needs_reset) in sessions {
                self.insert(0, &input, &output);
                if needs_reset {
                    pending.push(idx);
                }
            }
        }
    }
}

/// Replays the inputs a query consumed from the cache in its current session, then forwards to
/// the query while recording the whole session. A reset requested by the query ends the tracked
/// session, so that the next one can again be answered from the cache.
struct TrackingQuery<'q, I, O, Q> {
    idx: usize,
    query: &'q mut Q,
    backlog: Vec<I>,
    input: Vec<I>,
    output: Vec<O>,
    needs_reset: bool,
}

impl<'q, I: Symbol, O: Color, Q: AdaptiveQuery<I, O>> TrackingQuery<'q, I, O, Q> {
    fn new(idx: usize, query: &'q mut Q, backlog: Vec<I>) -> Self {
        Self {
            idx,
            query,
            backlog,
            input: vec![],
            output: vec![],
            needs_reset: false,
        }
    }

    fn into_session(self) -> (usize, Vec<I>, Vec<O>, bool) {
        (self.idx, self.input, self.output, self.needs_reset)
    }
}

impl<'q, I: Symbol, O: Color, Q: AdaptiveQuery<I, O>> AdaptiveQuery<I, O>
    for TrackingQuery<'q, I, O, Q>
{
    fn input(&self) -> I {
        match self.backlog.get(self.input.len()) {
            Some(symbol) => *symbol,
            None => self.query.input(),
        }
    }

    fn process_output(&mut self, output: O) -> Response {
        let input = self.input();
        let replaying = self.input.len() < self.backlog.len();
        self.input.push(input);
        self.output.push(output.clone());
        if replaying {
            return Response::Continue;
        }
        match self.query.process_output(output) {
            Response::Reset => {
                self.needs_reset = true;
                Response::Done
            }
            response => response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mealy::MealyMachine,
        oracle::{MealySul, MembershipOracle, MembershipWrapper, SulOracle},
        query::{PresetQuery, SiftQuery},
        strategy::DefaultSplitter,
    };

    fn toggle() -> MealyMachine<char, u8> {
        MealyMachine::builder()
            .with_transitions([
                (0, 'a', 0, 0),
                (0, 'b', 1, 1),
                (1, 'a', 0, 0),
                (1, 'b', 0, 1),
            ])
            .into_mealy(0)
    }

    fn tree(use_cache: bool) -> ObservationTree<char, u8, SulOracle<MealySul<char, u8>>> {
        let mm = toggle();
        ObservationTree::new(mm.alphabet().clone(), SulOracle::new(MealySul::new(mm)), use_cache)
    }

    #[test_log::test]
    fn cached_queries_are_not_repeated() {
        let mut ot = tree(true);
        let mut first = [PresetQuery::new(&['b'], &['b', 'a'])];
        ot.process_queries(&mut first);
        assert_eq!(first[0].output(), &[0, 0]);
        assert_eq!(ot.delegate().queries(), 1);

        // a prefix of what was already asked
        let mut second = [PresetQuery::new(&['b'], &['b'])];
        ot.process_queries(&mut second);
        assert_eq!(second[0].output(), &[0]);
        assert_eq!(ot.delegate().queries(), 1);

        // continues beyond the stored trace, the stored part is replayed
        let mut third = [PresetQuery::new(&['b', 'b'], &['a', 'b'])];
        ot.process_queries(&mut third);
        assert_eq!(third[0].output(), &[0, 1]);
        assert_eq!(ot.delegate().queries(), 2);
        assert_eq!(ot.delegate().symbols(), 3 + 4);
        assert_eq!(ot.transform(&['b', 'b', 'a', 'b']), Some(vec![1, 0, 0, 1]));

        let mut wrapper = MembershipWrapper::new(&mut ot);
        assert_eq!(wrapper.answer_query(&['b', 'b', 'a'], &['b']), vec![1]);
        assert_eq!(ot.delegate().queries(), 2);
    }

    #[test_log::test]
    fn without_cache_everything_is_forwarded() {
        let mut ot = tree(false);
        for _ in 0..2 {
            let mut queries = [PresetQuery::new(&['b'], &['b'])];
            ot.process_queries(&mut queries);
            assert_eq!(queries[0].output(), &[0]);
        }
        assert_eq!(ot.delegate().queries(), 2);
        assert_eq!(ot.node_count(), 1);
    }

    #[test_log::test]
    fn queries_with_resets_are_cached_per_session() {
        let mut adt = Adt::new();
        let l0 = adt.initialize(StateId::new(0));
        let l1 = adt
            .split_leaf(l0, &['b'], &[1], &[0], StateId::new(1), &DefaultSplitter)
            .unwrap();
        adt.split_leaf(l1, &['a', 'b'], &[0, 0], &[0, 1], StateId::new(2), &DefaultSplitter)
            .unwrap();
        let root = adt.root().unwrap();

        let mut ot = tree(true);
        let mut queries = [SiftQuery::new(&adt, &['b'], 'b', root)];
        ot.process_queries(&mut queries);
        // bb a b after the reset, bb b before it
        assert_eq!(ot.delegate().sessions(), 2);
        let outcome = queries[0].outcome().unwrap();
        assert_eq!(outcome.output, 0);

        let mut again = [SiftQuery::new(&adt, &['b'], 'b', root)];
        ot.process_queries(&mut again);
        assert_eq!(again[0].outcome().unwrap(), outcome);
        assert_eq!(ot.delegate().sessions(), 2);
    }

    #[test_log::test]
    fn separating_words_and_traces() {
        let mut ot = tree(true);
        ot.initialize(StateId::new(0));
        ot.add_state(StateId::new(1), &['b'], 1).unwrap();
        assert!(ot.add_state(StateId::new(2), &['a', 'a'], 0).is_err());
        assert_eq!(ot.find_separating_word(StateId::new(0), StateId::new(1), None), None);

        ot.add_trace(StateId::new(0), &['b'], &[1]).unwrap();
        ot.add_trace(StateId::new(1), &['b'], &[0]).unwrap();
        assert_eq!(
            ot.find_separating_word(StateId::new(0), StateId::new(1), None),
            Some(vec!['b'])
        );
        assert_eq!(
            ot.find_separating_word(StateId::new(0), StateId::new(1), Some(&['b'])),
            None
        );
        assert_eq!(ot.trace(StateId::new(0), &['b', 'b']), Some(vec![1, 0]));
        assert_eq!(ot.trace(StateId::new(1), &['a']), None);
        assert!(ot.add_trace(StateId::new(5), &['a'], &[0]).is_err());

        ot.initialize_from([(StateId::new(3), vec!['b', 'b'], vec![1, 0])]);
        assert_eq!(ot.trace(StateId::new(3), &['a']), None);
        assert!(ot.trace(StateId::new(0), &[]).is_none());
    }
}
