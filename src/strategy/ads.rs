use std::collections::{BTreeMap, BTreeSet, VecDeque};

use bit_set::BitSet;
use tracing::trace;

use crate::{
    adt::Ads,
    alphabet::{Alphabet, Color, Symbol},
    error::LearnError,
    id::StateId,
    learner::PartialTransitionAnalyzer,
    math,
    mealy::Mealy,
};

/// Bounds the length of the prefix that is searched before a splitting symbol, for a machine
/// with `size` states when `current` of `total` states still have to be told apart.
pub fn maximum_splitting_word_length(size: usize, current: usize, total: usize) -> u64 {
    if total == 2 {
        return size as u64;
    }
    math::binomial(size, current)
        .saturating_sub(math::binomial(size, current.saturating_sub(1)))
        .saturating_sub(1)
}

/// Computes an adaptive distinguishing sequence for `states` in `machine`, i.e. a reset-free tree
/// whose leaves are exactly `states`. Returns `None` if there is none (or none was found within
/// the search bounds).
pub fn compute_ads<I, O, M>(
    machine: &M,
    alphabet: &Alphabet<I>,
    states: &BTreeSet<StateId>,
) -> Option<Ads<I, O>>
where
    I: Symbol,
    O: Color,
    M: Mealy<I, O, StateIndex = StateId>,
{
    if states.len() < 2 {
        return states.first().map(|q| Ads::leaf(*q));
    }
    let mut search = Search::new(machine, alphabet, states.len());
    search.compute(&identity(states))
}

/// Like [`compute_ads`] but on the partial hypothesis of `analyzer`. Whenever the search needs
/// transitions that are still open, the smallest such set is closed and the search is restarted.
/// Fails with [`LearnError::HypothesisModified`] if closing a transition created new states.
pub fn compute_defensive_ads<I: Symbol, O: Color>(
    analyzer: &mut dyn PartialTransitionAnalyzer<I, O>,
    states: &BTreeSet<StateId>,
) -> Result<Option<Ads<I, O>>, LearnError> {
    if states.len() < 2 {
        return Ok(states.first().map(|q| Ads::leaf(*q)));
    }
    let mapping = identity(states);
    loop {
        let (result, refinement) = {
            let mut search = Search::new(analyzer.hypothesis(), analyzer.alphabet(), states.len());
            let result = search.compute(&mapping);
            (result, search.refinement)
        };
        if result.is_some() {
            return Ok(result);
        }
        let Some((open, input)) = refinement else {
            return Ok(None);
        };
        trace!("closing {} open transitions before searching again", open.len());
        for state in open {
            analyzer.close_transition(state, input)?;
        }
    }
}

fn identity(states: &BTreeSet<StateId>) -> Vec<(StateId, StateId)> {
    states.iter().map(|q| (*q, *q)).collect()
}

/// A breadth-first search for prefixes after which a single symbol splits the current set of
/// states, recursing into the resulting classes. Mappings pair the state a candidate is in now
/// with the state it started from.
struct Search<'a, I, M> {
    machine: &'a M,
    alphabet: &'a Alphabet<I>,
    total: usize,
    refinement: Option<(Vec<StateId>, I)>,
}

impl<'a, I: Symbol, M> Search<'a, I, M> {
    fn new(machine: &'a M, alphabet: &'a Alphabet<I>, total: usize) -> Self {
        Self {
            machine,
            alphabet,
            total,
            refinement: None,
        }
    }

    fn as_bits<X: IntoIterator<Item = StateId>>(states: X) -> BitSet {
        states.into_iter().map(|q| q.index()).collect()
    }

    fn compute<O: Color>(&mut self, mapping: &[(StateId, StateId)]) -> Option<Ads<I, O>>
    where
        M: Mealy<I, O, StateIndex = StateId>,
    {
        let first = mapping.first()?.0;
        let bound = maximum_splitting_word_length(self.machine.size(), mapping.len(), self.total);
        let mut candidates = VecDeque::from([vec![]]);
        let mut cache: math::Set<BitSet> = math::Set::default();

        while let Some(prefix) = candidates.pop_front() {
            let Some(current) = mapping
                .iter()
                .map(|(q, initial)| Some((self.machine.reached_from(*q, &prefix)?, *initial)))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let bits = Self::as_bits(current.iter().map(|(q, _)| *q));
            if cache.contains(&bits) {
                continue;
            }

            'symbols: for input in self.alphabet.universe() {
                let open = current
                    .iter()
                    .map(|(q, _)| *q)
                    .filter(|q| self.machine.successor(*q, input).is_none())
                    .collect::<Vec<_>>();
                if !open.is_empty() {
                    if self
                        .refinement
                        .as_ref()
                        .map_or(true, |(states, _)| open.len() < states.len())
                    {
                        self.refinement = Some((open, input));
                    }
                    continue;
                }

                let mut successors: BTreeMap<O, Vec<(StateId, StateId)>> = BTreeMap::new();
                for (q, initial) in &current {
                    let (Some(output), Some(next)) =
                        (self.machine.output(*q, input), self.machine.successor(*q, input))
                    else {
                        continue 'symbols;
                    };
                    let class = successors.entry(output).or_default();
                    // two states that produce the same output and converge cannot be told apart
                    if class.iter().any(|(p, _)| *p == next) {
                        continue 'symbols;
                    }
                    class.push((next, *initial));
                }

                if successors.len() > 1 {
                    let mut children = BTreeMap::new();
                    for (output, class) in successors {
                        let class_bits = Self::as_bits(class.iter().map(|(q, _)| *q));
                        if cache.contains(&class_bits) {
                            continue 'symbols;
                        }
                        let child = if class.len() > 1 {
                            self.compute(&class)
                        } else {
                            Some(Ads::leaf(class[0].1))
                        };
                        match child {
                            Some(child) => {
                                children.insert(output, child);
                            }
                            None => {
                                cache.insert(class_bits);
                                continue 'symbols;
                            }
                        }
                    }
                    let mut word = prefix.clone();
                    word.push(input);
                    return Ads::from_trace(self.machine, first, &word, children);
                } else if (prefix.len() as u64) < bound {
                    let mut word = prefix.clone();
                    word.push(input);
                    candidates.push_back(word);
                }
            }

            cache.insert(bits);
        }
        None
    }
}
