use std::collections::{BTreeSet, VecDeque};

use tracing::trace;

use crate::{
    adt::{Adt, Ads},
    alphabet::{Alphabet, Color, Symbol},
    hypothesis::AdtHypothesis,
    id::{NodeId, StateId},
    mealy::Mealy,
};

use super::compute_ads;

/// A proposal to replace the subtree rooted in `node_to_replace` by a reset-free ADS. The states
/// in `cutout` are identified by the old subtree but not by the replacement, the learner has to
/// distinguish them again when installing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement<I, O> {
    pub node_to_replace: NodeId,
    pub replacement: Ads<I, O>,
    pub cutout: BTreeSet<StateId>,
}

impl<I, O> Replacement<I, O> {
    pub fn new(node_to_replace: NodeId, replacement: Ads<I, O>) -> Self {
        Self {
            node_to_replace,
            replacement,
            cutout: BTreeSet::new(),
        }
    }
}

/// Proposes subtrees of the tree that could be replaced by ADSs with fewer resets. Proposals
/// are computed on the (closed) hypothesis, the learner verifies them before they are installed.
pub trait SubtreeReplacer<I, O> {
    fn compute_replacements(
        &self,
        hypothesis: &AdtHypothesis<I, O>,
        alphabet: &Alphabet<I>,
        adt: &Adt<I, O>,
    ) -> Vec<Replacement<I, O>>;
}

/// Never proposes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverReplace;

impl<I: Symbol, O: Color> SubtreeReplacer<I, O> for NeverReplace {
    fn compute_replacements(
        &self,
        _hypothesis: &AdtHypothesis<I, O>,
        _alphabet: &Alphabet<I>,
        _adt: &Adt<I, O>,
    ) -> Vec<Replacement<I, O>> {
        vec![]
    }
}

/// Tries to get rid of the reset node in front of `node` by continuing the ADS the reset node
/// belongs to. Fails if `node` does not follow a reset node, if two of `states` converge on the
/// trace leading to the reset node, or if there is no ADS for the states reached.
fn compute_parent_extension<I: Symbol, O: Color>(
    hypothesis: &AdtHypothesis<I, O>,
    alphabet: &Alphabet<I>,
    adt: &Adt<I, O>,
    node: NodeId,
    states: &BTreeSet<StateId>,
) -> Option<Replacement<I, O>> {
    let reset = adt.parent(node).filter(|p| adt.is_reset(*p))?;
    let (inputs, _) = adt.trace(reset);

    let mut mapping: Vec<(StateId, StateId)> = states.iter().map(|q| (*q, *q)).collect();
    for input in inputs {
        let mut next: Vec<(StateId, StateId)> = Vec::with_capacity(mapping.len());
        for (current, origin) in &mapping {
            let successor = hypothesis.successor(*current, input)?;
            if next.iter().any(|(q, _)| *q == successor) {
                return None;
            }
            next.push((successor, *origin));
        }
        mapping = next;
    }

    let current = mapping.iter().map(|(q, _)| *q).collect();
    let ads = compute_ads(hypothesis, alphabet, &current)?;
    let origin = |q: StateId| {
        mapping
            .iter()
            .find(|(current, _)| *current == q)
            .map_or(q, |(_, origin)| *origin)
    };
    trace!("the ADS behind {reset:?} can continue its parent");
    Some(Replacement::new(reset, ads.map_states(&origin)))
}

/// Looks at the ADSs behind reset nodes, those with the fewest resets per leaf first, and
/// proposes the first improvement it finds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleReplacer;

impl<I: Symbol, O: Color> SubtreeReplacer<I, O> for SingleReplacer {
    fn compute_replacements(
        &self,
        hypothesis: &AdtHypothesis<I, O>,
        alphabet: &Alphabet<I>,
        adt: &Adt<I, O>,
    ) -> Vec<Replacement<I, O>> {
        let Some(root) = adt.root() else {
            return vec![];
        };
        let mut candidates: Vec<(NodeId, usize, usize)> = adt
            .collect_ads_nodes(root)
            .into_iter()
            .filter(|node| *node != root)
            .map(|node| {
                (
                    node,
                    1 + adt.collect_reset_nodes(node).len(),
                    adt.collect_leaves(node).len(),
                )
            })
            .collect();
        // resets per leaf, compared without dividing
        candidates.sort_by(|(_, r1, l1), (_, r2, l2)| (r1 * l2).cmp(&(r2 * l1)));

        for (node, resets, _) in candidates {
            let states = adt.collect_states(node);
            if let Some(extension) =
                compute_parent_extension(hypothesis, alphabet, adt, node, &states)
            {
                return vec![extension];
            }
            if resets == 1 {
                continue;
            }
            if let Some(ads) = compute_ads(hypothesis, alphabet, &states) {
                return vec![Replacement::new(node, ads)];
            }
        }
        vec![]
    }
}

/// Tries to replace the whole tree by a single ADS. If there is none, it tries ADSs for all
/// states except those of one sub-ADS, smallest sub-ADSs first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveReplacer;

impl<I: Symbol, O: Color> SubtreeReplacer<I, O> for ExhaustiveReplacer {
    fn compute_replacements(
        &self,
        hypothesis: &AdtHypothesis<I, O>,
        alphabet: &Alphabet<I>,
        adt: &Adt<I, O>,
    ) -> Vec<Replacement<I, O>> {
        let Some(root) = adt.root() else {
            return vec![];
        };
        if adt.collect_reset_nodes(root).is_empty() {
            return vec![];
        }
        let all = adt.collect_states(root);
        if let Some(ads) = compute_ads(hypothesis, alphabet, &all) {
            return vec![Replacement::new(root, ads)];
        }

        let mut candidates: Vec<(NodeId, BTreeSet<StateId>)> = adt
            .collect_ads_nodes(root)
            .into_iter()
            .filter(|node| *node != root)
            .map(|node| (node, adt.collect_states(node)))
            .collect();
        candidates.sort_by_key(|(_, states)| states.len());

        for (node, cutout) in candidates {
            let targets: BTreeSet<StateId> = all.difference(&cutout).copied().collect();
            if targets.len() < 2 {
                continue;
            }
            if let Some(ads) = compute_ads(hypothesis, alphabet, &targets) {
                trace!("found an ADS when leaving out the states below {node:?}");
                return vec![Replacement {
                    node_to_replace: root,
                    replacement: ads,
                    cutout,
                }];
            }
        }
        vec![]
    }
}

/// Walks through the ADSs of the tree in level order. Every ADS that can be replaced (either by
/// continuing its parent or by a single ADS for all of its states) is proposed, the ADSs below a
/// proposed one are not looked at anymore.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelOrderReplacer;

impl<I: Symbol, O: Color> SubtreeReplacer<I, O> for LevelOrderReplacer {
    fn compute_replacements(
        &self,
        hypothesis: &AdtHypothesis<I, O>,
        alphabet: &Alphabet<I>,
        adt: &Adt<I, O>,
    ) -> Vec<Replacement<I, O>> {
        let Some(root) = adt.root() else {
            return vec![];
        };
        if adt.collect_reset_nodes(root).is_empty() {
            return vec![];
        }

        let mut out = vec![];
        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            let states = adt.collect_states(node);
            if node != root {
                if let Some(extension) =
                    compute_parent_extension(hypothesis, alphabet, adt, node, &states)
                {
                    out.push(extension);
                    continue;
                }
            }
            if adt.collect_reset_nodes(node).is_empty() {
                continue;
            }
            match compute_ads(hypothesis, alphabet, &states) {
                Some(ads) => out.push(Replacement::new(node, ads)),
                None => queue.extend(adt.collect_direct_sub_adss(node)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(i: usize) -> StateId {
        StateId::new(i)
    }

    /// A closed hypothesis with the given transitions, access sequences are left empty.
    fn hypothesis(edges: &[(usize, char, u8, usize)]) -> AdtHypothesis<char, u8> {
        let mut hyp = AdtHypothesis::new(alphabet!(simple 'a', 'b'));
        let size = edges.iter().map(|(p, _, _, _)| *p).max().unwrap() + 1;
        for _ in 0..size {
            hyp.add_state(vec![]);
        }
        for (source, input, output, target) in edges {
            let t = hyp.create_open_transition(q(*source), *input, NodeId::new(0));
            hyp.set_output(t, *output);
            hyp.set_target(t, Some(q(*target)));
        }
        hyp
    }

    /// `b` splits off `q2`, `q0` and `q1` are told apart by `a` after a reset.
    fn tree() -> Adt<char, u8> {
        let mut adt = Adt::new();
        let leaf = adt.initialize(q(0));
        let top = adt.graft(&Ads::symbol('b', [(1, Ads::leaf(q(2)))]));
        let inner = adt.graft(&Ads::symbol('a', [(0, Ads::leaf(q(0))), (1, Ads::leaf(q(1)))]));
        let reset = adt.add_reset_node(inner);
        adt.attach(top, 0, reset).unwrap();
        adt.replace_child(leaf, top).unwrap();
        adt
    }

    fn with_ads() -> AdtHypothesis<char, u8> {
        hypothesis(&[
            (0, 'a', 0, 1),
            (0, 'b', 0, 0),
            (1, 'a', 1, 0),
            (1, 'b', 0, 1),
            (2, 'a', 0, 2),
            (2, 'b', 1, 2),
        ])
    }

    #[test_log::test]
    fn single_replacer_extends_the_parent() {
        let hyp = with_ads();
        let adt = tree();
        let root = adt.root().unwrap();
        let reset = adt.collect_reset_nodes(root)[0];

        let proposals = SingleReplacer.compute_replacements(&hyp, hyp.alphabet(), &adt);
        assert_eq!(
            proposals,
            vec![Replacement::new(
                reset,
                Ads::symbol('a', [(0, Ads::leaf(q(0))), (1, Ads::leaf(q(1)))])
            )]
        );
    }

    #[test_log::test]
    fn whole_tree_replacements() {
        let hyp = with_ads();
        let adt = tree();
        let root = adt.root().unwrap();
        let expected = Ads::symbol(
            'a',
            [
                (0, Ads::symbol('a', [(1, Ads::leaf(q(0))), (0, Ads::leaf(q(2)))])),
                (1, Ads::leaf(q(1))),
            ],
        );

        let proposals = LevelOrderReplacer.compute_replacements(&hyp, hyp.alphabet(), &adt);
        assert_eq!(proposals, vec![Replacement::new(root, expected.clone())]);
        let proposals = ExhaustiveReplacer.compute_replacements(&hyp, hyp.alphabet(), &adt);
        assert_eq!(proposals, vec![Replacement::new(root, expected)]);
        assert!(NeverReplace
            .compute_replacements(&hyp, hyp.alphabet(), &adt)
            .is_empty());
    }

    #[test_log::test]
    fn cutting_out_states() {
        // `a` merges q0 and q3, `b` merges q1 and q2, so there is no ADS for all four
        let hyp = hypothesis(&[
            (0, 'a', 0, 0),
            (0, 'b', 0, 0),
            (1, 'a', 1, 1),
            (1, 'b', 0, 1),
            (2, 'a', 2, 2),
            (2, 'b', 0, 1),
            (3, 'a', 0, 0),
            (3, 'b', 1, 0),
        ]);
        let mut adt = Adt::new();
        let leaf = adt.initialize(q(0));
        let top = adt.graft(&Ads::symbol('a', [(1, Ads::leaf(q(1))), (2, Ads::leaf(q(2)))]));
        let inner = adt.graft(&Ads::symbol('b', [(0, Ads::leaf(q(0))), (1, Ads::leaf(q(3)))]));
        let reset = adt.add_reset_node(inner);
        adt.attach(top, 0, reset).unwrap();
        adt.replace_child(leaf, top).unwrap();
        let root = adt.root().unwrap();

        let proposals = ExhaustiveReplacer.compute_replacements(&hyp, hyp.alphabet(), &adt);
        assert_eq!(
            proposals,
            vec![Replacement {
                node_to_replace: root,
                replacement: Ads::symbol('a', [(1, Ads::leaf(q(1))), (2, Ads::leaf(q(2)))]),
                cutout: BTreeSet::from([q(0), q(3)]),
            }]
        );
        assert!(LevelOrderReplacer
            .compute_replacements(&hyp, hyp.alphabet(), &adt)
            .is_empty());
        assert!(SingleReplacer
            .compute_replacements(&hyp, hyp.alphabet(), &adt)
            .is_empty());
    }
}
