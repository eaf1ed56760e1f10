use crate::{
    adt::Adt,
    alphabet::{Color, Symbol},
    error::LearnError,
    id::{NodeId, StateId},
};

/// Decides how a leaf is replaced when a new state has to be distinguished from the state of the
/// leaf. `old_output` and `new_output` are the outputs of the two states on `suffix`, they
/// differ in at least one position. Returns the leaf created for `state`.
pub trait LeafSplitter<I, O> {
    fn split(
        &self,
        adt: &mut Adt<I, O>,
        leaf: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
        state: StateId,
    ) -> Result<NodeId, LearnError>;
}

/// Starts a new ADS behind a reset node in place of the leaf.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSplitter;

impl<I: Symbol, O: Color> LeafSplitter<I, O> for DefaultSplitter {
    fn split(
        &self,
        adt: &mut Adt<I, O>,
        leaf: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
        state: StateId,
    ) -> Result<NodeId, LearnError> {
        adt.split_into_new_ads(leaf, suffix, old_output, new_output, state)
    }
}

/// Continues the ADS of the leaf if the suffix starts with the trace of the leaf, which saves a
/// reset. Falls back to [`DefaultSplitter`] otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendParentSplitter;

impl<I: Symbol, O: Color> LeafSplitter<I, O> for ExtendParentSplitter {
    fn split(
        &self,
        adt: &mut Adt<I, O>,
        leaf: NodeId,
        suffix: &[I],
        old_output: &[O],
        new_output: &[O],
        state: StateId,
    ) -> Result<NodeId, LearnError> {
        if adt.can_split_parent(leaf, suffix, old_output, new_output) {
            adt.split_parent(leaf, suffix, old_output, new_output, state)
        } else {
            adt.split_into_new_ads(leaf, suffix, old_output, new_output, state)
        }
    }
}
