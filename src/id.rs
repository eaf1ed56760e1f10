use std::fmt::Debug;

use crate::show::Show;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(usize);

        impl $name {
            /// Creates a new index.
            pub fn new(index: usize) -> Self {
                Self(index)
            }

            /// Returns the underlying `usize`.
            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl Show for $name {
            fn show(&self) -> String {
                format!(concat!($prefix, "{}"), self.0)
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value)
            }
        }
    };
}

index_type!(
    /// Identifies a state of the hypothesis.
    StateId,
    "q"
);
index_type!(
    /// Identifies a transition of the hypothesis.
    TransitionId,
    "t"
);
index_type!(
    /// Identifies a node in the arena of an [`crate::adt::Adt`]. Indices stay valid for the
    /// whole lifetime of the tree, nodes that are cut out are never reused.
    NodeId,
    "n"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(StateId::new(3).show(), "q3");
        assert_eq!(format!("{:?}", NodeId::new(0)), "n0");
        assert_eq!(TransitionId::from(7).index(), 7);
    }
}
