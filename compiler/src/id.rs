// id.rs — Typed indices for the two netlists
//
// Both netlists are dense, append-only arenas. A net's position is its
// permanent identity, so indices are plain integers wrapped in one newtype
// per index space. A dataflow `NetId` can never be handed to an API that
// expects a clocked `ClkNetId`, and vice versa.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a net in a dataflow [`crate::flow::Func`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetId(pub u32);

/// Index of a condition (branch) in a dataflow [`crate::flow::Func`].
///
/// The condition's position doubles as its branch id in the synthesized
/// arbitration register.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CondId(pub u32);

/// Index of a net in a clocked [`crate::clocked::Module`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClkNetId(pub u32);

macro_rules! arena_index {
    ($ty:ident, $prefix:literal) => {
        impl $ty {
            /// Position in the owning arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                $ty(index as u32)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

arena_index!(NetId, "net#");
arena_index!(CondId, "cond#");
arena_index!(ClkNetId, "clk#");
