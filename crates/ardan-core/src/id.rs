//! Strongly-typed identifiers.

use std::fmt;

/// Identifies one sensor entity.
///
/// Unique per entity and stable for its lifetime. The value is the
/// `entityId` carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Index of a branch (alternative timeline).
///
/// Branch `k` of one entity and branch `k` of another are the same
/// timeline from the registry's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BranchIndex(pub usize);

impl fmt::Display for BranchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for BranchIndex {
    fn from(v: usize) -> Self {
        Self(v)
    }
}
