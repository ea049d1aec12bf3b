//! Plain-data snapshot of a fleet's recorded history.
//!
//! A [`FleetHistory`] is what the registry copies out for persistence and
//! accepts back on restore. It carries no behaviour beyond validation;
//! the registry rebuilds live [`BranchSet`]s from it.

use ardan_core::{BranchIndex, EntityId, State, TimelineError};

use crate::branch::BranchSet;
use crate::timeline::Timeline;

/// One entity's live state and every branch it has recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityHistory {
    /// The entity.
    pub entity: EntityId,
    /// The live (not yet recorded) state at copy time.
    pub live: State,
    /// All branches with the active index and baseline.
    pub branches: BranchSet,
}

/// Every registered entity's history plus the fleet-wide branch pointer.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FleetHistory {
    /// Global active-branch index.
    pub active_branch: BranchIndex,
    /// Number of branches every entity must hold.
    pub branch_count: usize,
    /// Per-entity histories, in registration order.
    pub entities: Vec<EntityHistory>,
}

impl FleetHistory {
    /// Check that the fleet is internally consistent.
    ///
    /// Every entity must hold exactly `branch_count` branches with
    /// `active_branch` selected, ids must be unique, and every timeline
    /// must pass [`Timeline::check`].
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.branch_count == 0 || self.active_branch.0 >= self.branch_count {
            return Err(TimelineError::InvalidBranchIndex {
                index: self.active_branch,
                branch_count: self.branch_count,
            });
        }
        let mut seen = std::collections::HashSet::with_capacity(self.entities.len());
        for e in &self.entities {
            if !seen.insert(e.entity) {
                return Err(TimelineError::DuplicateEntity(e.entity));
            }
            if e.branches.len() != self.branch_count {
                return Err(TimelineError::InvalidBranchIndex {
                    index: self.active_branch,
                    branch_count: e.branches.len(),
                });
            }
            if e.branches.active() != self.active_branch {
                return Err(TimelineError::InvalidBranchIndex {
                    index: e.branches.active(),
                    branch_count: self.branch_count,
                });
            }
            for tl in e.branches.branches() {
                tl.check()?;
            }
        }
        Ok(())
    }

    /// Total recorded entries across every entity and branch.
    pub fn entry_count(&self) -> usize {
        self.entities
            .iter()
            .flat_map(|e| e.branches.branches())
            .map(Timeline::len)
            .sum()
    }
}
