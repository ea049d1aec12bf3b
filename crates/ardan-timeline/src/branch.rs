//! An entity's set of alternative timelines.

use ardan_core::{BranchIndex, State, TimelineError};
use smallvec::{smallvec, SmallVec};

use crate::timeline::Timeline;

/// Inline capacity for branch lists. Most fleets never fork more than once.
const INLINE_BRANCHES: usize = 2;

/// An ordered list of [`Timeline`] branches with exactly one active.
///
/// Appends always land on the active branch. The set also remembers the
/// first state ever appended (the *baseline*), which survives forks and
/// is what [`reset`](Self::reset) collapses back to.
///
/// Only shared access to individual timelines is exposed, so the baseline
/// cannot drift from what was actually recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchSet {
    branches: SmallVec<[Timeline; INLINE_BRANCHES]>,
    active: BranchIndex,
    baseline: Option<State>,
}

impl Default for BranchSet {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchSet {
    /// One empty branch, active.
    pub fn new() -> Self {
        Self {
            branches: smallvec![Timeline::new()],
            active: BranchIndex(0),
            baseline: None,
        }
    }

    /// `count` empty branches with `active` selected.
    ///
    /// Used when an entity joins a fleet that has already forked, so that
    /// branch indices line up with every other entity.
    pub fn with_branches(count: usize, active: BranchIndex) -> Result<Self, TimelineError> {
        if active.0 >= count {
            return Err(TimelineError::InvalidBranchIndex {
                index: active,
                branch_count: count,
            });
        }
        Ok(Self {
            branches: (0..count).map(|_| Timeline::new()).collect(),
            active,
            baseline: None,
        })
    }

    /// Rebuild a set from stored parts.
    ///
    /// The baseline is taken as given; pass `None` to derive it from the
    /// first entry of branch 0.
    pub fn from_parts(
        branches: Vec<Timeline>,
        active: BranchIndex,
        baseline: Option<State>,
    ) -> Result<Self, TimelineError> {
        if active.0 >= branches.len() {
            return Err(TimelineError::InvalidBranchIndex {
                index: active,
                branch_count: branches.len(),
            });
        }
        let baseline = baseline.or_else(|| branches[0].first().copied());
        Ok(Self {
            branches: branches.into_iter().collect(),
            active,
            baseline,
        })
    }

    /// Append to the active branch. See [`Timeline::append`].
    pub fn append(&mut self, state: State) -> Result<usize, TimelineError> {
        let branch_count = self.branches.len();
        let tl = self
            .branches
            .get_mut(self.active.0)
            .ok_or(TimelineError::InvalidBranchIndex {
                index: self.active,
                branch_count,
            })?;
        let pos = tl.append(state)?;
        if self.baseline.is_none() {
            self.baseline = Some(state);
        }
        Ok(pos)
    }

    /// Binary search `branch` for the entry at-or-before `t`.
    pub fn lookup_at_or_before(
        &self,
        branch: BranchIndex,
        t: f64,
    ) -> Result<Option<&State>, TimelineError> {
        Ok(self.checked(branch)?.lookup_at_or_before(t))
    }

    /// Binary search `branch` for the entry at-or-after `t`.
    pub fn lookup_at_or_after(
        &self,
        branch: BranchIndex,
        t: f64,
    ) -> Result<Option<&State>, TimelineError> {
        Ok(self.checked(branch)?.lookup_at_or_after(t))
    }

    /// Copy `source[0..=upto]` into a new branch appended to the list.
    ///
    /// `upto = None` forks an empty branch (the source had no cursor).
    /// The source branch and the active index are untouched.
    pub fn fork(
        &mut self,
        source: BranchIndex,
        upto: Option<usize>,
    ) -> Result<BranchIndex, TimelineError> {
        let copy = self.checked(source)?.fork(upto)?;
        self.branches.push(copy);
        Ok(BranchIndex(self.branches.len() - 1))
    }

    /// Fork the active branch at its cursor.
    pub fn fork_active(&mut self) -> Result<BranchIndex, TimelineError> {
        let cursor = self.checked(self.active)?.cursor();
        self.fork(self.active, cursor)
    }

    /// Append an already forked branch and make it active.
    ///
    /// Lets a caller fork many sets read-only first and commit them only
    /// once every fork has succeeded.
    pub fn push_active(&mut self, branch: Timeline) -> BranchIndex {
        self.branches.push(branch);
        self.active = BranchIndex(self.branches.len() - 1);
        self.active
    }

    /// Make `index` the active branch.
    pub fn switch(&mut self, index: BranchIndex) -> Result<(), TimelineError> {
        self.checked(index)?;
        self.active = index;
        Ok(())
    }

    /// Collapse to a single branch holding only the baseline entry.
    ///
    /// With no baseline yet, `live` is recorded instead and becomes the
    /// baseline; a non-finite live timestamp is recorded as `0.0`.
    /// Irreversible.
    pub fn reset(&mut self, live: State) {
        let base = *self.baseline.get_or_insert_with(|| {
            if live.timestamp.is_finite() {
                live
            } else {
                live.at(0.0)
            }
        });
        self.branches = smallvec![Timeline::from_baseline(base)];
        self.active = BranchIndex(0);
    }

    /// Check that the active index points at an existing branch.
    pub fn check_valid(&self) -> Result<(), TimelineError> {
        self.checked(self.active).map(|_| ())
    }

    /// Move the active branch's cursor to the entry at-or-before `t`.
    pub fn seek_at_or_before(&mut self, t: f64) -> Option<usize> {
        self.branches.get_mut(self.active.0)?.seek_at_or_before(t)
    }

    /// Move the active branch's cursor to the entry at-or-after `t`.
    pub fn seek_at_or_after(&mut self, t: f64) -> Option<usize> {
        self.branches.get_mut(self.active.0)?.seek_at_or_after(t)
    }

    /// The entry under the active branch's cursor.
    pub fn current(&self) -> Option<&State> {
        self.active_timeline().and_then(Timeline::current)
    }

    /// The active branch index.
    pub fn active(&self) -> BranchIndex {
        self.active
    }

    /// The active branch.
    pub fn active_timeline(&self) -> Option<&Timeline> {
        self.branches.get(self.active.0)
    }

    /// Branch `index`, if it exists.
    pub fn branch(&self, index: BranchIndex) -> Option<&Timeline> {
        self.branches.get(index.0)
    }

    /// All branches in index order.
    pub fn branches(&self) -> &[Timeline] {
        &self.branches
    }

    /// Number of branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Always false: a set holds at least one branch once built.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// The first state ever appended, if any.
    pub fn baseline(&self) -> Option<&State> {
        self.baseline.as_ref()
    }

    fn checked(&self, index: BranchIndex) -> Result<&Timeline, TimelineError> {
        self.branches
            .get(index.0)
            .ok_or(TimelineError::InvalidBranchIndex {
                index,
                branch_count: self.branches.len(),
            })
    }
}
