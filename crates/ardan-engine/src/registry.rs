//! The entity registry: every entity's branching history in lockstep.
//!
//! [`Registry`] maps [`EntityId`] to a [`BranchSet`] plus a mutable live
//! state cell, and holds the single global active-branch index. Branch
//! `k` means the same timeline for every entity, so the operations that
//! move between branches ([`new_timeline`](Registry::new_timeline),
//! [`change_timeline`](Registry::change_timeline),
//! [`copy_in`](Registry::copy_in)) validate the whole fleet before
//! touching any of it. Snapshots and seeks are per-entity and report
//! their partial outcomes instead.
//!
//! Entities are visited in registration order, so every report lists
//! them deterministically.

use std::collections::BTreeSet;

use ardan_core::{
    BranchIndex, Command, EntityId, PacketEnvelope, State, StateFields, TimelineError,
};
use ardan_timeline::{BranchSet, EntityHistory, FleetHistory, Timeline};
use indexmap::IndexMap;

/// One registered entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityRecord {
    branches: BranchSet,
    live: State,
}

impl EntityRecord {
    /// Recorded history.
    pub fn branches(&self) -> &BranchSet {
        &self.branches
    }

    /// The live (not yet recorded) state.
    pub fn live(&self) -> &State {
        &self.live
    }
}

/// What [`Registry::route`] did with an envelope.
#[derive(Clone, Debug, PartialEq)]
pub enum RouteOutcome {
    /// The update was applied; `state` is the new live state.
    Applied {
        /// The entity updated.
        entity: EntityId,
        /// Its live state after the update.
        state: State,
    },
    /// No entity with this id is registered. Dropped.
    UnknownEntity(EntityId),
    /// Replay mode is on, so live updates are not applied.
    Suppressed(EntityId),
    /// Commands from the peer carry nothing for the registry.
    Ignored(Command),
}

/// Per-entity outcome of [`Registry::snapshot`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotReport {
    /// Entities that recorded an entry.
    pub recorded: Vec<EntityId>,
    /// Entities whose entry was rejected, with the reason.
    pub failed: Vec<(EntityId, TimelineError)>,
}

impl SnapshotReport {
    /// True when every entity recorded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-entity outcome of [`Registry::rewind`] and
/// [`Registry::fast_forward`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeekReport {
    /// Entities whose cursor moved to a matching entry.
    pub moved: Vec<EntityId>,
    /// Entities with no matching entry; their cursor is unchanged.
    pub out_of_range: Vec<EntityId>,
    /// Entities whose cursor now points at a different entry. A subset
    /// of `moved`.
    pub changed: Vec<EntityId>,
}

/// Per-entity outcome of [`Registry::replay`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplayReport {
    /// Entities whose live state now shows their cursor entry.
    pub replayed: Vec<(EntityId, State)>,
    /// Entities with no recorded entry in the active branch.
    pub empty: Vec<EntityId>,
}

/// Every entity's history plus the global active-branch index.
#[derive(Clone, Debug)]
pub struct Registry {
    entities: IndexMap<EntityId, EntityRecord>,
    active: BranchIndex,
    branch_count: usize,
    replay_mode: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry with one branch.
    pub fn new() -> Self {
        Self {
            entities: IndexMap::new(),
            active: BranchIndex(0),
            branch_count: 1,
            replay_mode: false,
        }
    }

    // ── Host surface ────────────────────────────────────────────

    /// Register `id` with empty history and a default live state.
    ///
    /// The entity gets as many (empty) branches as the fleet already has,
    /// with the current one active, so branch indices stay shared.
    pub fn register_entity(&mut self, id: EntityId) -> Result<(), TimelineError> {
        if self.entities.contains_key(&id) {
            return Err(TimelineError::DuplicateEntity(id));
        }
        let branches = BranchSet::with_branches(self.branch_count, self.active)?;
        self.entities.insert(
            id,
            EntityRecord {
                branches,
                live: State::default(),
            },
        );
        log::debug!("registered entity {id}");
        Ok(())
    }

    /// Remove `id` and all its history.
    pub fn unregister_entity(&mut self, id: EntityId) -> Result<(), TimelineError> {
        self.entities
            .shift_remove(&id)
            .map(|_| log::debug!("unregistered entity {id}"))
            .ok_or(TimelineError::UnknownEntity(id))
    }

    /// The live state of `id`.
    pub fn get_live_state(&self, id: EntityId) -> Result<State, TimelineError> {
        self.record(id).map(|r| r.live)
    }

    /// Overwrite the given fields of `id`'s live state. Returns the result.
    pub fn set_live_state(&mut self, id: EntityId, fields: &StateFields) -> Result<State, TimelineError> {
        let rec = self
            .entities
            .get_mut(&id)
            .ok_or(TimelineError::UnknownEntity(id))?;
        rec.live = rec.live.with_fields(fields);
        Ok(rec.live)
    }

    /// While on, routed updates for known entities are not applied.
    pub fn set_replay_mode(&mut self, on: bool) {
        if self.replay_mode != on {
            log::debug!("replay mode {}", if on { "on" } else { "off" });
        }
        self.replay_mode = on;
    }

    /// Whether replay mode is on.
    pub fn replay_mode(&self) -> bool {
        self.replay_mode
    }

    // ── Ingestion ───────────────────────────────────────────────

    /// Apply one decoded envelope.
    pub fn route(&mut self, envelope: &PacketEnvelope) -> RouteOutcome {
        let update = match envelope {
            PacketEnvelope::StateUpdate(update) => update,
            PacketEnvelope::Command(cmd) => {
                log::trace!("ignoring inbound command {cmd:?}");
                return RouteOutcome::Ignored(*cmd);
            }
        };
        let Some(rec) = self.entities.get_mut(&update.entity) else {
            log::debug!("dropping update for unregistered entity {}", update.entity);
            return RouteOutcome::UnknownEntity(update.entity);
        };
        if self.replay_mode {
            return RouteOutcome::Suppressed(update.entity);
        }
        rec.live = rec.live.with_fields(&update.fields);
        RouteOutcome::Applied {
            entity: update.entity,
            state: rec.live,
        }
    }

    // ── Recording and seeking ───────────────────────────────────

    /// Record every entity's live state at `timestamp` in the active
    /// branch.
    ///
    /// Each entity succeeds or fails on its own. An entity whose last
    /// entry is at or after `timestamp` fails with
    /// [`TimelineError::NonMonotonicTimestamp`]; entities already
    /// recorded in this call are kept.
    pub fn snapshot(&mut self, timestamp: f64) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        for (&id, rec) in &mut self.entities {
            match rec.branches.append(rec.live.at(timestamp)) {
                Ok(_) => report.recorded.push(id),
                Err(TimelineError::InvalidOrder { last, attempted }) => {
                    report.failed.push((
                        id,
                        TimelineError::NonMonotonicTimestamp {
                            entity: id,
                            last,
                            attempted,
                        },
                    ));
                }
                Err(e) => report.failed.push((id, e)),
            }
        }
        if !report.failed.is_empty() {
            log::debug!(
                "snapshot at {timestamp}: {} recorded, {} rejected",
                report.recorded.len(),
                report.failed.len()
            );
        }
        report
    }

    /// Move every cursor to the entry at-or-before `timestamp`.
    pub fn rewind(&mut self, timestamp: f64) -> SeekReport {
        self.seek(|b| b.seek_at_or_before(timestamp))
    }

    /// Move every cursor to the entry at-or-after `timestamp`.
    pub fn fast_forward(&mut self, timestamp: f64) -> SeekReport {
        self.seek(|b| b.seek_at_or_after(timestamp))
    }

    fn seek(&mut self, mut f: impl FnMut(&mut BranchSet) -> Option<usize>) -> SeekReport {
        let mut report = SeekReport::default();
        for (&id, rec) in &mut self.entities {
            let before = rec.branches.active_timeline().and_then(Timeline::cursor);
            match f(&mut rec.branches) {
                Some(idx) => {
                    report.moved.push(id);
                    if before != Some(idx) {
                        report.changed.push(id);
                    }
                }
                None => report.out_of_range.push(id),
            }
        }
        report
    }

    /// Copy every entity's cursor entry into its live state.
    pub fn replay(&mut self) -> ReplayReport {
        let mut report = ReplayReport::default();
        for (&id, rec) in &mut self.entities {
            match rec.branches.current() {
                Some(state) => {
                    rec.live = *state;
                    report.replayed.push((id, *state));
                }
                None => report.empty.push(id),
            }
        }
        report
    }

    // ── Branching ───────────────────────────────────────────────

    fn check_lockstep(&self) -> Result<(), TimelineError> {
        for rec in self.entities.values() {
            rec.branches.check_valid()?;
            if rec.branches.len() != self.branch_count || rec.branches.active() != self.active {
                return Err(TimelineError::InvalidBranchIndex {
                    index: rec.branches.active(),
                    branch_count: rec.branches.len(),
                });
            }
        }
        Ok(())
    }

    /// Fork every entity's active branch at its cursor and switch the
    /// whole fleet to the new branch.
    ///
    /// All-or-nothing: if any entity's branch set is out of step with the
    /// fleet, fails with [`TimelineError::InvalidBranchIndex`] and nothing
    /// changes.
    pub fn new_timeline(&mut self) -> Result<BranchIndex, TimelineError> {
        self.check_lockstep()?;

        let mut forks: Vec<Timeline> = Vec::with_capacity(self.entities.len());
        for rec in self.entities.values() {
            let Some(active) = rec.branches.active_timeline() else {
                return Err(TimelineError::InvalidBranchIndex {
                    index: self.active,
                    branch_count: rec.branches.len(),
                });
            };
            forks.push(active.fork(active.cursor())?);
        }

        let new = BranchIndex(self.branch_count);
        for (rec, fork) in self.entities.values_mut().zip(forks) {
            rec.branches.push_active(fork);
        }
        self.branch_count += 1;
        self.active = new;
        log::info!("forked fleet to branch {new} of {}", self.branch_count);
        Ok(new)
    }

    /// Collapse every entity to a single branch holding its baseline
    /// entry (or its live state if it never recorded). Irreversible.
    pub fn reset_timeline(&mut self) {
        for rec in self.entities.values_mut() {
            rec.branches.reset(rec.live);
        }
        self.branch_count = 1;
        self.active = BranchIndex(0);
        log::info!("reset {} entities to their baseline", self.entities.len());
    }

    /// Switch the whole fleet to branch `index`.
    ///
    /// All-or-nothing: if `index` is out of range for any entity, fails
    /// with [`TimelineError::InvalidBranchIndex`] and no pointer moves.
    pub fn change_timeline(&mut self, index: BranchIndex) -> Result<(), TimelineError> {
        if index.0 >= self.branch_count {
            return Err(TimelineError::InvalidBranchIndex {
                index,
                branch_count: self.branch_count,
            });
        }
        if let Some(rec) = self.entities.values().find(|r| index.0 >= r.branches.len()) {
            return Err(TimelineError::InvalidBranchIndex {
                index,
                branch_count: rec.branches.len(),
            });
        }
        for rec in self.entities.values_mut() {
            // In range for every entity, checked above.
            rec.branches.switch(index)?;
        }
        self.active = index;
        log::info!("switched fleet to branch {index}");
        Ok(())
    }

    /// Entities whose entry at-or-before `timestamp` in branch `index`
    /// differs from their live state, ignoring timestamps.
    ///
    /// Entities with no such entry are left out. Read-only.
    pub fn diff(&self, index: BranchIndex, timestamp: f64) -> Result<BTreeSet<EntityId>, TimelineError> {
        if index.0 >= self.branch_count {
            return Err(TimelineError::InvalidBranchIndex {
                index,
                branch_count: self.branch_count,
            });
        }
        let mut changed = BTreeSet::new();
        for (&id, rec) in &self.entities {
            if let Some(recorded) = rec.branches.lookup_at_or_before(index, timestamp)? {
                if !recorded.same_reading(&rec.live) {
                    changed.insert(id);
                }
            }
        }
        Ok(changed)
    }

    // ── Persistence ─────────────────────────────────────────────

    /// A deep copy of every entity's history and live state.
    pub fn copy_out(&self) -> FleetHistory {
        FleetHistory {
            active_branch: self.active,
            branch_count: self.branch_count,
            entities: self
                .entities
                .iter()
                .map(|(&entity, rec)| EntityHistory {
                    entity,
                    live: rec.live,
                    branches: rec.branches.clone(),
                })
                .collect(),
        }
    }

    /// Replace all entities and history with `history`.
    ///
    /// All-or-nothing: `history` is validated first and nothing changes
    /// if it is inconsistent. Replay mode is left as it was.
    pub fn copy_in(&mut self, history: FleetHistory) -> Result<(), TimelineError> {
        history.validate()?;
        self.entities = history
            .entities
            .into_iter()
            .map(|e| {
                (
                    e.entity,
                    EntityRecord {
                        branches: e.branches,
                        live: e.live,
                    },
                )
            })
            .collect();
        self.active = history.active_branch;
        self.branch_count = history.branch_count;
        log::info!(
            "restored {} entities on branch {} of {}",
            self.entities.len(),
            self.active,
            self.branch_count
        );
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────

    fn record(&self, id: EntityId) -> Result<&EntityRecord, TimelineError> {
        self.entities.get(&id).ok_or(TimelineError::UnknownEntity(id))
    }

    /// The record for `id`, if registered.
    pub fn entity(&self, id: EntityId) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Registered ids in registration order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The global active-branch index.
    pub fn active_branch(&self) -> BranchIndex {
        self.active
    }

    /// The latest recorded timestamp in the active branch across the
    /// fleet, or `None` if nothing is recorded. Snapshots must come after
    /// it to be accepted for every entity.
    pub fn latest_recorded(&self) -> Option<f64> {
        self.entities
            .values()
            .filter_map(|rec| rec.branches.active_timeline()?.last())
            .map(|s| s.timestamp)
            .reduce(f64::max)
    }

    /// Number of branches every entity holds.
    pub fn branch_count(&self) -> usize {
        self.branch_count
    }
}
