//! Reusable state and history builders.

use ardan_core::{BranchIndex, EntityId, Rgb, State, StateFields, StateUpdate};
use ardan_timeline::{BranchSet, EntityHistory, FleetHistory};

/// A state with the given duty cycle at time `t`, other fields zero.
pub fn state_at(t: f64, duty: f64) -> State {
    State {
        radio_duty: duty,
        timestamp: t,
        ..State::default()
    }
}

/// A partial update setting only duty and timestamp.
pub fn duty_update(entity: u32, t: f64, duty: f64) -> StateUpdate {
    StateUpdate {
        entity: EntityId(entity),
        fields: StateFields {
            radio_duty: Some(duty),
            timestamp: Some(t),
            ..StateFields::default()
        },
    }
}

/// A single-branch fleet of `entities` ids (1-based), each with `steps`
/// entries at t = 0, 1, 2, ... and a colour derived from its id.
pub fn recorded_fleet(entities: u32, steps: usize) -> FleetHistory {
    let entities = (1..=entities)
        .map(|id| {
            let mut branches = BranchSet::new();
            for step in 0..steps {
                let s = State {
                    color: Rgb::new(id as u8, step as u8, 0),
                    ..state_at(step as f64, 0.1 * step as f64)
                };
                // Timestamps strictly increase by construction.
                let _ = branches.append(s);
            }
            EntityHistory {
                entity: EntityId(id),
                live: branches.current().copied().unwrap_or_default(),
                branches,
            }
        })
        .collect();
    FleetHistory {
        active_branch: BranchIndex(0),
        branch_count: 1,
        entities,
    }
}
