//! Benchmark profiles for the Ardan sensor history engine.
//!
//! - [`recorded_registry`]: a fleet with a long recorded history
//! - [`update_mix`]: a stream of partial and full state updates
//! - [`long_timeline`]: one branch with evenly spaced entries

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use ardan_core::{EntityId, PacketEnvelope, Rgb, State, StateFields, StateUpdate};
use ardan_engine::Registry;
use ardan_timeline::Timeline;

/// A registry of `entities` sensors, each recorded `steps` times at
/// t = 0, 1, 2, ...
pub fn recorded_registry(entities: u32, steps: usize) -> Registry {
    let mut reg = Registry::new();
    for id in 0..entities {
        // Ids are unique by construction.
        let _ = reg.register_entity(EntityId(id));
    }
    for step in 0..steps {
        let t = step as f64;
        for id in 0..entities {
            let fields = StateFields {
                radio_duty: Some((step % 10) as f64 / 10.0),
                timestamp: Some(t),
                ..StateFields::default()
            };
            let _ = reg.set_live_state(EntityId(id), &fields);
        }
        reg.snapshot(t);
    }
    reg
}

/// `n` updates cycling through entities `0..entities`. Every fourth
/// update carries every field; the rest carry duty and timestamp only.
pub fn update_mix(n: usize, entities: u32) -> Vec<PacketEnvelope> {
    (0..n)
        .map(|i| {
            let entity = EntityId(i as u32 % entities.max(1));
            let t = i as f64 * 0.01;
            let fields = if i % 4 == 0 {
                State {
                    color: Rgb::new(i as u8, 0, 255),
                    radio_duty: 0.5,
                    radio_tx_ratio: 0.2,
                    radio_rx_ratio: 0.3,
                    radio_ix_ratio: 0.01,
                    timestamp: t,
                }
                .to_fields()
            } else {
                StateFields {
                    radio_duty: Some(0.25),
                    timestamp: Some(t),
                    ..StateFields::default()
                }
            };
            StateUpdate { entity, fields }.into()
        })
        .collect()
}

/// A single timeline of `len` entries spaced `dt` seconds apart.
pub fn long_timeline(len: usize, dt: f64) -> Timeline {
    let mut tl = Timeline::new();
    for i in 0..len {
        let s = State {
            timestamp: i as f64 * dt,
            ..State::default()
        };
        // Strictly increasing for any positive dt.
        let _ = tl.append(s);
    }
    tl
}
