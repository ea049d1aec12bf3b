//! Ardan: a sensor state-history engine.
//!
//! Live readings arrive as UDP datagrams, are applied to each entity's
//! live state on the host tick, and can be recorded into branching
//! timelines for rewind, fast-forward, replay and comparison.
//!
//! This is the facade crate that re-exports the public API from all
//! Ardan sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use ardan::prelude::*;
//!
//! let mut registry = Registry::new();
//! registry.register_entity(EntityId(1)).unwrap();
//!
//! for (t, duty) in [(0.0, 0.1), (1.0, 0.2), (2.0, 0.3)] {
//!     let fields = StateFields {
//!         radio_duty: Some(duty),
//!         timestamp: Some(t),
//!         ..StateFields::default()
//!     };
//!     registry.set_live_state(EntityId(1), &fields).unwrap();
//!     registry.snapshot(t);
//! }
//!
//! registry.rewind(1.5);
//! registry.replay();
//! assert_eq!(registry.get_live_state(EntityId(1)).unwrap().radio_duty, 0.2);
//!
//! let branch = registry.new_timeline().unwrap();
//! assert_eq!(branch, BranchIndex(1));
//! assert!(registry.diff(BranchIndex(0), 2.0).unwrap().contains(&EntityId(1)));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `ardan-core` | IDs, states, packets, the sink seam, errors |
//! | [`wire`] | `ardan-wire` | Datagram codec |
//! | [`timeline`] | `ardan-timeline` | Timelines, branch sets, fleet history |
//! | [`archive`] | `ardan-archive` | Binary history persistence |
//! | [`engine`] | `ardan-engine` | Registry, queues, network, forwarder, tick loop |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and the sink seam (`ardan-core`).
///
/// [`types::State`] and [`types::StateFields`] describe readings,
/// [`types::PacketEnvelope`] is one decoded datagram.
pub use ardan_core as types;

/// Datagram encode and decode (`ardan-wire`).
pub use ardan_wire as wire;

/// Branching history (`ardan-timeline`).
///
/// [`timeline::Timeline`] is one ordered series with a cursor,
/// [`timeline::BranchSet`] one entity's alternatives.
pub use ardan_timeline as timeline;

/// History persistence (`ardan-archive`).
///
/// Save with [`archive::save_to_path`], restore with
/// [`archive::load_from_path`].
pub use ardan_archive as archive;

/// Ingestion, registry and host tick (`ardan-engine`).
///
/// [`engine::SensorEngine`] for a bound socket, [`engine::Registry`] for
/// history operations without any I/O.
pub use ardan_engine as engine;

/// Common imports for typical Ardan usage.
///
/// ```rust
/// use ardan::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use ardan_core::{
        BranchIndex, Command, EntityId, PacketEnvelope, Rgb, Sink, Source, State, StateFields,
        StateUpdate,
    };

    // Errors
    pub use ardan_core::{DecodeError, NetworkError, PublishError, TimelineError};

    // History
    pub use ardan_timeline::{BranchSet, FleetHistory, Timeline};

    // Engine
    pub use ardan_engine::{
        EngineConfig, EngineError, PlaybackDirection, PlaybackSpeed, Registry, SensorEngine,
        TickMetrics,
    };
}
