//! Ingestion pipeline, entity registry, and host tick loop.
//!
//! Data flows in one direction:
//!
//! ```text
//! UDP socket ─▶ ReceiveLoop ─▶ ingress queue ─▶ SensorEngine::tick
//!                (network)      (drop newest)     │
//!                                                 ├─▶ Registry (live state, history)
//!                                                 └─▶ Forwarder ─▶ Sink
//! SensorEngine commands ─▶ outbound queue ─▶ SendLoop ─▶ UDP socket
//! ```
//!
//! Only the host thread touches the [`Registry`]. The network threads
//! and the forwarder worker talk to it through bounded queues and never
//! block the tick.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod forwarder;
pub mod ingress;
pub mod metrics;
pub mod network;
pub mod playback;
pub mod registry;

pub use config::{ConfigError, EngineConfig};
pub use engine::{EngineError, SensorEngine};
pub use forwarder::{Forwarder, ForwarderStatsSnapshot, UdpSink};
pub use ingress::{ingress_queue, IngressConsumer, IngressProducer, PushOutcome, QueueStatsSnapshot};
pub use metrics::{EngineStats, TickMetrics};
pub use network::{outbound_queue, NetworkChannel, NetworkStats, NetworkStatsSnapshot, OutboundSender};
pub use playback::{Playback, PlaybackDirection, PlaybackSpeed};
pub use registry::{EntityRecord, Registry, ReplayReport, RouteOutcome, SeekReport, SnapshotReport};
