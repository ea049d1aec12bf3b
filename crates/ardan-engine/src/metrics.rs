//! Per-tick and cumulative engine metrics.
//!
//! [`TickMetrics`] is returned by every
//! [`SensorEngine::tick`](crate::SensorEngine::tick). [`EngineStats`]
//! gathers the cumulative counters of every stage.

use crate::forwarder::ForwarderStatsSnapshot;
use crate::ingress::QueueStatsSnapshot;
use crate::network::NetworkStatsSnapshot;

/// What a single tick did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickMetrics {
    /// Wall-clock time for the whole tick, in microseconds.
    pub total_us: u64,
    /// Envelopes taken from the ingestion queue.
    pub drained: usize,
    /// Updates applied to live state.
    pub applied: usize,
    /// Updates for unregistered entities.
    pub unknown_entity: usize,
    /// Updates withheld because replay mode is on.
    pub suppressed: usize,
    /// Inbound commands, which the registry ignores.
    pub ignored: usize,
    /// Payloads handed to the forwarder.
    pub forwarded: usize,
    /// Payloads the forwarder refused (buffer full or shut down).
    pub forward_failures: usize,
    /// Entities recorded by this tick's snapshot, if one was taken.
    pub recorded: Option<usize>,
    /// Entities whose snapshot entry was rejected.
    pub record_failures: usize,
    /// Replay position after this tick's playback step, if playing.
    pub replay_time: Option<f64>,
    /// Entities whose live state was replaced from history.
    pub replayed: usize,
}

/// Cumulative counters for every pipeline stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Socket, decode and send counters. All zero without a socket.
    pub network: NetworkStatsSnapshot,
    /// Ingestion queue counters.
    pub queue: QueueStatsSnapshot,
    /// Forwarder counters.
    pub forwarder: ForwarderStatsSnapshot,
}
