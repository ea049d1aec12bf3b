//! Bounded hand-off between the network receive loop and the tick.
//!
//! [`ingress_queue`] builds a single-producer/single-consumer pair over a
//! bounded crossbeam channel. Decoded envelopes are moved through by
//! value, so the consumer owns everything it drains.
//!
//! # Backpressure
//!
//! When the queue is full the producer drops the *incoming* envelope
//! (drop-newest). What is already queued keeps its FIFO order and memory
//! stays bounded. Neither side ever blocks: a full queue is a counted
//! drop, an empty queue is "nothing ready".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ardan_core::PacketEnvelope;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

/// Shared counters for one ingestion queue.
#[derive(Debug, Default)]
pub struct QueueStats {
    accepted: AtomicU64,
    dropped_newest: AtomicU64,
}

/// A plain-value copy of [`QueueStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    /// Envelopes accepted into the queue.
    pub accepted: u64,
    /// Envelopes refused because the queue was full.
    pub dropped_newest: u64,
}

impl QueueStats {
    /// Read every counter.
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped_newest: self.dropped_newest.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of offering one envelope to the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Queued behind everything already waiting.
    Accepted,
    /// Queue full; the envelope was discarded.
    DroppedNewest,
    /// The consumer is gone. Only happens during shutdown.
    Disconnected,
}

/// Network-side end of the queue.
#[derive(Clone)]
pub struct IngressProducer {
    tx: Sender<PacketEnvelope>,
    stats: Arc<QueueStats>,
}

/// Tick-side end of the queue.
pub struct IngressConsumer {
    rx: Receiver<PacketEnvelope>,
    stats: Arc<QueueStats>,
}

/// Create a queue holding at most `capacity` envelopes.
///
/// A `capacity` of zero is raised to one; a rendezvous channel would
/// drop every envelope the consumer is not already waiting for.
pub fn ingress_queue(capacity: usize) -> (IngressProducer, IngressConsumer) {
    let (tx, rx) = bounded(capacity.max(1));
    let stats = Arc::new(QueueStats::default());
    (
        IngressProducer {
            tx,
            stats: Arc::clone(&stats),
        },
        IngressConsumer { rx, stats },
    )
}

impl IngressProducer {
    /// Offer `envelope` without blocking.
    pub fn push(&self, envelope: PacketEnvelope) -> PushOutcome {
        match self.tx.try_send(envelope) {
            Ok(()) => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
                PushOutcome::Accepted
            }
            Err(TrySendError::Full(dropped)) => {
                self.stats.dropped_newest.fetch_add(1, Ordering::Relaxed);
                log::debug!("ingress queue full, dropping packet for entity {}", dropped.entity());
                PushOutcome::DroppedNewest
            }
            Err(TrySendError::Disconnected(_)) => PushOutcome::Disconnected,
        }
    }

    /// Shared counters.
    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.stats
    }
}

impl IngressConsumer {
    /// Take the oldest waiting envelope, or `None` if nothing is ready.
    pub fn try_pop(&self) -> Option<PacketEnvelope> {
        match self.rx.try_recv() {
            Ok(env) => Some(env),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Take everything currently waiting, oldest first.
    ///
    /// Bounded by the queue capacity so that a fast producer cannot keep
    /// one tick draining forever.
    pub fn drain(&self) -> Vec<PacketEnvelope> {
        let limit = self.rx.capacity().unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(self.rx.len().min(limit));
        while out.len() < limit {
            match self.try_pop() {
                Some(env) => out.push(env),
                None => break,
            }
        }
        out
    }

    /// Envelopes currently waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// The fixed queue bound.
    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(usize::MAX)
    }

    /// Shared counters.
    pub fn stats(&self) -> &Arc<QueueStats> {
        &self.stats
    }
}
