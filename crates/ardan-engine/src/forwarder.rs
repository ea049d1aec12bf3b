//! Best-effort republishing of accepted updates to an external sink.
//!
//! [`Forwarder`] owns a worker thread that holds the [`Sink`]. The tick
//! side only encodes and `try_send`s onto a bounded dispatch channel, so
//! publishing never blocks ingestion. A full channel is counted as
//! [`PublishError::BufferFull`].
//!
//! # Retry
//!
//! A payload the sink refuses goes into a retry buffer of at most
//! `publish_retry_bound` entries; when the buffer overflows the oldest
//! entry is dropped. The buffer is retried every `publish_retry_ms` and
//! ahead of any newer payload, so accepted payloads keep their order.

use std::collections::VecDeque;
use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ardan_core::{PacketEnvelope, PublishError, Sink, Source};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::config::EngineConfig;

// ── Stats ───────────────────────────────────────────────────────

/// Shared counters for one forwarder.
#[derive(Debug, Default)]
pub struct ForwarderStats {
    published: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    dropped_oldest: AtomicU64,
    buffer_full: AtomicU64,
}

/// A plain-value copy of [`ForwarderStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForwarderStatsSnapshot {
    /// Payloads the sink accepted, first try or retried.
    pub published: u64,
    /// Publish attempts the sink refused.
    pub failed: u64,
    /// Buffered payloads that later went through.
    pub retried: u64,
    /// Buffered payloads evicted because the retry buffer overflowed.
    pub dropped_oldest: u64,
    /// Payloads refused because the dispatch channel was full.
    pub buffer_full: u64,
}

impl ForwarderStats {
    /// Read every counter.
    pub fn snapshot(&self) -> ForwarderStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        ForwarderStatsSnapshot {
            published: load(&self.published),
            failed: load(&self.failed),
            retried: load(&self.retried),
            dropped_oldest: load(&self.dropped_oldest),
            buffer_full: load(&self.buffer_full),
        }
    }
}

struct Dispatch {
    source: Source,
    payload: Vec<u8>,
}

// ── Forwarder ───────────────────────────────────────────────────

/// Tick-side handle onto the publishing worker.
pub struct Forwarder {
    tx: Option<Sender<Dispatch>>,
    stats: Arc<ForwarderStats>,
    worker: Option<JoinHandle<()>>,
}

impl Forwarder {
    /// Start a worker publishing to `sink`.
    pub fn spawn<S: Sink + 'static>(sink: S, config: &EngineConfig) -> io::Result<Self> {
        let (tx, rx) = bounded(config.publish_capacity.max(1));
        let stats = Arc::new(ForwarderStats::default());
        let worker = PublishWorker {
            sink,
            rx,
            retry: VecDeque::new(),
            retry_bound: config.publish_retry_bound.max(1),
            retry_interval: config.publish_retry_interval(),
            stats: Arc::clone(&stats),
        };
        let handle = thread::Builder::new()
            .name("ardan-forwarder".into())
            .spawn(move || worker.run())?;
        Ok(Self {
            tx: Some(tx),
            stats,
            worker: Some(handle),
        })
    }

    /// Encode `envelope` and hand it to the worker without blocking.
    pub fn publish(&self, source: Source, envelope: &PacketEnvelope) -> Result<(), PublishError> {
        let Some(tx) = &self.tx else {
            return Err(PublishError::SinkUnavailable {
                reason: "forwarder shut down".into(),
            });
        };
        let dispatch = Dispatch {
            source,
            payload: ardan_wire::encode(envelope),
        };
        match tx.try_send(dispatch) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stats.buffer_full.fetch_add(1, Ordering::Relaxed);
                log::warn!("publish buffer full, dropping payload for {source:?}");
                Err(PublishError::BufferFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(PublishError::SinkUnavailable {
                reason: "forwarder worker stopped".into(),
            }),
        }
    }

    /// Shared counters.
    pub fn stats(&self) -> &Arc<ForwarderStats> {
        &self.stats
    }

    /// Stop accepting payloads, let the worker deliver what is queued,
    /// and join it. Idempotent.
    pub fn shutdown(&mut self) {
        self.tx = None;
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("forwarder worker panicked");
            }
        }
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Worker ──────────────────────────────────────────────────────

struct PublishWorker<S> {
    sink: S,
    rx: Receiver<Dispatch>,
    retry: VecDeque<Dispatch>,
    retry_bound: usize,
    retry_interval: Duration,
    stats: Arc<ForwarderStats>,
}

impl<S: Sink> PublishWorker<S> {
    fn run(mut self) {
        loop {
            match self.rx.recv_timeout(self.retry_interval) {
                Ok(d) => self.deliver(d),
                Err(RecvTimeoutError::Timeout) => self.flush_retries(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        // One last chance for anything still buffered.
        self.flush_retries();
        if !self.retry.is_empty() {
            log::warn!(
                "forwarder stopping with {} undelivered payloads",
                self.retry.len()
            );
        }
    }

    fn deliver(&mut self, d: Dispatch) {
        if !self.retry.is_empty() {
            self.buffer(d);
            self.flush_retries();
            return;
        }
        if let Err(e) = self.sink.publish(d.source, &d.payload) {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            log::warn!("publish to {:?} failed: {e}", d.source);
            self.buffer(d);
        } else {
            self.stats.published.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn buffer(&mut self, d: Dispatch) {
        if self.retry.len() >= self.retry_bound {
            self.retry.pop_front();
            self.stats.dropped_oldest.fetch_add(1, Ordering::Relaxed);
            log::warn!("publish retry buffer full, dropping oldest payload");
        }
        self.retry.push_back(d);
    }

    fn flush_retries(&mut self) {
        while let Some(front) = self.retry.front() {
            match self.sink.publish(front.source, &front.payload) {
                Ok(()) => {
                    self.retry.pop_front();
                    self.stats.published.fetch_add(1, Ordering::Relaxed);
                    self.stats.retried.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        }
    }
}

// ── UdpSink ─────────────────────────────────────────────────────

/// Sink that sends each channel's payloads as datagrams to its own
/// address. A channel with no address discards its payloads.
pub struct UdpSink {
    socket: UdpSocket,
    entity_target: Option<String>,
    fleet_target: Option<String>,
}

impl UdpSink {
    /// Bind an ephemeral local socket for sending.
    pub fn new(entity_target: Option<String>, fleet_target: Option<String>) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        log::info!(
            "udp sink ready (entity: {}, fleet: {})",
            entity_target.as_deref().unwrap_or("-"),
            fleet_target.as_deref().unwrap_or("-")
        );
        Ok(Self {
            socket,
            entity_target,
            fleet_target,
        })
    }

    /// Build from the `sink_*_address` fields of `config`, or `None` when
    /// neither is set.
    pub fn from_config(config: &EngineConfig) -> io::Result<Option<Self>> {
        if config.sink_entity_address.is_none() && config.sink_fleet_address.is_none() {
            return Ok(None);
        }
        Self::new(
            config.sink_entity_address.clone(),
            config.sink_fleet_address.clone(),
        )
        .map(Some)
    }
}

impl Sink for UdpSink {
    fn publish(&mut self, source: Source, payload: &[u8]) -> Result<(), PublishError> {
        let target = match source {
            Source::Entity(_) => self.entity_target.as_deref(),
            Source::Fleet => self.fleet_target.as_deref(),
        };
        let Some(target) = target else {
            return Ok(());
        };
        self.socket
            .send_to(payload, target)
            .map(|_| ())
            .map_err(|e| PublishError::SinkUnavailable {
                reason: format!("{target}: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardan_core::{Command, EntityId};
    use ardan_test_utils::{FlakySink, MemorySink};

    fn trigger(id: u32) -> PacketEnvelope {
        Command::TriggerEvent {
            entity: EntityId(id),
        }
        .into()
    }

    fn config(retry_bound: usize) -> EngineConfig {
        EngineConfig {
            publish_retry_bound: retry_bound,
            publish_retry_ms: 1,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn publishes_encoded_payloads_in_order() {
        let sink = MemorySink::new();
        let mut fwd = Forwarder::spawn(sink.clone(), &config(4)).unwrap();
        for id in 1..=3 {
            fwd.publish(Source::Entity(EntityId(id)), &trigger(id)).unwrap();
        }
        fwd.shutdown();

        let got = sink.published();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].0, Source::Entity(EntityId(1)));
        assert_eq!(got[2].1, ardan_wire::encode(&trigger(3)));
        assert_eq!(fwd.stats().snapshot().published, 3);
    }

    #[test]
    fn failed_payloads_are_retried() {
        let sink = FlakySink::new(2);
        let delivered = sink.delivered();
        let mut fwd = Forwarder::spawn(sink, &config(4)).unwrap();
        fwd.publish(Source::Fleet, &trigger(1)).unwrap();
        fwd.publish(Source::Fleet, &trigger(2)).unwrap();
        fwd.shutdown();

        let order: Vec<_> = delivered.published().into_iter().map(|(_, p)| p).collect();
        assert_eq!(order, vec![ardan_wire::encode(&trigger(1)), ardan_wire::encode(&trigger(2))]);
        let stats = fwd.stats().snapshot();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.published, 2);
        assert!(stats.retried >= 1);
    }

    #[test]
    fn retry_buffer_drops_oldest() {
        let sink = FlakySink::always_failing();
        let mut fwd = Forwarder::spawn(sink, &config(2)).unwrap();
        for id in 0..5 {
            fwd.publish(Source::Fleet, &trigger(id)).unwrap();
        }
        fwd.shutdown();
        let stats = fwd.stats().snapshot();
        assert_eq!(stats.dropped_oldest, 3);
        assert_eq!(stats.published, 0);
    }

    #[test]
    fn publish_after_shutdown_is_refused() {
        let mut fwd = Forwarder::spawn(MemorySink::new(), &config(1)).unwrap();
        fwd.shutdown();
        assert!(fwd.publish(Source::Fleet, &trigger(1)).is_err());
    }

    #[test]
    fn udp_sink_routes_by_channel() {
        let entity_rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        let fleet_rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        entity_rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        fleet_rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let mut sink = UdpSink::new(
            Some(entity_rx.local_addr().unwrap().to_string()),
            Some(fleet_rx.local_addr().unwrap().to_string()),
        )
        .unwrap();
        sink.publish(Source::Entity(EntityId(1)), b"one").unwrap();
        sink.publish(Source::Fleet, b"all").unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = entity_rx.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"one");
        let (n, _) = fleet_rx.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"all");
    }

    #[test]
    fn udp_sink_without_targets_discards() {
        let mut sink = UdpSink::new(None, None).unwrap();
        assert_eq!(sink.publish(Source::Fleet, b"x"), Ok(()));
        assert!(UdpSink::from_config(&EngineConfig::default()).unwrap().is_none());
    }
}
