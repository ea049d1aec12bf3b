//! Datagram socket receive and send loops.
//!
//! [`NetworkChannel::bind`] binds one UDP socket and starts two threads:
//!
//! - **receive**: reads at most `max_datagram_size` bytes per datagram,
//!   decodes it and pushes the envelope into the ingestion queue. Decode
//!   failures and queue drops are counted and logged; nothing stops the
//!   loop except shutdown.
//! - **send**: takes outbound envelopes from a bounded queue, encodes them
//!   and writes them to the configured peer, retrying with exponential
//!   backoff up to `send_retry_limit` times before dropping.
//!
//! Both loops wake at least every `recv_timeout_ms` to check the shared
//! run flag, so [`shutdown`](NetworkChannel::shutdown) is prompt.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ardan_core::{DecodeError, NetworkError, PacketEnvelope};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::config::EngineConfig;
use crate::ingress::{IngressProducer, PushOutcome};

// ── Stats ───────────────────────────────────────────────────────

/// Shared counters for both network loops.
#[derive(Debug, Default)]
pub struct NetworkStats {
    datagrams_received: AtomicU64,
    decoded: AtomicU64,
    malformed: AtomicU64,
    unknown_type: AtomicU64,
    size_mismatch: AtomicU64,
    queue_drops: AtomicU64,
    sent: AtomicU64,
    send_retries: AtomicU64,
    send_drops: AtomicU64,
    outbound_full: AtomicU64,
}

/// A plain-value copy of [`NetworkStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkStatsSnapshot {
    /// Datagrams read from the socket.
    pub datagrams_received: u64,
    /// Datagrams that decoded to an envelope.
    pub decoded: u64,
    /// Datagrams rejected as [`DecodeError::Malformed`].
    pub malformed: u64,
    /// Datagrams rejected as [`DecodeError::UnknownType`].
    pub unknown_type: u64,
    /// Datagrams rejected as [`DecodeError::SizeMismatch`].
    pub size_mismatch: u64,
    /// Decoded envelopes refused by a full ingestion queue.
    pub queue_drops: u64,
    /// Outbound packets written to the peer.
    pub sent: u64,
    /// Outbound send attempts that were retried.
    pub send_retries: u64,
    /// Outbound packets dropped after exhausting retries.
    pub send_drops: u64,
    /// Outbound packets refused by a full outbound queue.
    pub outbound_full: u64,
}

impl NetworkStats {
    /// Read every counter.
    pub fn snapshot(&self) -> NetworkStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        NetworkStatsSnapshot {
            datagrams_received: load(&self.datagrams_received),
            decoded: load(&self.decoded),
            malformed: load(&self.malformed),
            unknown_type: load(&self.unknown_type),
            size_mismatch: load(&self.size_mismatch),
            queue_drops: load(&self.queue_drops),
            sent: load(&self.sent),
            send_retries: load(&self.send_retries),
            send_drops: load(&self.send_drops),
            outbound_full: load(&self.outbound_full),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ── Outbound queue ──────────────────────────────────────────────

/// Consumer-side handle for enqueueing outbound packets.
///
/// Never blocks: a full queue is reported as
/// [`NetworkError::OutboundFull`] and the packet is dropped.
#[derive(Clone)]
pub struct OutboundSender {
    tx: Sender<PacketEnvelope>,
    stats: Arc<NetworkStats>,
}

impl OutboundSender {
    /// Enqueue `envelope` for the send loop.
    pub fn send(&self, envelope: PacketEnvelope) -> Result<(), NetworkError> {
        match self.tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                NetworkStats::bump(&self.stats.outbound_full);
                log::warn!("outbound queue full, dropping packet");
                Err(NetworkError::OutboundFull)
            }
            // The send loop has stopped; nothing will ever drain the queue.
            Err(TrySendError::Disconnected(_)) => Err(NetworkError::OutboundFull),
        }
    }

    /// Counters shared with the send loop.
    pub fn stats(&self) -> &Arc<NetworkStats> {
        &self.stats
    }
}

/// Create an outbound queue of `capacity` packets.
///
/// [`NetworkChannel::bind`] builds its own; this is for hosts and tests
/// that drive the engine without a socket.
pub fn outbound_queue(
    capacity: usize,
    stats: Arc<NetworkStats>,
) -> (OutboundSender, Receiver<PacketEnvelope>) {
    let (tx, rx) = bounded(capacity.max(1));
    (OutboundSender { tx, stats }, rx)
}

// ── NetworkChannel ──────────────────────────────────────────────

/// A bound datagram socket with running receive and send threads.
pub struct NetworkChannel {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    stats: Arc<NetworkStats>,
    outbound: OutboundSender,
    recv_thread: Option<JoinHandle<()>>,
    send_thread: Option<JoinHandle<()>>,
}

impl NetworkChannel {
    /// Bind the socket and start both loops.
    ///
    /// Fails with [`NetworkError::BindFailed`] if the socket cannot be
    /// bound or configured. That is the only fatal network condition.
    pub fn bind(config: &EngineConfig, ingress: IngressProducer) -> Result<Self, NetworkError> {
        let endpoint = config.bind_endpoint();
        let bind_failed = |reason: io::Error| {
            log::error!("failed to bind {endpoint}: {reason}");
            NetworkError::BindFailed {
                addr: endpoint.clone(),
                reason: reason.to_string(),
            }
        };

        let socket = UdpSocket::bind(endpoint.as_str()).map_err(bind_failed)?;
        socket
            .set_read_timeout(Some(config.recv_timeout()))
            .map_err(bind_failed)?;
        let local_addr = socket.local_addr().map_err(bind_failed)?;
        let send_socket = socket.try_clone().map_err(bind_failed)?;

        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(NetworkStats::default());
        let (outbound, outbound_rx) = outbound_queue(config.outbound_capacity, Arc::clone(&stats));

        let receiver = ReceiveLoop {
            socket,
            ingress,
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
            max_datagram_size: config.max_datagram_size,
        };
        let recv_thread = thread::Builder::new()
            .name("ardan-net-recv".into())
            .spawn(move || receiver.run())
            .map_err(bind_failed)?;

        let sender = SendLoop {
            socket: send_socket,
            peer: config.peer_endpoint(),
            outbound: outbound_rx,
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
            retry_limit: config.send_retry_limit,
            backoff_ms: config.send_backoff_ms,
            poll: config.recv_timeout(),
        };
        let send_thread = match thread::Builder::new()
            .name("ardan-net-send".into())
            .spawn(move || sender.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::Release);
                let _ = recv_thread.join();
                return Err(bind_failed(e));
            }
        };

        log::info!(
            "network channel bound to {local_addr}, sending to {}",
            config.peer_endpoint()
        );
        Ok(Self {
            local_addr,
            running,
            stats,
            outbound,
            recv_thread: Some(recv_thread),
            send_thread: Some(send_thread),
        })
    }

    /// The address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle for enqueueing outbound packets.
    pub fn outbound(&self) -> OutboundSender {
        self.outbound.clone()
    }

    /// Shared counters for both loops.
    pub fn stats(&self) -> &Arc<NetworkStats> {
        &self.stats
    }

    /// Whether both loops are still meant to be running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop both loops and join their threads. Idempotent.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        let mut joined = 0;
        for handle in [self.recv_thread.take(), self.send_thread.take()]
            .into_iter()
            .flatten()
        {
            match handle.join() {
                Ok(()) => joined += 1,
                Err(_) => log::error!("network thread panicked"),
            }
        }
        if joined > 0 {
            log::info!("network channel on {} shut down", self.local_addr);
        }
    }
}

impl Drop for NetworkChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Receive loop ────────────────────────────────────────────────

struct ReceiveLoop {
    socket: UdpSocket,
    ingress: IngressProducer,
    running: Arc<AtomicBool>,
    stats: Arc<NetworkStats>,
    max_datagram_size: usize,
}

impl ReceiveLoop {
    fn run(self) {
        let mut buffer = vec![0u8; self.max_datagram_size];
        while self.running.load(Ordering::Acquire) {
            let (len, src) = match self.socket.recv_from(&mut buffer) {
                Ok(r) => r,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    continue
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("datagram receive error: {e}");
                    continue;
                }
            };
            NetworkStats::bump(&self.stats.datagrams_received);
            self.handle(&buffer[..len], src);
        }
        log::debug!("receive loop stopped");
    }

    fn handle(&self, bytes: &[u8], src: SocketAddr) {
        match ardan_wire::decode_bounded(bytes, self.max_datagram_size) {
            Ok(envelope) => {
                NetworkStats::bump(&self.stats.decoded);
                if self.ingress.push(envelope) == PushOutcome::DroppedNewest {
                    NetworkStats::bump(&self.stats.queue_drops);
                }
            }
            Err(e) => {
                let counter = match e {
                    DecodeError::Malformed { .. } => &self.stats.malformed,
                    DecodeError::UnknownType { .. } => &self.stats.unknown_type,
                    DecodeError::SizeMismatch { .. } => &self.stats.size_mismatch,
                };
                NetworkStats::bump(counter);
                log::debug!("dropping {} byte datagram from {src}: {e}", bytes.len());
            }
        }
    }
}

// ── Send loop ───────────────────────────────────────────────────

struct SendLoop {
    socket: UdpSocket,
    peer: String,
    outbound: Receiver<PacketEnvelope>,
    running: Arc<AtomicBool>,
    stats: Arc<NetworkStats>,
    retry_limit: u32,
    backoff_ms: u64,
    poll: Duration,
}

impl SendLoop {
    fn run(self) {
        let mut buf = Vec::with_capacity(64);
        while self.running.load(Ordering::Acquire) {
            match self.outbound.recv_timeout(self.poll) {
                Ok(envelope) => {
                    buf.clear();
                    ardan_wire::encode_into(&envelope, &mut buf);
                    if let Err(e) = self.send_with_retry(&buf) {
                        NetworkStats::bump(&self.stats.send_drops);
                        log::warn!("dropping outbound packet for entity {}: {e}", envelope.entity());
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        log::debug!("send loop stopped");
    }

    fn send_with_retry(&self, bytes: &[u8]) -> Result<(), NetworkError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.socket.send_to(bytes, self.peer.as_str()) {
                Ok(_) => {
                    NetworkStats::bump(&self.stats.sent);
                    return Ok(());
                }
                Err(e) if attempt > self.retry_limit || !self.running.load(Ordering::Acquire) => {
                    return Err(NetworkError::SendFailed {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    NetworkStats::bump(&self.stats.send_retries);
                    let delay = backoff(self.backoff_ms, attempt);
                    log::debug!("send attempt {attempt} to {} failed: {e}; retrying in {delay:?}", self.peer);
                    thread::sleep(delay);
                }
            }
        }
    }
}

/// Delay after failed attempt `attempt` (1-based): `base`, `2*base`, ...
fn backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_ms.saturating_mul(factor))
}
