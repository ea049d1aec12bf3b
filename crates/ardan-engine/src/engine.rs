//! The host-facing engine: one [`tick`](SensorEngine::tick) per frame.
//!
//! [`SensorEngine`] owns the registry and the consumer ends of every
//! queue. The host calls `tick(now)` at a fixed interval; each tick
//!
//! 1. drains the ingestion queue in FIFO order, routes every envelope
//!    and forwards applied updates on their per-entity sink channel,
//! 2. records a fleet snapshot when recording and `snapshot_interval`
//!    has elapsed,
//! 3. advances playback, seeks, replays, and forwards the replayed
//!    states on the fleet channel.
//!
//! Nothing in a tick blocks. The registry operations themselves are
//! reached through [`registry_mut`](SensorEngine::registry_mut).

use std::time::Instant;

use ardan_core::{
    Command, EntityId, NetworkError, PacketEnvelope, Sink, Source, State, StateUpdate,
    TimelineError,
};
use thiserror::Error;

use crate::config::{ConfigError, EngineConfig};
use crate::forwarder::{Forwarder, UdpSink};
use crate::ingress::{ingress_queue, IngressConsumer};
use crate::metrics::{EngineStats, TickMetrics};
use crate::network::{NetworkChannel, OutboundSender};
use crate::playback::{Playback, PlaybackDirection, PlaybackSpeed};
use crate::registry::{RouteOutcome, ReplayReport, Registry};

/// Errors from building or driving a [`SensorEngine`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EngineError {
    /// The configuration is invalid.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// Binding the socket failed, or an outbound command was refused.
    #[error("network: {0}")]
    Network(#[from] NetworkError),
    /// A registry operation was rejected.
    #[error("timeline: {0}")]
    Timeline(#[from] TimelineError),
    /// A worker thread or sink socket could not be started.
    #[error("failed to start {what}: {reason}")]
    Startup {
        /// Which component failed.
        what: &'static str,
        /// The underlying OS error.
        reason: String,
    },
}

/// Registry, queues, forwarder and playback, driven by the host tick.
pub struct SensorEngine {
    config: EngineConfig,
    registry: Registry,
    ingress: IngressConsumer,
    outbound: OutboundSender,
    forwarder: Forwarder,
    network: Option<NetworkChannel>,
    playback: Playback,
    replay_pending: bool,
    recording: bool,
    last_snapshot: Option<f64>,
    last_tick: Option<f64>,
}

impl SensorEngine {
    /// Bind the network channel and start forwarding to `sink`.
    pub fn bind<S: Sink + 'static>(config: EngineConfig, sink: S) -> Result<Self, EngineError> {
        config.validate()?;
        let (producer, consumer) = ingress_queue(config.queue_capacity);
        let network = NetworkChannel::bind(&config, producer)?;
        let outbound = network.outbound();
        let mut engine = Self::from_parts(config, consumer, outbound, sink)?;
        engine.network = Some(network);
        Ok(engine)
    }

    /// Bind and forward to a [`UdpSink`] built from the config's sink
    /// addresses, or discard forwarded payloads if none are set.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        let sink: Box<dyn Sink> = match UdpSink::from_config(&config) {
            Ok(Some(udp)) => Box::new(udp),
            Ok(None) => Box::new(ardan_core::NullSink),
            Err(e) => {
                return Err(EngineError::Startup {
                    what: "udp sink",
                    reason: e.to_string(),
                })
            }
        };
        Self::bind(config, sink)
    }

    /// Assemble an engine around queues the caller already owns.
    ///
    /// No socket is bound; the caller feeds `ingress` and drains the
    /// receiver paired with `outbound`.
    pub fn from_parts<S: Sink + 'static>(
        config: EngineConfig,
        ingress: IngressConsumer,
        outbound: OutboundSender,
        sink: S,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let forwarder = Forwarder::spawn(sink, &config).map_err(|e| EngineError::Startup {
            what: "forwarder",
            reason: e.to_string(),
        })?;
        let playback = Playback::new(config.jump_step);
        Ok(Self {
            config,
            registry: Registry::new(),
            ingress,
            outbound,
            forwarder,
            network: None,
            playback,
            replay_pending: false,
            recording: false,
            last_snapshot: None,
            last_tick: None,
        })
    }

    // ── Tick ────────────────────────────────────────────────────

    /// Run one host frame at simulation time `now`.
    pub fn tick(&mut self, now: f64) -> TickMetrics {
        let start = Instant::now();
        let mut m = TickMetrics::default();

        self.ingest(&mut m);
        self.record(now, &mut m);
        self.play(now, &mut m);

        self.last_tick = Some(now);
        m.total_us = start.elapsed().as_micros() as u64;
        m
    }

    fn ingest(&mut self, m: &mut TickMetrics) {
        let batch = self.ingress.drain();
        m.drained = batch.len();
        for envelope in &batch {
            match self.registry.route(envelope) {
                RouteOutcome::Applied { entity, .. } => {
                    m.applied += 1;
                    self.forward(Source::Entity(entity), envelope, m);
                }
                RouteOutcome::UnknownEntity(_) => m.unknown_entity += 1,
                RouteOutcome::Suppressed(_) => m.suppressed += 1,
                RouteOutcome::Ignored(_) => m.ignored += 1,
            }
        }
    }

    fn record(&mut self, now: f64, m: &mut TickMetrics) {
        // Recording history while it is being replayed would record the replay.
        if !self.recording || self.playback.is_playing() {
            return;
        }
        let due = self
            .last_snapshot
            .is_none_or(|last| now - last >= self.config.snapshot_interval);
        if !due {
            return;
        }
        let report = self.registry.snapshot(now);
        m.recorded = Some(report.recorded.len());
        m.record_failures = report.failed.len();
        for (id, e) in &report.failed {
            log::debug!("entity {id} not recorded: {e}");
        }
        if report.recorded.is_empty() && !report.failed.is_empty() {
            log::warn!(
                "snapshot at {now} rejected for all {} entities; recorded history ends at {}",
                report.failed.len(),
                self.registry.latest_recorded().unwrap_or(f64::NAN)
            );
        }
        self.last_snapshot = Some(now);
    }

    fn play(&mut self, now: f64, m: &mut TickMetrics) {
        let dt = self.last_tick.map_or(0.0, |last| now - last);
        let Some(target) = self.playback.advance(dt) else {
            return;
        };
        m.replay_time = Some(target);
        // Both directions show the state as of `target`.
        let seek = self.registry.rewind(target);
        let report = self.registry.replay();
        m.replayed = report.replayed.len();

        let full = std::mem::take(&mut self.replay_pending);
        for (entity, state) in &report.replayed {
            if full || seek.changed.contains(entity) {
                self.forward_state(*entity, state, m);
            }
        }
    }

    fn forward(&self, source: Source, envelope: &PacketEnvelope, m: &mut TickMetrics) {
        match self.forwarder.publish(source, envelope) {
            Ok(()) => m.forwarded += 1,
            Err(_) => m.forward_failures += 1,
        }
    }

    fn forward_state(&self, entity: EntityId, state: &State, m: &mut TickMetrics) {
        let update = StateUpdate {
            entity,
            fields: state.to_fields(),
        };
        self.forward(Source::Fleet, &update.into(), m);
    }

    // ── Recording and playback controls ─────────────────────────

    /// Turn periodic snapshots on or off. Turning it on records on the
    /// next tick.
    pub fn set_recording(&mut self, on: bool) {
        if on && !self.recording {
            self.last_snapshot = None;
        }
        self.recording = on;
        log::info!("recording {}", if on { "started" } else { "stopped" });
    }

    /// Whether periodic snapshots are on.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Start playing recorded history from `from`. Live updates are
    /// suppressed until [`stop_playback`](Self::stop_playback).
    ///
    /// The first playback tick forwards every entity's replayed state;
    /// later ticks forward only entities whose shown entry changed.
    pub fn start_playback(&mut self, from: f64) {
        self.playback.play(from);
        self.replay_pending = true;
        self.registry.set_replay_mode(true);
        log::info!("playback started at {from}");
    }

    /// Stop playing and accept live updates again.
    pub fn stop_playback(&mut self) {
        self.playback.stop();
        self.registry.set_replay_mode(false);
        log::info!("playback stopped at {}", self.playback.replay_time());
    }

    /// Set the playback rate.
    pub fn set_playback_speed(&mut self, speed: PlaybackSpeed) {
        self.playback.set_speed(speed);
    }

    /// Set the playback direction.
    pub fn set_playback_direction(&mut self, direction: PlaybackDirection) {
        self.playback.set_direction(direction);
    }

    /// Jump `jump_step` seconds forward and replay at once.
    pub fn jump_forward(&mut self) -> ReplayReport {
        let target = self.playback.jump_forward();
        self.registry.rewind(target);
        self.replay_and_forward()
    }

    /// Jump `jump_step` seconds back and replay at once.
    pub fn jump_backward(&mut self) -> ReplayReport {
        let target = self.playback.jump_backward();
        self.registry.rewind(target);
        self.replay_and_forward()
    }

    fn replay_and_forward(&mut self) -> ReplayReport {
        let report = self.registry.replay();
        let mut m = TickMetrics::default();
        for (entity, state) in &report.replayed {
            self.forward_state(*entity, state, &mut m);
        }
        report
    }

    /// The playback controller.
    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    // ── Outbound commands ───────────────────────────────────────

    /// Ask the peer to switch `entity`'s indicator on or off.
    pub fn set_indicator(&self, entity: EntityId, on: bool) -> Result<(), EngineError> {
        self.send_command(Command::SetIndicator { entity, on })
    }

    /// Ask the peer to fire a one-shot event on `entity`.
    pub fn trigger_event(&self, entity: EntityId) -> Result<(), EngineError> {
        self.send_command(Command::TriggerEvent { entity })
    }

    fn send_command(&self, cmd: Command) -> Result<(), EngineError> {
        if !self.registry.contains(cmd.entity()) {
            return Err(TimelineError::UnknownEntity(cmd.entity()).into());
        }
        self.outbound.send(cmd.into())?;
        Ok(())
    }

    // ── Accessors ───────────────────────────────────────────────

    /// The registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The registry, for host registration and fleet operations.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The validated configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Local socket address, when bound.
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.network.as_ref().map(NetworkChannel::local_addr)
    }

    /// Cumulative counters of every stage.
    pub fn stats(&self) -> EngineStats {
        let network = match &self.network {
            Some(chan) => chan.stats().snapshot(),
            None => self.outbound.stats().snapshot(),
        };
        EngineStats {
            network,
            queue: self.ingress.stats().snapshot(),
            forwarder: self.forwarder.stats().snapshot(),
        }
    }

    /// Stop the network threads and flush the forwarder. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(chan) = self.network.as_mut() {
            chan.shutdown();
        }
        self.forwarder.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingress::IngressProducer;
    use crate::network::{outbound_queue, NetworkStats};
    use ardan_test_utils::{duty_update, MemorySink};
    use crossbeam_channel::Receiver;
    use std::sync::Arc;

    struct Rig {
        engine: SensorEngine,
        ingress: IngressProducer,
        outbound: Receiver<PacketEnvelope>,
        sink: MemorySink,
    }

    fn rig(config: EngineConfig) -> Rig {
        let (producer, consumer) = ingress_queue(config.queue_capacity);
        let (out_tx, out_rx) = outbound_queue(config.outbound_capacity, Arc::new(NetworkStats::default()));
        let sink = MemorySink::new();
        let engine = SensorEngine::from_parts(config, consumer, out_tx, sink.clone()).unwrap();
        Rig {
            engine,
            ingress: producer,
            outbound: out_rx,
            sink,
        }
    }

    #[test]
    fn tick_routes_and_forwards_updates() {
        let mut r = rig(EngineConfig::default());
        r.engine.registry_mut().register_entity(EntityId(1)).unwrap();
        r.ingress.push(duty_update(1, 0.0, 0.4).into());
        r.ingress.push(duty_update(2, 0.0, 0.4).into());

        let m = r.engine.tick(0.0);
        assert_eq!(m.drained, 2);
        assert_eq!(m.applied, 1);
        assert_eq!(m.unknown_entity, 1);
        assert_eq!(m.forwarded, 1);

        r.engine.shutdown();
        let published = r.sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, Source::Entity(EntityId(1)));
        assert_eq!(
            ardan_wire::decode(&published[0].1).unwrap(),
            PacketEnvelope::from(duty_update(1, 0.0, 0.4))
        );
    }

    #[test]
    fn recording_respects_interval() {
        let mut r = rig(EngineConfig {
            snapshot_interval: 0.5,
            ..EngineConfig::default()
        });
        r.engine.registry_mut().register_entity(EntityId(1)).unwrap();
        assert_eq!(r.engine.tick(0.0).recorded, None);

        r.engine.set_recording(true);
        assert_eq!(r.engine.tick(0.1).recorded, Some(1));
        assert_eq!(r.engine.tick(0.3).recorded, None);
        assert_eq!(r.engine.tick(0.7).recorded, Some(1));
        let tl = r.engine.registry().entity(EntityId(1)).unwrap().branches().active_timeline().unwrap();
        assert_eq!(tl.len(), 2);
    }

    #[test]
    fn playback_replays_and_suppresses_live() {
        let mut r = rig(EngineConfig::default());
        r.engine.registry_mut().register_entity(EntityId(1)).unwrap();
        for (t, d) in [(0.0, 0.1), (1.0, 0.2), (2.0, 0.3)] {
            r.ingress.push(duty_update(1, t, d).into());
            r.engine.tick(t);
            r.engine.registry_mut().snapshot(t);
        }

        r.engine.start_playback(0.5);
        r.ingress.push(duty_update(1, 9.0, 0.9).into());
        let m = r.engine.tick(2.5);
        assert_eq!(m.suppressed, 1);
        assert_eq!(m.replay_time, Some(1.0));
        assert_eq!(m.replayed, 1);
        let live = r.engine.registry().get_live_state(EntityId(1)).unwrap();
        assert_eq!(live.radio_duty, 0.2);

        r.engine.stop_playback();
        r.ingress.push(duty_update(1, 9.0, 0.9).into());
        let m = r.engine.tick(3.0);
        assert_eq!(m.applied, 1);
        assert_eq!(m.replay_time, None);
    }

    #[test]
    fn jumps_move_by_step() {
        let mut r = rig(EngineConfig {
            jump_step: 1.0,
            ..EngineConfig::default()
        });
        r.engine.registry_mut().register_entity(EntityId(1)).unwrap();
        for (t, d) in [(0.0, 0.1), (1.0, 0.2), (2.0, 0.3)] {
            r.engine
                .registry_mut()
                .set_live_state(EntityId(1), &duty_update(1, t, d).fields)
                .unwrap();
            r.engine.registry_mut().snapshot(t);
        }
        r.engine.registry_mut().rewind(0.0);

        let report = r.engine.jump_forward();
        assert_eq!(report.replayed[0].1.radio_duty, 0.2);
        let report = r.engine.jump_backward();
        assert_eq!(report.replayed[0].1.radio_duty, 0.1);

        r.engine.shutdown();
        assert!(r.sink.published().iter().all(|(src, _)| *src == Source::Fleet));
        assert_eq!(r.sink.len(), 2);
    }

    #[test]
    fn forward_playback_shows_the_state_as_of_replay_time() {
        let mut r = rig(EngineConfig::default());
        r.engine.registry_mut().register_entity(EntityId(1)).unwrap();
        for (t, d) in [(0.0, 0.1), (1.0, 0.2), (2.0, 0.3)] {
            r.ingress.push(duty_update(1, t, d).into());
            r.engine.tick(t);
            r.engine.registry_mut().snapshot(t);
        }

        r.engine.start_playback(1.0);
        let m = r.engine.tick(2.1);
        assert!((m.replay_time.unwrap() - 1.1).abs() < 1e-9);
        let live = r.engine.registry().get_live_state(EntityId(1)).unwrap();
        assert_eq!(live.timestamp, 1.0);
        assert_eq!(live.radio_duty, 0.2);

        r.engine.set_playback_direction(PlaybackDirection::Reverse);
        let m = r.engine.tick(2.6);
        assert!((m.replay_time.unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(r.engine.registry().get_live_state(EntityId(1)).unwrap().timestamp, 0.0);
    }

    #[test]
    fn playback_forwards_only_changed_entries() {
        let mut r = rig(EngineConfig::default());
        r.engine.registry_mut().register_entity(EntityId(1)).unwrap();
        for t in [0.0, 1.0, 2.0] {
            r.ingress.push(duty_update(1, t, t).into());
            r.engine.tick(t);
            r.engine.registry_mut().snapshot(t);
        }

        r.engine.start_playback(1.0);
        // First playback tick always publishes.
        assert_eq!(r.engine.tick(2.1).forwarded, 1);
        // Still on the t=1 entry.
        let m = r.engine.tick(2.2);
        assert_eq!((m.replayed, m.forwarded), (1, 0));
        // Past the end: the last entry once, then nothing.
        assert_eq!(r.engine.tick(5.0).forwarded, 1);
        let m = r.engine.tick(5.5);
        assert_eq!((m.replayed, m.forwarded), (1, 0));
        r.engine.stop_playback();

        r.engine.shutdown();
        assert_eq!(r.sink.published().len(), 3 + 2);
    }

    #[test]
    fn recording_after_restore_starts_past_the_loaded_history() {
        let mut r = rig(EngineConfig::default());
        r.engine
            .registry_mut()
            .copy_in(ardan_test_utils::recorded_fleet(2, 3))
            .unwrap();
        let resume = r.engine.registry().latest_recorded().unwrap();
        assert_eq!(resume, 2.0);
        r.engine.set_recording(true);

        let m = r.engine.tick(0.5);
        assert_eq!((m.recorded, m.record_failures), (Some(0), 2));

        let next = resume + r.engine.config().snapshot_interval;
        let m = r.engine.tick(next);
        assert_eq!((m.recorded, m.record_failures), (Some(2), 0));
    }

    #[test]
    fn commands_need_a_known_entity() {
        let r = rig(EngineConfig {
            outbound_capacity: 1,
            ..EngineConfig::default()
        });
        let mut engine = r.engine;
        assert_eq!(
            engine.trigger_event(EntityId(3)),
            Err(EngineError::Timeline(TimelineError::UnknownEntity(EntityId(3))))
        );
        engine.registry_mut().register_entity(EntityId(3)).unwrap();
        engine.set_indicator(EntityId(3), true).unwrap();
        assert_eq!(
            engine.trigger_event(EntityId(3)),
            Err(EngineError::Network(NetworkError::OutboundFull))
        );
        assert_eq!(engine.stats().network.outbound_full, 1);
        assert_eq!(
            r.outbound.try_recv().unwrap(),
            PacketEnvelope::from(Command::SetIndicator {
                entity: EntityId(3),
                on: true
            })
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (_p, consumer) = ingress_queue(1);
        let (out, _rx) = outbound_queue(1, Arc::new(NetworkStats::default()));
        let cfg = EngineConfig {
            snapshot_interval: 0.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            SensorEngine::from_parts(cfg, consumer, out, ardan_core::NullSink),
            Err(EngineError::Config(_))
        ));
    }
}
