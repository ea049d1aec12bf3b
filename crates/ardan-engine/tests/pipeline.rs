//! Integration tests: the host tick driving registry, history and
//! forwarder, without a socket.

use std::collections::BTreeSet;
use std::sync::Arc;

use ardan_core::{BranchIndex, EntityId, PacketEnvelope, Source};
use ardan_engine::{
    ingress_queue, outbound_queue, EngineConfig, IngressProducer, NetworkStats, PushOutcome,
    SensorEngine,
};
use ardan_test_utils::{duty_update, MemorySink};
use crossbeam_channel::Receiver;

struct Harness {
    engine: SensorEngine,
    ingress: IngressProducer,
    _outbound: Receiver<PacketEnvelope>,
    sink: MemorySink,
}

fn harness(config: EngineConfig) -> Harness {
    let (producer, consumer) = ingress_queue(config.queue_capacity);
    let (outbound, rx) = outbound_queue(config.outbound_capacity, Arc::new(NetworkStats::default()));
    let sink = MemorySink::new();
    let engine = SensorEngine::from_parts(config, consumer, outbound, sink.clone()).unwrap();
    Harness {
        engine,
        ingress: producer,
        _outbound: rx,
        sink,
    }
}

// ── Scenario ────────────────────────────────────────────────────

#[test]
fn record_rewind_fork_and_diff() {
    let mut h = harness(EngineConfig::default());
    let id = EntityId(1);
    h.engine.registry_mut().register_entity(id).unwrap();

    for (t, duty) in [(0.0, 0.1), (1.0, 0.2), (2.0, 0.3)] {
        assert_eq!(h.ingress.push(duty_update(1, t, duty).into()), PushOutcome::Accepted);
        assert_eq!(h.engine.tick(t).applied, 1);
        assert!(h.engine.registry_mut().snapshot(t).is_complete());
    }

    let reg = h.engine.registry_mut();
    assert_eq!(reg.rewind(1.5).moved, vec![id]);
    reg.replay();
    assert_eq!(reg.get_live_state(id).unwrap().radio_duty, 0.2);

    assert_eq!(reg.new_timeline().unwrap(), BranchIndex(1));
    assert_eq!(reg.active_branch(), BranchIndex(1));

    let branches = reg.entity(id).unwrap().branches();
    let forked: Vec<f64> = branches
        .branch(BranchIndex(1))
        .unwrap()
        .entries()
        .iter()
        .map(|s| s.timestamp)
        .collect();
    assert_eq!(forked, vec![0.0, 1.0]);
    assert_eq!(branches.branch(BranchIndex(0)).unwrap().len(), 3);

    assert_eq!(reg.diff(BranchIndex(0), 2.0).unwrap(), BTreeSet::from([id]));
    assert!(reg.diff(BranchIndex(0), 1.0).unwrap().is_empty());
}

#[test]
fn applied_updates_are_forwarded_per_entity() {
    let mut h = harness(EngineConfig::default());
    for id in [1, 2] {
        h.engine.registry_mut().register_entity(EntityId(id)).unwrap();
    }
    h.ingress.push(duty_update(2, 0.0, 0.5).into());
    h.ingress.push(duty_update(1, 0.0, 0.6).into());
    h.ingress.push(duty_update(9, 0.0, 0.7).into());
    let m = h.engine.tick(0.0);
    assert_eq!((m.applied, m.unknown_entity, m.forwarded), (2, 1, 2));

    h.engine.shutdown();
    let sources: Vec<Source> = h.sink.published().into_iter().map(|(s, _)| s).collect();
    assert_eq!(
        sources,
        vec![Source::Entity(EntityId(2)), Source::Entity(EntityId(1))]
    );
    assert_eq!(h.engine.stats().forwarder.published, 2);
}

// ── Ingestion back-pressure ─────────────────────────────────────

#[test]
fn full_queue_drops_newest_and_keeps_order() {
    let mut h = harness(EngineConfig {
        queue_capacity: 3,
        ..EngineConfig::default()
    });
    h.engine.registry_mut().register_entity(EntityId(1)).unwrap();

    let outcomes: Vec<PushOutcome> = (0..5u32)
        .map(|i| h.ingress.push(duty_update(1, f64::from(i), f64::from(i) / 10.0).into()))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            PushOutcome::Accepted,
            PushOutcome::Accepted,
            PushOutcome::Accepted,
            PushOutcome::DroppedNewest,
            PushOutcome::DroppedNewest,
        ]
    );

    let m = h.engine.tick(0.0);
    assert_eq!(m.drained, 3);
    // The last retained update wins.
    let live = h.engine.registry().get_live_state(EntityId(1)).unwrap();
    assert_eq!(live.timestamp, 2.0);
    assert_eq!(h.engine.stats().queue.dropped_newest, 2);
    assert_eq!(h.engine.stats().queue.accepted, 3);
}

// ── Recording and playback ──────────────────────────────────────

#[test]
fn recorded_session_plays_back_on_the_fleet_channel() {
    let mut h = harness(EngineConfig {
        snapshot_interval: 1.0,
        ..EngineConfig::default()
    });
    h.engine.registry_mut().register_entity(EntityId(1)).unwrap();
    h.engine.set_recording(true);

    // Ticks at 0, 0.5, ..., 3.0 record at 0, 1, 2, 3.
    for step in 0..=6u32 {
        let t = f64::from(step) * 0.5;
        h.ingress.push(duty_update(1, t, t / 10.0).into());
        h.engine.tick(t);
    }
    h.engine.set_recording(false);
    let recorded: Vec<f64> = h
        .engine
        .registry()
        .entity(EntityId(1))
        .unwrap()
        .branches()
        .active_timeline()
        .unwrap()
        .entries()
        .iter()
        .map(|s| s.timestamp)
        .collect();
    assert_eq!(recorded, vec![0.0, 1.0, 2.0, 3.0]);

    h.engine.start_playback(0.0);
    let m = h.engine.tick(4.0);
    assert_eq!(m.replay_time, Some(1.0));
    assert_eq!(m.replayed, 1);
    assert_eq!(h.engine.registry().get_live_state(EntityId(1)).unwrap().timestamp, 1.0);
    h.engine.stop_playback();

    h.engine.shutdown();
    let published = h.sink.published();
    let (source, payload) = published.last().unwrap();
    assert_eq!(*source, Source::Fleet);
    let PacketEnvelope::StateUpdate(update) = ardan_wire::decode(payload).unwrap() else {
        panic!("expected a state update");
    };
    assert_eq!(update.entity, EntityId(1));
    assert_eq!(update.fields.timestamp, Some(1.0));
}

// ── Persistence ─────────────────────────────────────────────────

#[test]
fn history_survives_an_archive_round_trip() {
    let mut h = harness(EngineConfig::default());
    for id in [1, 2] {
        h.engine.registry_mut().register_entity(EntityId(id)).unwrap();
    }
    for t in [0.0, 1.0, 2.0] {
        h.ingress.push(duty_update(1, t, t).into());
        h.ingress.push(duty_update(2, t, -t).into());
        h.engine.tick(t);
        h.engine.registry_mut().snapshot(t);
    }
    h.engine.registry_mut().rewind(1.0);
    h.engine.registry_mut().new_timeline().unwrap();

    let saved = h.engine.registry().copy_out();
    let mut bytes = Vec::new();
    ardan_archive::write_history(&mut bytes, &saved).unwrap();
    let loaded = ardan_archive::read_history(bytes.as_slice()).unwrap();
    assert_eq!(loaded, saved);

    let mut restored = harness(EngineConfig::default());
    restored.engine.registry_mut().copy_in(loaded).unwrap();
    let reg = restored.engine.registry();
    assert_eq!(reg.branch_count(), 2);
    assert_eq!(reg.active_branch(), BranchIndex(1));
    assert_eq!(reg.entity_ids().collect::<Vec<_>>(), vec![EntityId(1), EntityId(2)]);
    assert_eq!(reg.copy_out(), saved);
}
