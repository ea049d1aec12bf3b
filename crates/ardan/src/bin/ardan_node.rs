//! ardan-node: run the sensor engine at a fixed tick rate.
//!
//! Binds the configured socket, registers the given entities, ticks until
//! Ctrl-C, and optionally records history and saves it on exit.

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ardan::archive;
use ardan::prelude::*;
use clap::Parser;

/// ardan-node: sensor state-history engine
#[derive(Parser, Debug)]
#[command(name = "ardan-node")]
#[command(about = "Run the Ardan sensor engine at a fixed tick rate")]
#[command(version)]
struct Args {
    /// Configuration file (ardan.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// UDP bind port, overriding the config file
    #[arg(short, long)]
    port: Option<u16>,

    /// Comma-separated entity ids to register
    #[arg(short, long, value_delimiter = ',')]
    entities: Vec<u32>,

    /// Record snapshots from the first tick
    #[arg(short, long)]
    record: bool,

    /// Restore recorded history before starting
    #[arg(long)]
    load: Option<PathBuf>,

    /// Save recorded history on exit
    #[arg(long)]
    save: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<EngineConfig, EngineError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {} - {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{e}");
        process::exit(1);
    }
    log::info!("ardan-node shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args)?;
    let tick_interval = Duration::from_secs_f64(1.0 / config.tick_rate_hz);

    log::info!("ardan-node starting...");
    log::info!("  Bind: {}", config.bind_endpoint());
    log::info!("  Peer: {}", config.peer_endpoint());
    log::info!("  Tick rate: {} Hz", config.tick_rate_hz);

    let mut engine = SensorEngine::from_config(config)?;
    if let Some(path) = &args.load {
        let history = archive::load_from_path(path)?;
        engine.registry_mut().copy_in(history)?;
    }
    for id in args.entities.iter().copied().map(EntityId) {
        match engine.registry_mut().register_entity(id) {
            Ok(()) => {}
            Err(TimelineError::DuplicateEntity(_)) => log::debug!("entity {id} already restored"),
            Err(e) => return Err(e.into()),
        }
    }
    engine.set_recording(args.record);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })?;

    // Restored history fixes where recorded time resumes.
    let origin = clock_origin(engine.registry(), engine.config().snapshot_interval);
    if origin > 0.0 {
        log::info!("  Resuming recorded time at {origin}");
    }
    let start = Instant::now();
    let mut next = start;
    let mut ticks = 0u64;
    while running.load(Ordering::Relaxed) {
        let m = engine.tick(origin + start.elapsed().as_secs_f64());
        ticks += 1;
        if m.drained > 0 || m.forward_failures > 0 {
            log::trace!("tick {ticks}: {m:?}");
        }

        next += tick_interval;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            // Overran; do not try to catch up.
            next = now;
        }
    }

    engine.shutdown();
    let stats = engine.stats();
    log::info!(
        "{ticks} ticks, {} datagrams decoded, {} dropped at the queue, {} published",
        stats.network.decoded,
        stats.queue.dropped_newest,
        stats.forwarder.published
    );

    if let Some(path) = &args.save {
        archive::save_to_path(path, &engine.registry().copy_out())?;
    }
    Ok(())
}

/// Host time of the first tick: just past the latest restored entry, so
/// the first snapshot is accepted for every entity.
fn clock_origin(registry: &Registry, snapshot_interval: f64) -> f64 {
    registry
        .latest_recorded()
        .map_or(0.0, |t| t.max(0.0) + snapshot_interval)
}
