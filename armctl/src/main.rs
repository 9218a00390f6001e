// src/main.rs
//
// CLI entrypoint: runs the control engine against the kinematic arm.
//
// Constraints:
// - Actuation precedence: --actuation overrides ARMCTL_ACTUATION;
//   otherwise the config default (position).
// - Deterministic runs via --seed (agent exploration and target jitter).
// - Camera frames and contact batches are delivered by tokio tasks, the
//   way the simulator's message bus calls back on its own threads.
// - Print a concise run header and a final accuracy summary.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use tokio::sync::mpsc;

use armctl::config::{resolve_effective_actuation, ActuationMode, Config};
use armctl::types::{Contact, ImageFrame};
use armctl::{DeadlineFactory, Engine, EpsilonGreedyFactory, JsonlSink, KinematicArmSim};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ActuationArg {
    Position,
    Velocity,
}

#[derive(Debug, Parser)]
#[command(
    name = "armctl",
    about = "RL robotic arm control loop against a kinematic harness",
    version
)]
struct Args {
    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 20_000)]
    ticks: u64,

    /// Deterministic seed for agent exploration and target placement.
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated seconds per tick.
    #[arg(long, default_value_t = 0.001)]
    dt: f64,

    /// Actuation mode (optional). If omitted, uses ARMCTL_ACTUATION.
    #[arg(long, value_enum)]
    actuation: Option<ActuationArg>,

    /// Deliver a camera frame every N ticks.
    #[arg(long, default_value_t = 1)]
    frame_every: u64,

    /// Per-call inference budget in milliseconds (overrides config).
    #[arg(long)]
    inference_timeout_ms: Option<u64>,

    /// Write tick and episode records to this JSONL file
    /// (otherwise ARMCTL_TELEMETRY_* decides).
    #[arg(long)]
    events: Option<PathBuf>,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn fnv1a64(s: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let cli_actuation = args.actuation.map(|a| match a {
        ActuationArg::Position => ActuationMode::Position,
        ActuationArg::Velocity => ActuationMode::Velocity,
    });
    let effective = resolve_effective_actuation(cli_actuation);
    effective.log_startup();

    let mut cfg = Config::from_env_or_default();
    cfg.actuation = effective.mode;
    if let Some(seed) = args.seed {
        cfg.agent.seed = seed;
    }
    if let Some(ms) = args.inference_timeout_ms {
        cfg.agent.inference_timeout_ms = ms;
    }
    let cfg_hash = fnv1a64(&format!("{cfg:?}"));

    println!(
        "armctl | cfg={} | cfg_hash=0x{:016x} | actuation={} | ticks={} | dt={} | seed={}",
        cfg.version,
        cfg_hash,
        cfg.actuation.as_str(),
        args.ticks,
        args.dt,
        args.seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    let sink = match &args.events {
        Some(path) => JsonlSink::create(path),
        None => JsonlSink::from_env(),
    };
    let mut sim = KinematicArmSim::new(&cfg)
        .with_camera(cfg.perception.width as u32, cfg.perception.height as u32)
        .with_target_jitter(cfg.agent.seed, 0.1);
    let mut engine = Engine::with_sink(cfg, DeadlineFactory::new(EpsilonGreedyFactory), sink)
        .context("invalid configuration")?;

    let (frame_tx, mut frame_rx) = mpsc::channel::<ImageFrame>(4);
    let (contact_tx, mut contact_rx) = mpsc::channel::<Vec<Contact>>(16);

    let perception = engine.perception_handle();
    let camera = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            // format errors are logged by the buffer; the next frame retries
            let _ = perception.ingest(&frame);
        }
    });

    let observer = engine.contact_observer();
    let contacts = tokio::spawn(async move {
        while let Some(batch) = contact_rx.recv().await {
            observer.ingest_contacts(&batch);
        }
    });

    let frame_every = args.frame_every.max(1);
    let mut failures = 0u64;
    for tick in 0..args.ticks {
        let now = sim.advance(args.dt);
        if tick % frame_every == 0 {
            frame_tx
                .send(sim.render())
                .await
                .context("camera task stopped")?;
        }
        contact_tx
            .send(sim.contacts())
            .await
            .context("contact task stopped")?;
        tokio::task::yield_now().await;

        let report = engine.on_update(&mut sim, now);
        failures += report.failures.len() as u64;
    }

    drop(frame_tx);
    drop(contact_tx);
    camera.await.context("camera task panicked")?;
    contacts.await.context("contact task panicked")?;
    engine.sink_mut().flush();

    let counters = engine.counters();
    println!(
        "armctl | episodes={} | wins={} | accuracy={:.4} | failures={} | sim_time={:.3}s",
        counters.total_episodes,
        counters.successful_episodes,
        counters.accuracy(),
        failures,
        sim.time()
    );

    Ok(())
}
