use clap::Parser;
use slotsim_core::SimConfig;
use slotsim_scheduler::{SimEvent, Simulation, SimulationEngine};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

mod render;

/// Headless driver for the slot scheduling simulator.
#[derive(Debug, Parser)]
#[command(name = "slotsim", version, about)]
struct Args {
    /// Path to a slotsim.toml (falls back to SLOTSIM_CONFIG, then ~/.slotsim/slotsim.toml).
    #[arg(long)]
    config: Option<String>,

    /// Number of ticks to run before stopping.
    #[arg(long, default_value_t = 40)]
    ticks: u64,

    /// Add a new client every N ticks (0 disables).
    #[arg(long, default_value_t = 2)]
    client_every: u64,

    /// RNG seed; overrides the config file.
    #[arg(long)]
    seed: Option<u64>,

    /// Print each tick snapshot as one JSON line.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "slotsim_cli=info,slotsim_scheduler=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // load config: --config > SLOTSIM_CONFIG env > ~/.slotsim/slotsim.toml
    let config_path = args
        .config
        .clone()
        .or_else(|| std::env::var("SLOTSIM_CONFIG").ok());
    let mut config = SimConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        SimConfig::default()
    });
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    info!(
        slots = config.slots,
        tick_ms = config.tick_ms,
        basis = ?config.priority.size_basis,
        "starting simulation"
    );

    let (engine, handle) = SimulationEngine::new(Simulation::new(config)?);
    let mut events = handle.subscribe();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    handle.start().await?;
    handle.add_client().await?;

    let mut completed = 0usize;
    loop {
        match events.recv().await {
            Ok(SimEvent::Tick(snap)) => {
                if args.json {
                    println!("{}", serde_json::to_string(&snap)?);
                } else {
                    print!("{}", render::snapshot_table(&snap));
                }
                if snap.tick >= args.ticks {
                    break;
                }
                if args.client_every > 0 && snap.tick % args.client_every == 0 {
                    handle.add_client().await?;
                }
            }
            Ok(SimEvent::JobCompleted(done)) => {
                completed += 1;
                if !args.json {
                    println!("{}", render::completion_line(&done));
                }
            }
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "display fell behind"),
            Err(RecvError::Closed) => break,
        }
    }

    handle.stop().await?;
    let _ = shutdown_tx.send(true);
    let sim = engine_task.await?;

    let snap = sim.snapshot();
    info!(
        ticks = snap.tick,
        completed,
        clients_left = snap.clients.len(),
        busy_slots = snap.slots.iter().filter(|s| s.job.is_some()).count(),
        "simulation finished"
    );
    Ok(())
}
