//! Thermogate main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  HardwareAdapter        LogRecorder      FileStore           │
//! │  (Sensor + Relay)       AuditFile        SystemClock         │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ─────────────────       │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │  Sampler ─▶ SharedDeviceState ◀─ Controller          │    │
//! │  │                    ▲                  │              │    │
//! │  │                    └── SafetyGateKeeper ◀┘           │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tracing_subscriber::EnvFilter;

use thermogate::adapters::audit_file::read_records;
use thermogate::adapters::store::FileStore;
use thermogate::app::service::{StopCause, Thermostat};
use thermogate::config::{HardwareMode, ThermostatConfig};
use thermogate::state::StatePersistence;

#[derive(Parser)]
#[command(name = "thermogate", version, about = "Safety-gated thermostat relay controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sampler and controller loops.
    Run {
        /// JSON configuration file; defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the target temperature (°C, 0–50).
        #[arg(long)]
        target: Option<f64>,
        /// Override the hardware mode.
        #[arg(long)]
        mode: Option<HardwareMode>,
        /// Stop after this many seconds and leave the relay off.
        #[arg(long)]
        run_for: Option<u64>,
    },
    /// Print the persisted shared state and recent transitions.
    Status {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Run {
            config,
            target,
            mode,
            run_for,
        } => run(config.as_deref(), target, mode, run_for),
        Command::Status { config } => status(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<ThermostatConfig> {
    match path {
        Some(p) => ThermostatConfig::load(p)
            .with_context(|| format!("loading configuration from {}", p.display())),
        None => Ok(ThermostatConfig::default()),
    }
}

fn run(
    config: Option<&Path>,
    target: Option<f64>,
    mode: Option<HardwareMode>,
    run_for: Option<u64>,
) -> Result<()> {
    let mut cfg = load_config(config)?;
    if let Some(t) = target {
        cfg.target_temperature_c = t;
    }
    if let Some(m) = mode {
        cfg.mode = m;
    }
    cfg.validate().context("invalid configuration")?;

    info!(
        "Starting: target {:.2} °C, mode {:?}, min-on {} min, cool-down {} min, max-on {} min",
        cfg.target_temperature_c,
        cfg.mode,
        cfg.safety.minimum_on_minutes,
        cfg.safety.cool_down_minutes,
        cfg.safety.maximum_on_minutes,
    );

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Release))
            .context("installing SIGINT/SIGTERM handler")?;
    }

    let running = Thermostat::from_config(&cfg)
        .context("building thermostat")?
        .start()
        .context("spawning worker threads")?;

    let deadline = run_for.map(|s| Instant::now() + Duration::from_secs(s));
    match running.supervise(&stop, deadline) {
        StopCause::Signal => warn!("Signal received, shutting down"),
        StopCause::WorkerDied => error!("A worker thread stopped unexpectedly, shutting down"),
        StopCause::Deadline => info!("Run time elapsed, shutting down"),
    }
    running.shutdown();
    Ok(())
}

fn status(config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let Some(dir) = &cfg.state_store.dir else {
        bail!("state_store.dir is not configured; nothing is persisted");
    };

    let store = FileStore::new(dir.clone());
    match StatePersistence::load(&store) {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("no persisted state in {}", dir.display()),
    }

    if let Some(path) = &cfg.audit.path {
        if let Ok(records) = read_records(path) {
            let skip = records.len().saturating_sub(5);
            for r in &records[skip..] {
                println!("{}", serde_json::to_string(r)?);
            }
        }
    }
    Ok(())
}
