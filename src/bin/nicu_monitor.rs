//! `nicu-monitor`: open one patient view and log it until stopped.
//!
//! ```bash
//! cargo run --bin nicu-monitor -- --patient 42 --range 4h --ticks 30 --csv trend.csv
//! RUST_LOG=nicu_vitals=debug cargo run --bin nicu-monitor
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use nicu_vitals::{
    ConfigLoader, PatientId, PatientProfile, SignalKind, StaticProfiles, TimeRange, VitalsContext,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nicu-monitor", version, about = "NICU vitals trend monitor", long_about = None)]
struct Args {
    /// Patient to open a view on
    #[arg(short, long, default_value = "1")]
    patient: String,

    /// Initial trend window (1h, 4h, 12h, 24h); overrides the configuration
    #[arg(short, long)]
    range: Option<TimeRange>,

    /// Stop after this many status ticks
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Export the trend buffers to this file on exit
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Read configuration from this file only
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Ignore the live feed and run on simulation
    #[arg(long, default_value_t = false)]
    simulate: bool,

    /// Log configuration changes made while running
    #[arg(long, default_value_t = false)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("nicu-monitor v{}", nicu_vitals::VERSION);

    let mut loader = match &args.config {
        Some(path) => ConfigLoader::with_paths(vec![path.clone()]),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load_system_config().context("loading configuration")?;
    if let Some(range) = args.range {
        config.engine.initial_range = range;
    }
    if args.simulate {
        config.feed.enabled = false;
    }

    if args.watch {
        loader
            .enable_hot_reload(|updated| {
                info!(summary = ?updated.get_summary(), "configuration changed, applies to views opened later");
            })
            .context("enabling configuration hot reload")?;
    }

    let profiles = Arc::new(StaticProfiles::with_fallback(PatientProfile::neonatal_default()));
    let context = VitalsContext::new(config.clone(), profiles).context("creating vitals context")?;
    let patient = PatientId::new(args.patient);

    #[cfg(feature = "redis")]
    let view = if config.feed.enabled {
        context.open_redis_view(patient)?
    } else {
        context.open_view(patient, None)?
    };
    #[cfg(not(feature = "redis"))]
    let view = context.open_view(patient, None)?;

    let mut interval = tokio::time::interval(Duration::from_millis(config.engine.tick_interval_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
            _ = interval.tick() => {
                let status = view.status();
                let hr = view.latest(SignalKind::HeartRate).map(|s| s.value);
                let spo2 = view.latest(SignalKind::SpO2).map(|s| s.value);
                info!(
                    patient = %view.patient(),
                    state = %status.state,
                    range = %status.time_range,
                    paused = status.paused,
                    hr = ?hr,
                    spo2 = ?spo2,
                    severity = %view.overall_severity(),
                    "status"
                );

                ticks += 1;
                if args.ticks.is_some_and(|limit| ticks >= limit) {
                    break;
                }
            }
        }
    }

    if let Some(path) = &args.csv {
        match view.export_csv(path) {
            Ok(rows) => info!(path = %path.display(), rows, "exported trend"),
            Err(e) => warn!(path = %path.display(), error = %e, "export failed"),
        }
    }

    view.close().await?;
    Ok(())
}
