//! # Cell Scout
//!
//! Log the serving cell tower alongside location fixes.
//!
//! This application drives the measurement engine from the command line:
//! replaying recorded traces through the sampling loop, and inspecting or
//! clearing the measurement database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use cell_scout::cell::sampler::RadioCellSampler;
use cell_scout::cell::Technology;
use cell_scout::config::{Config, LoggingConfig, SamplingConfig};
use cell_scout::filter::SampleFilter;
use cell_scout::location::ProviderLocationSource;
use cell_scout::nudge;
use cell_scout::replay::TraceReplay;
use cell_scout::sampling::{LoopReport, SamplingLoop, StopSignal};
use cell_scout::store::{MeasurementStore, SqliteStore};

/// File name prefix of the daily-rotated log files
const LOG_FILE_PREFIX: &str = "cell-scout.log";

#[derive(Parser, Debug)]
#[command(name = "cell-scout", version, about = "Serving cell tower logger")]
struct Cli {
    /// TOML configuration file (built-in defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sampling loop until Ctrl+C or the end of the trace
    Run {
        /// JSONL trace to replay as the location and radio backend
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Poll cached fixes on the UI cadence instead of acquiring fresh ones
        #[arg(long, default_value_t = false)]
        ui_poll: bool,
    },
    /// Print the number of stored samples per technology
    Count,
    /// Delete every stored sample
    Clear,
}

/// Main entry point for Cell Scout
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load and validate configuration
///    - Set up logging (console, plus daily files when enabled)
///    - Open the measurement database
///
/// 2. **Command**
///    - `run`: sample until Ctrl+C or until the trace runs out
///    - `count` / `clear`: one store operation, then exit
///
/// # Errors
///
/// Returns error if:
/// - Configuration cannot be loaded or is invalid
/// - The database cannot be opened
/// - `run` is given no trace (there is no live backend on this host)
///
/// # Examples
///
/// ```bash
/// cargo run --release -- --config cell-scout.toml run --trace drive.jsonl
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    // Keep the guard alive so buffered file output is flushed on exit
    let _guard = init_logging(&config.logging)?;

    info!("Cell Scout v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = SqliteStore::open(&config.storage.database_path)
        .with_context(|| format!("Failed to open database {}", config.storage.database_path))?;
    let store = Arc::new(store);

    match cli.command {
        Command::Run { trace, ui_poll } => {
            let Some(trace) = trace else {
                bail!("No location or telephony backend available on this host; pass --trace FILE");
            };
            let report = run(&config, store.clone(), &trace, ui_poll).await?;
            print_report(&report);
            print_counts(store.as_ref())?;
        }
        Command::Count => print_counts(store.as_ref())?,
        Command::Clear => {
            store.clear_all()?;
            info!("Cleared all stored samples");
        }
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("Invalid log level")?;

    let (file_layer, guard) = if config.file_enabled {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory {}", config.log_dir))?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

fn sampling_config(config: &Config, ui_poll: bool) -> SamplingConfig {
    if ui_poll {
        SamplingConfig {
            acquire_timeout_ms: config.sampling.acquire_timeout_ms,
            summary_interval_cycles: config.sampling.summary_interval_cycles,
            ..SamplingConfig::ui_poll()
        }
    } else {
        config.sampling.clone()
    }
}

async fn run(config: &Config, store: Arc<SqliteStore>, trace: &Path, ui_poll: bool) -> Result<LoopReport> {
    let frames = TraceReplay::load(trace)
        .with_context(|| format!("Failed to load trace {}", trace.display()))?;

    let stop = StopSignal::new();
    let replay = TraceReplay::with_stop(frames, stop.clone());

    let sampling = SamplingLoop::new(
        sampling_config(config, ui_poll),
        Box::new(ProviderLocationSource::new(replay.clone())),
        Box::new(RadioCellSampler::new(replay)),
        SampleFilter::from_config(&config.filter),
        store,
        nudge::from_config(&config.nudge),
    );

    let handle = sampling.spawn_with(stop.clone());
    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = stop.stopped() => {}
    }

    let report = handle.stop().await.context("Sampling loop task failed")?;
    Ok(report)
}

fn print_report(report: &LoopReport) {
    println!(
        "cycles: {}  stored: {}  store failures: {}  stale: {}  not moved: {}  no fix: {}  no cell: {}",
        report.cycles,
        report.stored,
        report.store_failures,
        report.stale,
        report.not_moved,
        report.no_fix,
        report.no_cell
    );
}

fn print_counts(store: &dyn MeasurementStore) -> Result<()> {
    let counts = store.count_all()?;
    for technology in Technology::ALL {
        println!("{}: {}", technology, counts.get(&technology).copied().unwrap_or(0));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use cell_scout::config::AcquireMode;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_trace() {
        let cli = Cli::try_parse_from([
            "cell-scout", "--config", "scout.toml", "run", "--trace", "drive.jsonl", "--ui-poll",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("scout.toml")));
        match cli.command {
            Command::Run { trace, ui_poll } => {
                assert_eq!(trace, Some(PathBuf::from("drive.jsonl")));
                assert!(ui_poll);
            }
            other => panic!("Expected run, got: {:?}", other),
        }
    }

    #[test]
    fn test_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["cell-scout", "count", "--config", "scout.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Count));
        assert_eq!(cli.config, Some(PathBuf::from("scout.toml")));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["cell-scout", "export"]).is_err());
    }

    #[test]
    fn test_ui_poll_keeps_configured_timeouts() {
        let mut config = Config::default();
        config.sampling.summary_interval_cycles = 7;

        let sampling = sampling_config(&config, true);
        assert_eq!(sampling.mode, AcquireMode::LastKnown);
        assert_eq!(sampling.interval_ms, 3000);
        assert_eq!(sampling.summary_interval_cycles, 7);

        assert_eq!(sampling_config(&config, false), config.sampling);
    }
}
