//! SpreadLab CLI: run, batch and config-check commands.
//!
//! Commands:
//! - `run`: simulate one run file over its CSV data directory
//! - `batch`: simulate several run files in parallel
//! - `check-config`: validate a run file and print the effective configuration
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use spreadlab_runner::{format_summary, load_jobs, run_batch, run_single, save_artifacts, RunConfig};

#[derive(Parser)]
#[command(
    name = "spreadlab",
    about = "SpreadLab CLI, an options spread simulator with execution realism"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a single run file.
    Run {
        /// Path to a TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Data directory; overrides `run.data_dir`.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Directory for report.json, positions.csv and rejections.csv.
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Simulate several run files on a worker pool.
    Batch {
        /// Run files (repeat the flag for each).
        #[arg(long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Worker threads. 1 runs the jobs one after another.
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Directory for per-run artifacts.
        #[arg(long, default_value = "output")]
        out: PathBuf,
    },
    /// Validate a run file and print its run ID and effective configuration.
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, data, out } => run_cmd(&config, data, &out),
        Commands::Batch {
            configs,
            concurrency,
            out,
        } => batch_cmd(&configs, concurrency, &out),
        Commands::CheckConfig { config } => check_config_cmd(&config),
    }
}

fn run_cmd(config_path: &Path, data: Option<PathBuf>, out: &Path) -> Result<()> {
    let mut config =
        RunConfig::load(config_path).with_context(|| format!("failed to load {}", config_path.display()))?;
    if data.is_some() {
        config.run.data_dir = data;
    }

    let report = run_single(&config)?;
    print!("{}", format_summary(&report));

    let run_dir = save_artifacts(&report, out)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn batch_cmd(configs: &[PathBuf], concurrency: usize, out: &Path) -> Result<()> {
    let jobs = load_jobs(configs)?;
    let outcomes = run_batch(&jobs, concurrency)?;

    let mut failed = 0usize;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                print!("{}", format_summary(report));
                let run_dir = save_artifacts(report, out)?;
                println!("Artifacts saved to: {}\n", run_dir.display());
            }
            Err(e) => {
                failed += 1;
                eprintln!("Run {} failed: {e:#}\n", outcome.name);
            }
        }
    }

    println!("{} of {} runs succeeded", outcomes.len() - failed, outcomes.len());
    if failed > 0 {
        bail!("{failed} run(s) failed");
    }
    Ok(())
}

fn check_config_cmd(config_path: &Path) -> Result<()> {
    let config =
        RunConfig::load(config_path).with_context(|| format!("failed to load {}", config_path.display()))?;
    let run_id = config.run_id()?;
    println!("Config OK: {}", config_path.display());
    println!("Run: {} ({run_id})", config.run.name);
    println!("Symbols: {}", config.run.symbols.join(", "));
    match &config.run.data_dir {
        Some(dir) => println!("Data: {}", dir.display()),
        None => println!("Data: (none; pass --data to `run`)"),
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&config.simulation_config()).context("failed to render simulation config")?
    );
    Ok(())
}
