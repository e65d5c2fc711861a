//! Single runs and parallel batches.
//!
//! `run_batch` is the only batch code path: it runs every job on a rayon pool
//! of `concurrency` threads, and `concurrency = 1` is plain sequential
//! execution. Each job owns its data, simulation and random stream, so results
//! do not depend on scheduling. A failing or panicking job yields an `Err` in
//! its own slot and never aborts its siblings.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rayon::prelude::*;

use spreadlab_core::data::{InMemorySource, MarketDataSource, StaticScreener, TimedSource};
use spreadlab_core::Simulation;

use crate::config::RunConfig;
use crate::csv_source::load_data_dir;
use crate::report::RunReport;

/// Outcome of one batch job, in submission order.
#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub result: Result<RunReport>,
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Load the run's data directory and simulate it.
pub fn run_single(config: &RunConfig) -> Result<RunReport> {
    config.validate()?;
    let dir = config
        .run
        .data_dir
        .as_deref()
        .ok_or_else(|| anyhow!("run '{}' has no data_dir", config.run.name))?;
    let source = load_data_dir(dir).with_context(|| format!("failed to load data for run '{}'", config.run.name))?;
    run_with_source(config, source)
}

/// Simulate `config` over an already-loaded source.
pub fn run_with_source(config: &RunConfig, source: InMemorySource) -> Result<RunReport> {
    let timestamps = source.timestamps();
    run_on_source(config, Arc::new(source), &timestamps)
}

/// Simulate `config` over any data source and timestamp set.
///
/// Sources that may block are wrapped in a `TimedSource` bounded by
/// `fetch_timeout_ms`; in-memory sources are queried directly.
pub fn run_on_source(
    config: &RunConfig,
    source: Arc<dyn MarketDataSource>,
    timestamps: &[NaiveDateTime],
) -> Result<RunReport> {
    let sim_config = config.simulation_config();
    let run_id = config.run_id()?;

    let timestamps: Vec<_> = timestamps.iter().copied().filter(|t| config.in_window(*t)).collect();
    let timed;
    let data: &dyn MarketDataSource = if source.may_block() {
        timed = TimedSource::new(Arc::clone(&source), Duration::from_millis(sim_config.fetch_timeout_ms));
        &timed
    } else {
        source.as_ref()
    };
    let screener = StaticScreener::new(config.run.symbols.iter().cloned());

    tracing::info!(
        run = %config.run.name,
        run_id = %run_id,
        source = data.name(),
        timed = source.may_block(),
        symbols = config.run.symbols.len(),
        timestamps = timestamps.len(),
        "run started"
    );
    let mut sim = Simulation::backtest(sim_config, &run_id)?;
    let result = sim
        .run(&timestamps, data, &screener)
        .with_context(|| format!("run '{}' failed", config.run.name))?;
    Ok(RunReport::new(config.run.name.clone(), run_id, result))
}

fn run_isolated(config: &RunConfig) -> JobOutcome {
    let name = config.run.name.clone();
    let result = match panic::catch_unwind(AssertUnwindSafe(|| run_single(config))) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("run '{name}' panicked: {}", panic_message(payload.as_ref()))),
    };
    if let Err(e) = &result {
        tracing::warn!(run = %name, error = %format!("{e:#}"), "run failed");
    }
    JobOutcome { name, result }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run every job on `concurrency` worker threads (at least one).
///
/// Fails only if the thread pool cannot be built; per-job failures are
/// reported in the returned outcomes.
pub fn run_batch(jobs: &[RunConfig], concurrency: usize) -> Result<Vec<JobOutcome>> {
    let threads = concurrency.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("spreadlab-batch-{i}"))
        .build()
        .context("failed to build batch thread pool")?;

    tracing::info!(jobs = jobs.len(), threads, "batch started");
    let outcomes: Vec<JobOutcome> = pool.install(|| jobs.par_iter().map(run_isolated).collect());
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    tracing::info!(jobs = outcomes.len(), failed, "batch finished");
    Ok(outcomes)
}

/// Load several run files. Stops at the first unreadable or invalid file.
pub fn load_jobs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<RunConfig>> {
    paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            RunConfig::load(p).with_context(|| format!("failed to load run config {}", p.display()))
        })
        .collect()
}
