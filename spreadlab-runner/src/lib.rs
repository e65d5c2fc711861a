//! SpreadLab Runner: run files, CSV market data, parallel batches, reports.
//!
//! This crate builds on `spreadlab-core` to provide:
//! - TOML run configuration with a deterministic run ID
//! - CSV loading of chain snapshots, close history and VIX levels
//! - Single runs and rayon-backed batches with per-job failure isolation
//! - Run summaries with rejection breakdowns, JSON and CSV export

pub mod batch;
pub mod config;
pub mod csv_source;
pub mod report;

pub use batch::{load_jobs, run_batch, run_on_source, run_single, run_with_source, JobOutcome};
pub use config::{RunConfig, RunConfigError, RunSection};
pub use csv_source::{load_data_dir, read_chains};
pub use report::{
    export_json, export_positions_csv, export_rejections_csv, format_summary, import_json,
    load_artifacts, save_artifacts, RejectionShare, RunReport, RunSummary, SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn batch_types_cross_threads() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<RunReport>();
        assert_sync::<RunReport>();
        assert_send::<JobOutcome>();
    }
}
