//! Run configuration files.
//!
//! A run file names the run, its symbol universe and data directory, and
//! embeds the full simulation configuration:
//!
//! ```toml
//! [run]
//! name = "spy-q1"
//! symbols = ["SPY"]
//! data_dir = "data/spy"
//! start = "2024-01-02T09:30:00"
//! seed = 7
//!
//! [simulation]
//! initial_equity = 50000.0
//!
//! [simulation.fill]
//! min_oi_threshold = 100
//! ```
//!
//! A relative `data_dir` is resolved against the config file's directory.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use spreadlab_core::domain::RunId;
use spreadlab_core::{ConfigError, SimulationConfig};

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid run config: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Simulation(#[from] ConfigError),

    #[error("failed to serialize run config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The `[run]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    pub name: String,
    /// Symbols scanned each timestamp, highest rank first.
    pub symbols: Vec<String>,
    /// Directory holding `chains.csv`, `prices.csv` and optionally `vix.csv`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// First timestamp simulated (inclusive).
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    /// Last timestamp simulated (inclusive).
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    /// Overrides `simulation.seed` when set.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub run: RunSection,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl RunConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, RunConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a run file.
    pub fn load(path: &Path) -> Result<Self, RunConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let (Some(dir), Some(base)) = (config.run.data_dir.as_mut(), path.parent()) {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        if self.run.name.trim().is_empty() {
            return Err(RunConfigError::Invalid {
                field: "run.name",
                reason: "must not be empty".into(),
            });
        }
        if self.run.symbols.is_empty() {
            return Err(RunConfigError::Invalid {
                field: "run.symbols",
                reason: "at least one symbol is required".into(),
            });
        }
        if let Some(blank) = self.run.symbols.iter().position(|s| s.trim().is_empty()) {
            return Err(RunConfigError::Invalid {
                field: "run.symbols",
                reason: format!("symbol #{blank} is blank"),
            });
        }
        if let (Some(start), Some(end)) = (self.run.start, self.run.end) {
            if start > end {
                return Err(RunConfigError::Invalid {
                    field: "run.start",
                    reason: format!("{start} is after end {end}"),
                });
            }
        }
        self.simulation.validate()?;
        Ok(())
    }

    /// Simulation config with the run-level seed override applied.
    pub fn simulation_config(&self) -> SimulationConfig {
        let mut config = self.simulation.clone();
        if let Some(seed) = self.run.seed {
            config.seed = seed;
        }
        config
    }

    /// Deterministic ID over the run name, the configuration and the seed.
    ///
    /// The data directory is left out, so a run file hashes the same wherever
    /// it is checked out.
    pub fn run_id(&self) -> Result<RunId, RunConfigError> {
        let mut identity = self.clone();
        identity.run.data_dir = None;
        let json = serde_json::to_string(&identity)?;
        Ok(RunId::derive(&self.run.name, &json, self.simulation_config().seed))
    }

    /// Whether `t` lies inside the configured `[start, end]` window.
    pub fn in_window(&self, t: NaiveDateTime) -> bool {
        self.run.start.map_or(true, |s| t >= s) && self.run.end.map_or(true, |e| t <= e)
    }
}
