//! SpreadLab Core: option domain types, execution-realism models, signal-to-fill pipeline.
//!
//! This crate contains the heart of the spread simulator:
//! - Domain types (option contracts, chains, signals, legs, positions, records)
//! - Slippage, fill probability and gap risk models
//! - Signal pipeline with an RSI credit-spread strategy
//! - Risk manager and execution coordinator (backtest or live routing)
//! - Timestamp loop with next-snapshot exits and closed-at-end accounting
//! - Data source contracts, fetch timeouts and deterministic random sources

pub mod calendar;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod metrics;
pub mod models;
pub mod risk;
pub mod rng;
pub mod signals;

pub use config::{ConfigError, SimulationConfig};
pub use engine::{RunResult, Simulation, SimulationError};
pub use metrics::RunMetrics;
