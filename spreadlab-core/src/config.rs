//! Simulation configuration.
//!
//! One immutable `SimulationConfig` is built per run and handed to every model
//! at construction. Nothing reads thresholds from global state, so parallel
//! runs with different configurations never interfere.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::CalendarConfig;
use crate::engine::ExitRules;
use crate::models::{FillModelConfig, GapModelConfig, SlippageModelConfig};
use crate::risk::RiskLimits;
use crate::signals::StrategyParams;

/// Invalid or unreadable configuration. Fatal: a run never starts with one.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is not finite"),
        })
    }
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is negative"),
        });
    }
    Ok(())
}

pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    ensure_finite(field, value)?;
    if value <= 0.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{value} must be positive"),
        });
    }
    Ok(())
}

/// Value must lie in `[0, 1]`.
pub(crate) fn ensure_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    ensure_finite(field, value)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is outside [0, 1]"),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_equity: f64,
    /// Master seed for fill draws.
    pub seed: u64,
    /// VIX level assumed when the data source has none for a timestamp.
    pub default_volatility_index: f64,
    /// Upper bound on a single data-source fetch.
    pub fetch_timeout_ms: u64,
    /// Commission per contract per leg, charged on entry and exit.
    pub commission_per_contract: f64,
    pub slippage: SlippageModelConfig,
    pub fill: FillModelConfig,
    pub gap: GapModelConfig,
    pub risk: RiskLimits,
    pub exits: ExitRules,
    pub strategy: StrategyParams,
    pub calendar: CalendarConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_equity: 100_000.0,
            seed: 42,
            default_volatility_index: 20.0,
            fetch_timeout_ms: 5_000,
            commission_per_contract: 1.0,
            slippage: SlippageModelConfig::default(),
            fill: FillModelConfig::default(),
            gap: GapModelConfig::default(),
            risk: RiskLimits::default(),
            exits: ExitRules::default(),
            strategy: StrategyParams::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("initial_equity", self.initial_equity)?;
        ensure_non_negative("default_volatility_index", self.default_volatility_index)?;
        ensure_non_negative("commission_per_contract", self.commission_per_contract)?;
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_ms",
                reason: "must be at least 1 ms".into(),
            });
        }
        self.slippage.validate()?;
        self.fill.validate()?;
        self.gap.validate()?;
        self.risk.validate()?;
        self.exits.validate()?;
        self.strategy.validate()?;
        self.calendar.validate()?;
        Ok(())
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        SimulationConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, SimulationConfig::default());
    }

    #[test]
    fn recognized_keys_map_to_model_fields() {
        let cfg = SimulationConfig::from_toml_str(
            r#"
            seed = 7

            [fill]
            min_oi_threshold = 100
            max_spread_threshold = 0.15
            illiquid_hour_multiplier = 0.9
            high_vix_multiplier = 0.7
            enable_fill_probability = false

            [gap]
            enable_gap_risk = false
            avg_overnight_gap = 0.01
            weekend_gap_multiplier = 2.0
            earnings_gap_multiplier = 4.0
            gap_stop_loss_slippage = 0.03

            [risk]
            max_positions = 3
            max_allocation_fraction = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.fill.min_oi_threshold, 100);
        assert_eq!(cfg.fill.max_spread_threshold, 0.15);
        assert_eq!(cfg.fill.illiquid_hour_multiplier, 0.9);
        assert_eq!(cfg.fill.high_vix_multiplier, 0.7);
        assert!(!cfg.fill.enable_fill_probability);
        assert!(!cfg.gap.enable_gap_risk);
        assert_eq!(cfg.gap.avg_overnight_gap, 0.01);
        assert_eq!(cfg.gap.weekend_gap_multiplier, 2.0);
        assert_eq!(cfg.gap.earnings_gap_multiplier, 4.0);
        assert_eq!(cfg.gap.gap_stop_loss_slippage, 0.03);
        assert_eq!(cfg.risk.max_positions, 3);
        assert_eq!(cfg.risk.max_allocation_fraction, 0.05);
    }

    #[test]
    fn invalid_threshold_is_fatal() {
        let err = SimulationConfig::from_toml_str("[fill]\nilliquid_hour_multiplier = 1.5\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "fill.illiquid_hour_multiplier", .. }
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = SimulationConfig::from_toml_str("seed = \"abc\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn helpers_reject_nan() {
        assert!(ensure_non_negative("x", f64::NAN).is_err());
        assert!(ensure_fraction("x", 1.01).is_err());
        assert!(ensure_positive("x", 0.0).is_err());
        assert!(ensure_fraction("x", 1.0).is_ok());
    }
}
