//! Slippage model: expected execution cost relative to mid-price.
//!
//! cost = base_spread × moneyness(|delta|) × time(DTE) × volatility(VIX)
//!
//! | |delta| bucket      | multiplier |
//! |---------------------|------------|
//! | < 0.15 (deep OTM)   | 1.8        |
//! | 0.15 – 0.25 (target)| 1.0        |
//! | 0.25 – 0.50 (near)  | 0.75       |
//! | ≥ 0.50 (ITM)        | 1.9        |
//!
//! DTE below 7 adds ×1.2. The volatility multiplier is VIX/20 clamped to
//! [0.8, 1.3]. Deterministic: identical inputs always yield identical cost.

use serde::{Deserialize, Serialize};

use crate::config::{ensure_non_negative, ensure_positive, ConfigError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlippageModelConfig {
    /// Empirical base spread cost as a fraction of mid.
    pub base_spread_fraction: f64,
    pub deep_otm_multiplier: f64,
    pub target_band_multiplier: f64,
    pub near_money_multiplier: f64,
    pub itm_multiplier: f64,
    /// Contracts expiring in fewer days than this get `near_expiry_multiplier`.
    pub near_expiry_dte: i64,
    pub near_expiry_multiplier: f64,
    /// VIX level at which the volatility multiplier is 1.0.
    pub vix_reference: f64,
    pub vix_multiplier_floor: f64,
    pub vix_multiplier_cap: f64,
}

impl Default for SlippageModelConfig {
    fn default() -> Self {
        Self {
            base_spread_fraction: 0.04,
            deep_otm_multiplier: 1.8,
            target_band_multiplier: 1.0,
            near_money_multiplier: 0.75,
            itm_multiplier: 1.9,
            near_expiry_dte: 7,
            near_expiry_multiplier: 1.2,
            vix_reference: 20.0,
            vix_multiplier_floor: 0.8,
            vix_multiplier_cap: 1.3,
        }
    }
}

impl SlippageModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("slippage.base_spread_fraction", self.base_spread_fraction)?;
        ensure_non_negative("slippage.deep_otm_multiplier", self.deep_otm_multiplier)?;
        ensure_non_negative("slippage.target_band_multiplier", self.target_band_multiplier)?;
        ensure_non_negative("slippage.near_money_multiplier", self.near_money_multiplier)?;
        ensure_non_negative("slippage.itm_multiplier", self.itm_multiplier)?;
        ensure_non_negative("slippage.near_expiry_multiplier", self.near_expiry_multiplier)?;
        ensure_positive("slippage.vix_reference", self.vix_reference)?;
        ensure_non_negative("slippage.vix_multiplier_floor", self.vix_multiplier_floor)?;
        if self.vix_multiplier_cap < self.vix_multiplier_floor {
            return Err(ConfigError::Invalid {
                field: "slippage.vix_multiplier_cap",
                reason: format!(
                    "cap {} is below floor {}",
                    self.vix_multiplier_cap, self.vix_multiplier_floor
                ),
            });
        }
        Ok(())
    }
}

/// Moneyness bucket keyed on absolute delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneynessBucket {
    DeepOtm,
    TargetBand,
    NearMoney,
    InTheMoney,
}

impl MoneynessBucket {
    pub fn from_delta(delta: f64) -> Self {
        let d = delta.abs();
        if d < 0.15 {
            Self::DeepOtm
        } else if d < 0.25 {
            Self::TargetBand
        } else if d < 0.5 {
            Self::NearMoney
        } else {
            Self::InTheMoney
        }
    }
}

#[derive(Debug, Clone)]
pub struct SlippageModel {
    config: SlippageModelConfig,
}

impl SlippageModel {
    pub fn new(config: SlippageModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SlippageModelConfig {
        &self.config
    }

    /// Fraction of mid lost to execution for a contract with these characteristics.
    pub fn estimate_cost(&self, delta: f64, days_to_expiration: i64, volatility_index: f64) -> f64 {
        self.config.base_spread_fraction
            * self.moneyness_multiplier(delta)
            * self.time_multiplier(days_to_expiration)
            * self.volatility_multiplier(volatility_index)
    }

    pub fn moneyness_multiplier(&self, delta: f64) -> f64 {
        match MoneynessBucket::from_delta(delta) {
            MoneynessBucket::DeepOtm => self.config.deep_otm_multiplier,
            MoneynessBucket::TargetBand => self.config.target_band_multiplier,
            MoneynessBucket::NearMoney => self.config.near_money_multiplier,
            MoneynessBucket::InTheMoney => self.config.itm_multiplier,
        }
    }

    pub fn time_multiplier(&self, days_to_expiration: i64) -> f64 {
        if days_to_expiration < self.config.near_expiry_dte {
            self.config.near_expiry_multiplier
        } else {
            1.0
        }
    }

    pub fn volatility_multiplier(&self, volatility_index: f64) -> f64 {
        if !volatility_index.is_finite() {
            return self.config.vix_multiplier_cap;
        }
        (volatility_index / self.config.vix_reference)
            .clamp(self.config.vix_multiplier_floor, self.config.vix_multiplier_cap)
    }
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::new(SlippageModelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> SlippageModel {
        SlippageModel::default()
    }

    #[test]
    fn target_band_baseline_is_four_percent() {
        let cost = model().estimate_cost(0.20, 35, 20.0);
        assert!((cost - 0.04).abs() < 1e-12);
    }

    #[test]
    fn moneyness_buckets() {
        let m = model();
        assert_eq!(m.moneyness_multiplier(0.10), 1.8);
        assert_eq!(m.moneyness_multiplier(0.15), 1.0);
        assert_eq!(m.moneyness_multiplier(-0.24), 1.0);
        assert_eq!(m.moneyness_multiplier(0.25), 0.75);
        assert_eq!(m.moneyness_multiplier(-0.49), 0.75);
        assert_eq!(m.moneyness_multiplier(0.5), 1.9);
        assert_eq!(m.moneyness_multiplier(0.95), 1.9);
    }

    #[test]
    fn near_expiry_widens() {
        let m = model();
        assert_eq!(m.time_multiplier(6), 1.2);
        assert_eq!(m.time_multiplier(7), 1.0);
        let cost = m.estimate_cost(0.20, 3, 20.0);
        assert!((cost - 0.048).abs() < 1e-12);
    }

    #[test]
    fn volatility_multiplier_is_clamped() {
        let m = model();
        assert_eq!(m.volatility_multiplier(10.0), 0.8);
        assert!((m.volatility_multiplier(24.0) - 1.2).abs() < 1e-12);
        assert_eq!(m.volatility_multiplier(80.0), 1.3);
        assert_eq!(m.volatility_multiplier(f64::NAN), 1.3);
    }

    #[test]
    fn combined_worst_case() {
        // deep OTM, 2 DTE, VIX 45: 0.04 * 1.8 * 1.2 * 1.3
        let cost = model().estimate_cost(0.05, 2, 45.0);
        assert!((cost - 0.04 * 1.8 * 1.2 * 1.3).abs() < 1e-12);
    }

    #[test]
    fn invalid_cap_rejected() {
        let cfg = SlippageModelConfig {
            vix_multiplier_cap: 0.5,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
