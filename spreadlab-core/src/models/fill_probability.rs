//! Fill probability model: does an order fill at all?
//!
//! Rules are evaluated in order and the first matching rule wins:
//! 1. Open interest below the floor → probability 0.
//! 2. Spread above `max_spread_threshold` → 0.3.
//! 3. Spread above `wide_spread_threshold` → 0.7.
//! 4. Otherwise 1.0, scaled by order size vs. average daily volume, the
//!    illiquid-hour penalty and the single most severe VIX penalty. Penalties
//!    multiply. Closing orders then get a bonus, capped at 1.0.
//!
//! A fill occurs iff `random_draw < probability`.

use serde::{Deserialize, Serialize};

use crate::config::{ensure_fraction, ensure_non_negative, ConfigError};
use crate::domain::{Leg, PositionLeg, RejectionReason};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillModelConfig {
    /// When false every order fills (the naive-backtest baseline).
    pub enable_fill_probability: bool,
    pub min_oi_threshold: u64,
    pub max_spread_threshold: f64,
    pub max_spread_fill_probability: f64,
    pub wide_spread_threshold: f64,
    pub wide_spread_fill_probability: f64,
    pub large_order_adv_fraction: f64,
    pub large_order_multiplier: f64,
    pub medium_order_adv_fraction: f64,
    pub medium_order_multiplier: f64,
    pub illiquid_hour_multiplier: f64,
    pub high_vix_level: f64,
    pub high_vix_multiplier: f64,
    pub elevated_vix_level: f64,
    pub elevated_vix_multiplier: f64,
    pub closing_order_bonus: f64,
}

impl Default for FillModelConfig {
    fn default() -> Self {
        Self {
            enable_fill_probability: true,
            min_oi_threshold: 50,
            max_spread_threshold: 0.10,
            max_spread_fill_probability: 0.3,
            wide_spread_threshold: 0.05,
            wide_spread_fill_probability: 0.7,
            large_order_adv_fraction: 0.20,
            large_order_multiplier: 0.5,
            medium_order_adv_fraction: 0.10,
            medium_order_multiplier: 0.75,
            illiquid_hour_multiplier: 0.85,
            high_vix_level: 40.0,
            high_vix_multiplier: 0.8,
            elevated_vix_level: 30.0,
            elevated_vix_multiplier: 0.9,
            closing_order_bonus: 0.10,
        }
    }
}

impl FillModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("fill.max_spread_threshold", self.max_spread_threshold)?;
        ensure_fraction("fill.max_spread_fill_probability", self.max_spread_fill_probability)?;
        ensure_non_negative("fill.wide_spread_threshold", self.wide_spread_threshold)?;
        ensure_fraction("fill.wide_spread_fill_probability", self.wide_spread_fill_probability)?;
        ensure_non_negative("fill.large_order_adv_fraction", self.large_order_adv_fraction)?;
        ensure_fraction("fill.large_order_multiplier", self.large_order_multiplier)?;
        ensure_non_negative("fill.medium_order_adv_fraction", self.medium_order_adv_fraction)?;
        ensure_fraction("fill.medium_order_multiplier", self.medium_order_multiplier)?;
        ensure_fraction("fill.illiquid_hour_multiplier", self.illiquid_hour_multiplier)?;
        ensure_non_negative("fill.high_vix_level", self.high_vix_level)?;
        ensure_fraction("fill.high_vix_multiplier", self.high_vix_multiplier)?;
        ensure_non_negative("fill.elevated_vix_level", self.elevated_vix_level)?;
        ensure_fraction("fill.elevated_vix_multiplier", self.elevated_vix_multiplier)?;
        ensure_fraction("fill.closing_order_bonus", self.closing_order_bonus)?;
        if self.wide_spread_threshold > self.max_spread_threshold {
            return Err(ConfigError::Invalid {
                field: "fill.wide_spread_threshold",
                reason: format!(
                    "{} exceeds max_spread_threshold {}",
                    self.wide_spread_threshold, self.max_spread_threshold
                ),
            });
        }
        if self.elevated_vix_level > self.high_vix_level {
            return Err(ConfigError::Invalid {
                field: "fill.elevated_vix_level",
                reason: format!(
                    "{} exceeds high_vix_level {}",
                    self.elevated_vix_level, self.high_vix_level
                ),
            });
        }
        Ok(())
    }
}

/// Time-of-day liquidity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    /// First minutes after the open.
    Opening,
    Midday,
    /// Last minutes before (and at) the close.
    Closing,
    /// Outside the regular session.
    Closed,
}

impl TimeBucket {
    pub fn is_illiquid(self) -> bool {
        !matches!(self, Self::Midday)
    }
}

/// Ephemeral per-leg snapshot used for one fill evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillContext {
    pub open_interest: u64,
    pub spread_pct: f64,
    /// Order size as a fraction of average daily volume, when volume is known.
    pub size_to_adv: Option<f64>,
    pub time_bucket: TimeBucket,
    pub volatility_index: f64,
    pub is_closing: bool,
}

impl FillContext {
    pub fn for_leg(leg: &Leg, time_bucket: TimeBucket, volatility_index: f64, is_closing: bool) -> Self {
        Self {
            open_interest: leg.open_interest,
            spread_pct: leg.spread_pct(),
            size_to_adv: size_to_adv(leg.quantity, leg.avg_daily_volume),
            time_bucket,
            volatility_index,
            is_closing,
        }
    }

    pub fn for_position_leg(
        leg: &PositionLeg,
        time_bucket: TimeBucket,
        volatility_index: f64,
    ) -> Self {
        Self {
            open_interest: leg.open_interest,
            spread_pct: leg.spread_pct(),
            size_to_adv: size_to_adv(leg.quantity, leg.avg_daily_volume),
            time_bucket,
            volatility_index,
            is_closing: true,
        }
    }
}

fn size_to_adv(quantity: u32, avg_daily_volume: Option<f64>) -> Option<f64> {
    match avg_daily_volume {
        Some(adv) if adv > 0.0 => Some(quantity as f64 / adv),
        Some(_) => Some(f64::INFINITY),
        None => None,
    }
}

/// Which rule decided the probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    InsufficientOpenInterest,
    VeryWideSpread,
    WideSpread,
    Scaled,
    Disabled,
}

impl FillRule {
    /// Rejection reason recorded when the draw fails under this rule.
    pub fn rejection_reason(self) -> RejectionReason {
        match self {
            Self::InsufficientOpenInterest => RejectionReason::Liquidity,
            Self::VeryWideSpread | Self::WideSpread => RejectionReason::Spread,
            Self::Scaled | Self::Disabled => RejectionReason::FillProbability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillAssessment {
    pub probability: f64,
    pub rule: FillRule,
}

#[derive(Debug, Clone)]
pub struct FillProbabilityModel {
    config: FillModelConfig,
}

impl FillProbabilityModel {
    pub fn new(config: FillModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FillModelConfig {
        &self.config
    }

    pub fn assess(&self, ctx: &FillContext) -> FillAssessment {
        let c = &self.config;
        if !c.enable_fill_probability {
            return FillAssessment {
                probability: 1.0,
                rule: FillRule::Disabled,
            };
        }
        if ctx.open_interest < c.min_oi_threshold {
            return FillAssessment {
                probability: 0.0,
                rule: FillRule::InsufficientOpenInterest,
            };
        }
        if ctx.spread_pct.is_nan() || ctx.spread_pct > c.max_spread_threshold {
            return FillAssessment {
                probability: c.max_spread_fill_probability,
                rule: FillRule::VeryWideSpread,
            };
        }
        if ctx.spread_pct > c.wide_spread_threshold {
            return FillAssessment {
                probability: c.wide_spread_fill_probability,
                rule: FillRule::WideSpread,
            };
        }

        let mut p = 1.0;
        match ctx.size_to_adv {
            Some(ratio) if ratio > c.large_order_adv_fraction => p *= c.large_order_multiplier,
            Some(ratio) if ratio > c.medium_order_adv_fraction => p *= c.medium_order_multiplier,
            _ => {}
        }
        if ctx.time_bucket.is_illiquid() {
            p *= c.illiquid_hour_multiplier;
        }
        if ctx.volatility_index > c.high_vix_level {
            p *= c.high_vix_multiplier;
        } else if ctx.volatility_index > c.elevated_vix_level {
            p *= c.elevated_vix_multiplier;
        }
        if ctx.is_closing {
            p += c.closing_order_bonus;
        }
        FillAssessment {
            probability: p.min(1.0),
            rule: FillRule::Scaled,
        }
    }

    pub fn probability(&self, ctx: &FillContext) -> f64 {
        self.assess(ctx).probability
    }

    /// Stochastic fill decision with an externally supplied uniform draw.
    pub fn will_fill(&self, ctx: &FillContext, random_draw: f64) -> bool {
        random_draw < self.probability(ctx)
    }
}

impl Default for FillProbabilityModel {
    fn default() -> Self {
        Self::new(FillModelConfig::default())
    }
}
