//! Execution-realism models: slippage cost, fill probability and gap risk.

pub mod fill_probability;
pub mod gap_risk;
pub mod slippage;

pub use fill_probability::{
    FillAssessment, FillContext, FillModelConfig, FillProbabilityModel, FillRule, TimeBucket,
};
pub use gap_risk::{GapClass, GapModelConfig, GapRiskModel};
pub use slippage::{MoneynessBucket, SlippageModel, SlippageModelConfig};
