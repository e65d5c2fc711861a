//! Property tests for the execution-realism models.
//!
//! Uses proptest to verify:
//! 1. Slippage is deterministic and never negative
//! 2. Slippage never decreases with VIX or as expiry gets near
//! 3. Open interest below the floor never fills, whatever the draw
//! 4. Fill probability stays in [0, 1]; closing orders never fill less often
//! 5. Multi-leg entries are all-or-nothing

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use spreadlab_core::domain::{
    IdGen, Leg, OptionContract, OptionRight, PortfolioState, Side, Signal, SignalId, SignalKind,
};
use spreadlab_core::execution::{EntryOutcome, ExecutionCoordinator, ExecutionMode, MarketContext};
use spreadlab_core::models::{FillContext, FillProbabilityModel, SlippageModel, TimeBucket};
use spreadlab_core::rng::FixedSource;
use spreadlab_core::SimulationConfig;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_delta() -> impl Strategy<Value = f64> {
    -1.0..1.0_f64
}

fn arb_dte() -> impl Strategy<Value = i64> {
    0..120_i64
}

fn arb_vix() -> impl Strategy<Value = f64> {
    5.0..90.0_f64
}

fn arb_bucket() -> impl Strategy<Value = TimeBucket> {
    prop_oneof![
        Just(TimeBucket::Opening),
        Just(TimeBucket::Midday),
        Just(TimeBucket::Closing),
        Just(TimeBucket::Closed),
    ]
}

fn arb_context() -> impl Strategy<Value = FillContext> {
    (
        0..5_000_u64,
        0.0..0.3_f64,
        proptest::option::of(0.0..1.0_f64),
        arb_bucket(),
        arb_vix(),
        any::<bool>(),
    )
        .prop_map(
            |(open_interest, spread_pct, size_to_adv, time_bucket, volatility_index, is_closing)| FillContext {
                open_interest,
                spread_pct,
                size_to_adv,
                time_bucket,
                volatility_index,
                is_closing,
            },
        )
}

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn leg(strike: f64, side: Side, mid: f64, spread_pct: f64, open_interest: u64) -> Leg {
    Leg {
        contract: OptionContract::new(
            "SPY",
            NaiveDate::from_ymd_opt(2024, 4, 19).unwrap(),
            strike,
            OptionRight::Put,
        ),
        side,
        quantity: 1,
        bid: mid * (1.0 - spread_pct / 2.0),
        ask: mid * (1.0 + spread_pct / 2.0),
        open_interest,
        avg_daily_volume: None,
        implied_volatility: 0.2,
        delta: -0.2,
    }
}

// ── 1-2. Slippage ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn slippage_is_deterministic(delta in arb_delta(), dte in arb_dte(), vix in arb_vix()) {
        let model = SlippageModel::new(Default::default());
        let a = model.estimate_cost(delta, dte, vix);
        let b = model.estimate_cost(delta, dte, vix);
        prop_assert_eq!(a.to_bits(), b.to_bits());
        prop_assert!(a >= 0.0);
    }

    #[test]
    fn slippage_never_falls_as_vix_rises(
        delta in arb_delta(),
        dte in arb_dte(),
        vix in arb_vix(),
        bump in 0.0..40.0_f64,
    ) {
        let model = SlippageModel::new(Default::default());
        prop_assert!(model.estimate_cost(delta, dte, vix + bump) >= model.estimate_cost(delta, dte, vix));
    }

    #[test]
    fn near_expiry_never_cheaper(delta in arb_delta(), vix in arb_vix(), dte in 7..120_i64, near in 0..7_i64) {
        let model = SlippageModel::new(Default::default());
        prop_assert!(model.estimate_cost(delta, near, vix) >= model.estimate_cost(delta, dte, vix));
    }

    #[test]
    fn slippage_is_symmetric_in_delta_sign(delta in arb_delta(), dte in arb_dte(), vix in arb_vix()) {
        let model = SlippageModel::new(Default::default());
        prop_assert_eq!(model.estimate_cost(delta, dte, vix), model.estimate_cost(-delta, dte, vix));
    }
}

// ── 3-4. Fill probability ────────────────────────────────────────────

proptest! {
    #[test]
    fn below_oi_floor_never_fills(ctx in arb_context(), draw in 0.0..1.0_f64) {
        let model = FillProbabilityModel::default();
        let ctx = FillContext { open_interest: ctx.open_interest % 50, ..ctx };
        prop_assert!(!model.will_fill(&ctx, draw));
    }

    #[test]
    fn probability_is_a_probability(ctx in arb_context()) {
        let p = FillProbabilityModel::default().probability(&ctx);
        prop_assert!((0.0..=1.0).contains(&p), "probability {} out of range", p);
    }

    #[test]
    fn closing_orders_fill_at_least_as_often(ctx in arb_context()) {
        let model = FillProbabilityModel::default();
        let opening = FillContext { is_closing: false, ..ctx };
        let closing = FillContext { is_closing: true, ..ctx };
        prop_assert!(model.probability(&closing) >= model.probability(&opening));
    }

    #[test]
    fn fill_iff_draw_below_probability(ctx in arb_context(), draw in 0.0..1.0_f64) {
        let model = FillProbabilityModel::default();
        prop_assert_eq!(model.will_fill(&ctx, draw), draw < model.probability(&ctx));
    }
}

// ── 5. All-or-nothing multi-leg entries ──────────────────────────────

proptest! {
    #[test]
    fn entries_are_all_or_nothing(
        short_spread in 0.0..0.15_f64,
        long_spread in 0.0..0.15_f64,
        long_oi in 0..200_u64,
        draws in proptest::collection::vec(0.0..1.0_f64, 2),
    ) {
        let config = SimulationConfig::default();
        let mut coordinator = ExecutionCoordinator::new(&config, ExecutionMode::Backtest);
        let signal = Signal {
            id: SignalId(1),
            symbol: "SPY".into(),
            strategy: "prop".into(),
            kind: SignalKind::CreditPutSpread,
            legs: vec![
                leg(400.0, Side::Sell, 3.0, short_spread, 1000),
                leg(395.0, Side::Buy, 1.5, long_spread, long_oi),
            ],
            target_premium: 0.5,
            generated_at: noon(),
        };
        let portfolio = PortfolioState::flat(100_000.0);
        let market = MarketContext {
            timestamp: noon(),
            volatility_index: 20.0,
            underlying_price: 410.0,
        };
        let mut rng = FixedSource::new(draws);
        let mut ids = IdGen::default();

        match coordinator.execute_entry(signal, &portfolio, &market, &mut rng, &mut ids) {
            EntryOutcome::Executed(position) => {
                prop_assert_eq!(position.legs.len(), 2);
                prop_assert!(long_oi >= config.fill.min_oi_threshold);
            }
            EntryOutcome::Rejected(record) => {
                prop_assert!(record.leg.is_some());
                prop_assert!(!record.is_closing);
            }
        }
        // every leg drew once, pass or fail
        prop_assert_eq!(rng.consumed(), 2);
    }
}
