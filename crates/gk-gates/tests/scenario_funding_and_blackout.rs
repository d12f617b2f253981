//! S3 funding blackout and I11 funding-credit policy (spec §4.7 Gate 9,
//! §8). Both are properties of `gate9_funding` in isolation, so rather than
//! walking the full nineteen-gate chain (and having to reverse-engineer
//! every upstream gate's arithmetic to land on exact spec numbers), these
//! drive `gate9_funding` directly off a [`PipelineState`] seeded with the
//! exact upstream outputs the scenario specifies.

use std::sync::Arc;

use gk_correlation::{CorrelationPublisher, CorrelationSnapshot, PublishParams};
use gk_domain::{
    CorrelationContext, DataQualityInputs, DerivativesInfo, DrpState, EngineKind, EngineSignal, EquityState, LiquidityInfo, Levels, ManualHalts,
    MarketState, MlOpsState, OperationalState, PortfolioId, PortfolioState, PriceInfo, RegimeHint, RiskAggregates, SignalConstraints, SignalContext, TradingMode,
    VolatilityInfo,
};
use gk_gates::{gates::gate9_funding, EvaluationInput, GatekeeperConfig, ImpactCurve, MrcInput, PipelineState, RejectionReason, ReservationContext};
use gk_units::{Direction, EffectivePrices};
use nalgebra::DMatrix;

fn base_market() -> MarketState {
    MarketState {
        schema_version: 1,
        market_data_id: gk_domain::ids::MarketDataId::new(1),
        ts_utc_ms: 1_700_000_000_000,
        instrument: "BTCUSDT".into(),
        timeframe: "1h".into(),
        price: PriceInfo { last: 60_000.0, mid: 60_000.0, bid: 59_995.0, ask: 60_005.0, tick_size: 0.5 },
        volatility: VolatilityInfo { atr: 600.0, atr_z_short: 0.5, atr_z_long: 0.4, hv30: 0.55, hv30_z: 0.2 },
        liquidity: LiquidityInfo {
            spread_bps: 2.0,
            bid_depth_usd: 2_000_000.0,
            ask_depth_usd: 2_000_000.0,
            volume_24h_usd: 500_000_000.0,
            impact_bps_est: 3.0,
            depth_volatility_cv: 0.3,
            orderbook_staleness_ms: 100.0,
            orderbook_last_update_id_age_ms: 50.0,
        },
        derivatives: DerivativesInfo {
            funding_rate_current: 0.0008,
            funding_rate_forecast: 0.0008,
            funding_period_hours: 8.0,
            time_to_next_funding_sec: 600.0,
            open_interest_usd: 1_000_000_000.0,
            basis_value: 5.0,
            basis_z: 0.3,
            basis_vol_z: 0.2,
            adl_rank_quantile: Some(0.2),
        },
        correlation: CorrelationContext {
            tail_reliability_score: 0.9,
            tail_corr_to_btc: 0.2,
            stress_beta_to_btc: 0.5,
            lambda_used: 1.0,
            corr_matrix_snapshot_id: None,
            corr_matrix_age_sec: 10.0,
            gamma_s: 0.2,
        },
        data_quality: DataQualityInputs {
            suspected_data_glitch: false,
            stale_book_glitch: false,
            price_staleness_ms: 100.0,
            volatility_staleness_ms: 500.0,
            orderbook_staleness_ms: 100.0,
            orderbook_integrity_ok: true,
            derivatives_staleness_ms: 1000.0,
            completeness_frac: 0.99,
            cross_source_staleness_ms: Some(100.0),
            xdev_bps: 1.0,
            oracle_price: Some(60_000.0),
            oracle_dev_frac: Some(0.0002),
            oracle_staleness_ms: Some(200.0),
            toxic_flow_suspected: false,
            any_critical_field_non_finite: false,
        },
    }
}

fn base_portfolio() -> PortfolioState {
    PortfolioState {
        schema_version: 1,
        portfolio_id: PortfolioId::new(1),
        equity: EquityState { equity_usd: 100_000.0, peak_equity_usd: 100_000.0, drawdown_frac: 0.0, smoothed_drawdown_frac: 0.0 },
        risk: RiskAggregates {
            current_portfolio_risk_pct: 0.0,
            reserved_portfolio_risk_pct: 0.0,
            current_cluster_risk_pct: 0.0,
            reserved_cluster_risk_pct: 0.0,
            sum_abs_risk_pct: 0.0,
            reserved_heat_upper_bound_pct: 0.0,
            adjusted_heat_base_pct: 0.0,
            adjusted_heat_blend_pct: 0.0,
            adjusted_heat_worst_pct: 0.0,
            heat_uni_abs_pct: 0.0,
            max_portfolio_risk_cap_pct: 0.04,
            max_cluster_risk_cap_pct: 0.02,
            max_trade_risk_cap_pct: 0.005,
        },
        state: OperationalState {
            drp: DrpState::Normal,
            mlops: MlOpsState::Healthy,
            trading_mode: TradingMode::Live,
            warmup_bars_remaining: 0,
            drp_flap_count: 0,
            hibernate_until_ts_ms: None,
            manual_halts: ManualHalts::default(),
        },
        positions: vec![],
    }
}

fn base_signal(direction: Direction, holding_hours: f64) -> EngineSignal {
    EngineSignal {
        instrument: "BTCUSDT".into(),
        engine: EngineKind::Trend,
        direction,
        levels: Levels { entry_price: 60_000.0, stop_loss: 59_400.0, take_profit: 61_500.0 },
        context: SignalContext { expected_holding_hours: holding_hours, regime_hint: Some(RegimeHint::TrendUp), setup_id: "s1".into() },
        constraints: SignalConstraints { rr_min_engine: 1.5, sl_min_atr_mult: 0.5, sl_max_atr_mult: 3.0 },
    }
}

fn snapshot(id: u64) -> Arc<CorrelationSnapshot> {
    let instruments = vec!["BTCUSDT".to_string()];
    let raw = DMatrix::<f64>::identity(1, 1);
    Arc::new(CorrelationPublisher::publish(gk_domain::SnapshotId::new(id), 1_700_000_000_000, instruments, &raw, &PublishParams::default()))
}

fn base_input(direction: Direction, holding_hours: f64) -> EvaluationInput {
    EvaluationInput {
        mrc_regime: MrcInput { regime: RegimeHint::TrendUp, confidence: 0.9 },
        baseline_regime: RegimeHint::TrendUp,
        engine_signal: base_signal(direction, holding_hours),
        mle_output: None,
        required_feature_schema_version: 3,
        market_state: base_market(),
        portfolio_state: base_portfolio(),
        drp_state: DrpState::Normal,
        now_ms: 1_700_000_000_000,
        candidate_risk_index: 0,
        c_psd: snapshot(1),
        c_blend: snapshot(2),
        c_stress_portfolio: DMatrix::<f64>::identity(1, 1),
        reservation: ReservationContext::default(),
        impact_curve: ImpactCurve { a: 1e-7, b: 1.0 },
        price_prev: 59_990.0,
        recent_prices: vec![],
        estimated_liquidation_price: Some(50_000.0),
    }
}

fn seeded_state(ev_r_price: f64, unit_risk_allin_net: f64) -> PipelineState {
    let mut st = PipelineState::default();
    st.effective_prices = Some(EffectivePrices {
        entry_eff_allin: 60_000.0,
        tp_eff_allin: 61_500.0,
        sl_eff_allin: 59_400.0,
        unit_risk_allin_net,
        unit_risk_bps: unit_risk_allin_net / 600.0 * 100.0,
    });
    st.ev_r_price = ev_r_price;
    st.expected_cost_r_postmle = 0.0;
    st
}

/// S3: MLE NORMAL with `EV_R_price=0.1`; funding due in 10 minutes (inside
/// the 15-minute blackout window), holding 2h (within the 4h cap);
/// `unit_risk_allin_net` chosen so `funding_cost_R` lands at exactly 0.06,
/// giving `funding_cost_R / EV_R_price = 0.6 >= 0.40` — the spec's own
/// worked example.
#[test]
fn funding_blackout_blocks_long_position() {
    let input = base_input(Direction::Long, 2.0);
    let mut st = seeded_state(0.1, 801.8);
    let cfg = GatekeeperConfig::default();

    let outcome = gate9_funding(&input, &cfg, &mut st);
    assert_eq!(outcome, Some(RejectionReason::FundingBlackoutBlock));
    assert!((st.funding_cost_r - 0.06).abs() < 0.01, "funding_cost_r={}", st.funding_cost_r);
}

/// Outside the blackout window (funding due in 2h instead of 10 minutes),
/// the same cost share is not blocked by S3's rule, even though the raw
/// funding cost itself is unchanged.
#[test]
fn same_cost_share_is_not_a_blackout_once_funding_is_far_away() {
    let mut input = base_input(Direction::Long, 2.0);
    input.market_state.derivatives.time_to_next_funding_sec = 7_200.0;
    let mut st = seeded_state(0.1, 801.8);
    let cfg = GatekeeperConfig::default();

    let outcome = gate9_funding(&input, &cfg, &mut st);
    assert_ne!(outcome, Some(RejectionReason::FundingBlackoutBlock));
}

/// I11: with `funding_credit_allowed = false` (the documented default), a
/// short position collecting strongly positive funding must not clear
/// `min_net_yield_r` on the strength of that funding bonus alone; the same
/// bonus, once explicitly allowed, does clear it.
#[test]
fn positive_funding_alone_cannot_clear_net_yield_floor_when_credit_disallowed() {
    let mut input = base_input(Direction::Short, 2.0);
    input.market_state.derivatives.funding_rate_current = 0.01;
    input.market_state.derivatives.time_to_next_funding_sec = 3_600.0;
    // Unit risk of 600 against a 60,000 entry and ~1 funding event at 1%
    // yields funding_r = 0.01 * 60_000 / 600 = 1.0 R of pure bonus.
    let mut st = seeded_state(0.05, 600.0);
    let mut cfg = GatekeeperConfig::default();
    assert!(!cfg.gate9.funding_credit_allowed, "test assumes the documented default");
    cfg.gate9.min_net_yield_r = 0.5;

    let disallowed = gate9_funding(&input, &cfg, &mut st);
    assert_eq!(disallowed, Some(RejectionReason::FundingNetYieldBlock));
    assert_eq!(st.funding_bonus_r_used, 0.0);

    let mut st_allowed = seeded_state(0.05, 600.0);
    cfg.gate9.funding_credit_allowed = true;
    let allowed = gate9_funding(&input, &cfg, &mut st_allowed);
    assert_eq!(allowed, None);
    assert!(st_allowed.funding_bonus_r_used > 0.5, "expected a large credited bonus, got {}", st_allowed.funding_bonus_r_used);
}
