//! The fixed-order admission chain (spec §4.7, C8). Each function is a pure
//! check over the snapshot plus whatever earlier gates wrote into
//! [`PipelineState`]; a `Some(reason)` return short-circuits the chain.

use gk_domain::{DrpState, MleDecision, RegimeHint};
use gk_numerics::{clip, denom_safe_unsigned, is_close, ToleranceContext};
use gk_units::{compute_effective_prices, CostBps, Direction};
use nalgebra::DVector;

use crate::config::GatekeeperConfig;
use crate::input::EvaluationInput;
use crate::result::RejectionReason;
use crate::state::PipelineState;

type GateOutcome = Option<RejectionReason>;

/// Execution-cost model shared by every gate that needs all-in effective
/// prices. Only `spread_bps` varies per call; the rest are fixed engineering
/// defaults until a venue-specific cost model is wired in.
fn default_cost_model(spread_bps: f64) -> CostBps {
    CostBps {
        spread_bps,
        slippage_entry_bps: 2.0,
        slippage_tp_bps: 2.0,
        slippage_stop_bps: 2.0,
        impact_entry_bps: 1.0,
        impact_exit_bps: 1.0,
        impact_stop_bps: 1.0,
        fee_entry_bps: 2.0,
        fee_exit_bps: 2.0,
        stop_slippage_mult: 2.0,
    }
}

pub fn gate0_dqs_drp(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let dqs = gk_dqs::evaluate(&input.market_state.data_quality, &cfg.dqs);
    st.dqs_mult = dqs.dqs_mult;
    st.note("dqs", dqs.dqs);
    st.note("dqs_mult", dqs.dqs_mult);

    if let Some(hard_gate) = dqs.hard_gate {
        st.note("dqs_hard_gate_reason", hard_gate.code());
        return Some(match hard_gate {
            gk_dqs::HardGateReason::OracleSanityBlock => RejectionReason::OracleSanityBlock,
            gk_dqs::HardGateReason::StaleBookFreshPrice => RejectionReason::StaleBookGlitchBlock,
            _ => RejectionReason::DqsHardGateBlock,
        });
    }

    if input.drp_state.blocks_new_entries() {
        st.note("drp_state", format!("{:?}", input.drp_state));
        return Some(RejectionReason::DqsHardGateBlock);
    }
    None
}

pub fn gate1_halts_mode(input: &EvaluationInput) -> GateOutcome {
    let halts = &input.portfolio_state.state.manual_halts;
    if halts.manual_halt_all_trading || halts.manual_halt_new_entries {
        return Some(RejectionReason::ManualHaltBlock);
    }
    use gk_domain::TradingMode;
    match input.portfolio_state.state.trading_mode {
        TradingMode::Live | TradingMode::Shadow => None,
        TradingMode::Paused | TradingMode::Maintenance => Some(RejectionReason::TradingModeBlock),
    }
}

fn is_shadow(input: &EvaluationInput) -> bool {
    matches!(input.portfolio_state.state.trading_mode, gk_domain::TradingMode::Shadow)
}

/// Gate 2 regime resolution per the decision table in spec §4.8.
pub fn gate2_regime_resolution(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let mrc = input.mrc_regime.regime;
    let baseline = input.baseline_regime;

    // MRC=NOISE resolves to NOISE here; Gate 3 is where the RANGE-engine
    // + STRONG-MLE exception actually admits it.
    let final_regime = if mrc == RegimeHint::Noise {
        RegimeHint::Noise
    } else if baseline == RegimeHint::Noise && matches!(mrc, RegimeHint::TrendUp | RegimeHint::TrendDown | RegimeHint::BreakoutUp | RegimeHint::BreakoutDown) && input.mrc_regime.confidence >= cfg.gate2.mrc_very_high_conf_threshold {
        st.combined_risk_mult = cfg.gate2.noise_override_risk_mult;
        mrc
    } else if mrc == RegimeHint::Range && matches!(baseline, RegimeHint::TrendUp | RegimeHint::TrendDown) {
        RegimeHint::Range
    } else if matches!(mrc, RegimeHint::TrendUp | RegimeHint::TrendDown) && baseline == RegimeHint::Range {
        if mrc == RegimeHint::TrendUp {
            RegimeHint::BreakoutUp
        } else {
            RegimeHint::BreakoutDown
        }
    } else if matches!(mrc, RegimeHint::BreakoutUp | RegimeHint::BreakoutDown) && baseline == RegimeHint::Range {
        mrc
    } else if matches!(mrc, RegimeHint::BreakoutUp | RegimeHint::BreakoutDown) && matches!(baseline, RegimeHint::TrendUp | RegimeHint::TrendDown) {
        let signs_match = (mrc == RegimeHint::BreakoutUp && baseline == RegimeHint::TrendUp) || (mrc == RegimeHint::BreakoutDown && baseline == RegimeHint::TrendDown);
        if signs_match {
            mrc
        } else {
            return Some(RejectionReason::MrcConflictBlock);
        }
    } else if (mrc == RegimeHint::TrendUp && baseline == RegimeHint::TrendDown) || (mrc == RegimeHint::TrendDown && baseline == RegimeHint::TrendUp) {
        let depth_ok = input.market_state.liquidity.bid_depth_usd >= cfg.gate2.probe_min_depth_usd && input.market_state.liquidity.ask_depth_usd >= cfg.gate2.probe_min_depth_usd;
        let spread_ok = input.market_state.liquidity.spread_bps <= cfg.gate2.probe_max_spread_bps;
        let mle_ok = input.mle_output.as_ref().map(|m| matches!(m.decision, MleDecision::Normal | MleDecision::Strong)).unwrap_or(false);
        let dqs_ok = st.dqs_mult > 0.0;
        if input.mrc_regime.confidence >= cfg.gate2.mrc_very_high_conf_threshold && dqs_ok && depth_ok && spread_ok && mle_ok {
            st.probe_trade = true;
            mrc
        } else {
            return Some(RejectionReason::MrcConflictBlock);
        }
    } else {
        mrc
    };

    st.final_regime = Some(final_regime);
    st.note("final_regime", format!("{:?}", final_regime));
    None
}

pub fn gate3_regime_compatibility(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &PipelineState) -> GateOutcome {
    let final_regime = st.final_regime.unwrap_or(RegimeHint::Noise);
    let compatible = match input.engine_signal.engine {
        gk_domain::EngineKind::Trend => matches!(final_regime, RegimeHint::TrendUp | RegimeHint::TrendDown | RegimeHint::BreakoutUp | RegimeHint::BreakoutDown),
        gk_domain::EngineKind::Range => {
            final_regime == RegimeHint::Range
                || (final_regime == RegimeHint::Noise
                    && input.mle_output.as_ref().map(|m| m.decision == MleDecision::Strong).unwrap_or(false)
                    && input.market_state.volatility.atr_z_short < cfg.gate2.noise_range_atr_z_cap)
        }
    };
    if compatible {
        None
    } else {
        Some(RejectionReason::RegimeIncompatibleBlock)
    }
}

pub fn gate4_signal_sanity(input: &EvaluationInput, cfg: &GatekeeperConfig) -> GateOutcome {
    if input.engine_signal.validate_levels().is_err() {
        return Some(RejectionReason::SignalSanityBlock);
    }
    let levels = &input.engine_signal.levels;
    let atr = input.market_state.volatility.atr;
    let sl_dist = (levels.entry_price - levels.stop_loss).abs();
    if sl_dist < cfg.gate4.sl_min_atr_mult * atr || sl_dist > cfg.gate4.sl_max_atr_mult * atr {
        return Some(RejectionReason::SignalSanityBlock);
    }
    let holding = input.engine_signal.context.expected_holding_hours;
    if !(cfg.gate4.holding_hours_min..=cfg.gate4.holding_hours_max).contains(&holding) {
        return Some(RejectionReason::SignalSanityBlock);
    }
    let raw_reward = (levels.take_profit - levels.entry_price).abs();
    let raw_risk = denom_safe_unsigned(sl_dist, 1e-9);
    let raw_rr = raw_reward / raw_risk;
    if raw_rr < input.engine_signal.constraints.rr_min_engine {
        return Some(RejectionReason::SignalSanityBlock);
    }
    None
}

pub fn gate5_presizing_invariants(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let signal = &input.engine_signal;
    let costs = default_cost_model(input.market_state.liquidity.spread_bps);
    let eff = compute_effective_prices(signal.direction, signal.levels.entry_price, signal.levels.take_profit, signal.levels.stop_loss, &costs, cfg.gate5.unit_risk_eps);

    let atr = input.market_state.volatility.atr;
    if eff.unit_risk_allin_net < cfg.gate5.unit_risk_min_abs {
        st.effective_prices = Some(eff);
        return Some(RejectionReason::UnitRiskTooSmallBlock);
    }
    if eff.unit_risk_allin_net < cfg.gate5.unit_risk_min_atr_mult * atr {
        st.effective_prices = Some(eff);
        return Some(RejectionReason::UnitRiskBelowMinAtrBlock);
    }

    let entry_cost_bps = costs.entry_cost_bps();
    let sl_exit_cost_bps = costs.sl_exit_cost_bps();
    st.expected_cost_r_premle = (entry_cost_bps + sl_exit_cost_bps) / denom_safe_unsigned(eff.unit_risk_bps, 1e-9);
    st.effective_prices = Some(eff);
    None
}

pub fn gate6_mle_decision(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let eff = st.effective_prices.expect("gate5 runs before gate6");
    let mle = match &input.mle_output {
        Some(m) => m,
        None => return Some(RejectionReason::MleReject),
    };
    if mle.feature_schema_version != input.required_feature_schema_version {
        return Some(RejectionReason::FeatureSchemaIncompatibleBlock);
    }
    if mle.validate().is_err() {
        return Some(RejectionReason::MleReject);
    }

    let mu_success_r = (eff.tp_eff_allin - eff.entry_eff_allin).abs() / denom_safe_unsigned(eff.unit_risk_allin_net, 1e-9);
    let mu_fail_r = -1.0_f64;
    let lambda_used = input.market_state.correlation.lambda_used.max(1e-9);
    let beta = clip(cfg.gate6.beta_base * 1.0 / lambda_used, cfg.gate6.beta_min, cfg.gate6.beta_max);
    let cvar_fail_r = mu_fail_r * (1.0 + beta * 0.1);
    let ev_r_price = mle.p_success * mu_success_r + mle.p_neutral * 0.0 + mle.p_fail * mu_fail_r.min(cvar_fail_r);
    st.ev_r_price = ev_r_price;

    // expected_cost_R_postMLE reweights the exit leg by p_success/p_fail
    // instead of gate 5's fixed "always pay the SL leg" assumption.
    let costs = default_cost_model(input.market_state.liquidity.spread_bps);
    let weighted_exit_cost_bps = mle.p_success * costs.tp_exit_cost_bps() + mle.p_fail * costs.sl_exit_cost_bps();
    let expected_cost_r_postmle = (costs.entry_cost_bps() + weighted_exit_cost_bps) / denom_safe_unsigned(eff.unit_risk_bps, 1e-9);
    st.expected_cost_r_postmle = expected_cost_r_postmle;

    if ev_r_price <= 0.0 {
        return Some(RejectionReason::MleReject);
    }
    if mle.p_neutral >= cfg.gate6.p_neutral_cutoff && ev_r_price.abs() < cfg.gate6.ev_near_zero_band {
        return Some(RejectionReason::MleReject);
    }

    st.risk_mult_mle = if ev_r_price < cfg.gate6.ev_weak_upper {
        cfg.gate6.risk_mult_weak
    } else if ev_r_price < cfg.gate6.ev_normal_upper {
        cfg.gate6.risk_mult_normal
    } else {
        cfg.gate6.risk_mult_strong
    };

    let funding_cost_r_placeholder = 0.0; // funding resolved at Gate 9; net-edge floor re-checked there
    if ev_r_price - expected_cost_r_postmle - funding_cost_r_placeholder < cfg.gate6.net_edge_floor_r {
        return Some(RejectionReason::NetEdgeBelowFloor);
    }

    if is_shadow(input) {
        return Some(RejectionReason::ShadowModeNoTrade);
    }
    None
}

pub fn gate7_liquidity(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let liq = &input.market_state.liquidity;
    if liq.bid_depth_usd < cfg.gate7.bid_depth_min_usd || liq.ask_depth_usd < cfg.gate7.ask_depth_min_usd {
        return Some(RejectionReason::LiquidityHardBlock);
    }
    if liq.spread_bps > cfg.gate7.spread_max_hard_bps {
        return Some(RejectionReason::LiquidityHardBlock);
    }
    if liq.volume_24h_usd < cfg.gate7.volume_24h_min_usd {
        return Some(RejectionReason::LiquidityHardBlock);
    }
    if liq.depth_volatility_cv > cfg.gate7.depth_volatility_cv_threshold {
        return Some(RejectionReason::SpoofingSuspectedBlock);
    }

    let spread_mult = clip((cfg.gate7.spread_max_hard_bps - liq.spread_bps) / (cfg.gate7.spread_max_hard_bps - cfg.gate7.spread_soft_bps).max(1e-9), 0.0, 1.0);
    let impact_mult = clip((cfg.gate7.impact_hard_bps - liq.impact_bps_est) / (cfg.gate7.impact_hard_bps - cfg.gate7.impact_soft_bps).max(1e-9), 0.0, 1.0);
    st.liquidity_mult = spread_mult.min(impact_mult);
    st.impact_bps_est = liq.impact_bps_est;
    st.obi = (liq.bid_depth_usd - liq.ask_depth_usd) / denom_safe_unsigned(liq.bid_depth_usd + liq.ask_depth_usd, 1.0);
    st.note("liquidity_mult", st.liquidity_mult);
    None
}

pub fn gate8_gap_glitch(input: &EvaluationInput, cfg: &GatekeeperConfig) -> GateOutcome {
    let price_now = input.market_state.price.last;
    let prev = input.price_prev;
    if prev > 0.0 {
        let jump = (price_now - prev).abs() / prev;
        if jump > cfg.gate8.price_jump_hard_frac {
            return Some(RejectionReason::GapGlitchBlock);
        }
    }
    if input.recent_prices.len() >= 5 {
        let n = input.recent_prices.len() as f64;
        let mean = input.recent_prices.iter().sum::<f64>() / n;
        let var = input.recent_prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        let sd = var.sqrt().max(1e-9);
        let z = (price_now - mean).abs() / sd;
        if z > cfg.gate8.spike_z_threshold {
            return Some(RejectionReason::GapGlitchBlock);
        }
    }
    let stale_book_fresh_price = input.market_state.liquidity.orderbook_staleness_ms > cfg.gate8.stale_book_age_ms && input.market_state.data_quality.price_staleness_ms < cfg.gate8.stale_book_age_ms / 2.0;
    if stale_book_fresh_price {
        return Some(RejectionReason::GapGlitchBlock);
    }
    None
}

/// `n_events_raw` is a step function of `holding_h` that jumps by one at
/// every funding boundary; EMA-smooth it against its own unfloored
/// continuation so the jump is spread over `funding_count_smoothing_width_sec`
/// worth of the funding period rather than landing as a discontinuity right
/// at the boundary.
fn smoothed_funding_event_count(holding_h: f64, t_next_h: f64, period_h: f64, smoothing_width_sec: f64) -> f64 {
    if holding_h < t_next_h {
        return 0.0;
    }
    let n_events_raw = 1.0 + ((holding_h - t_next_h) / period_h).floor();
    let n_events_continuous = 1.0 + (holding_h - t_next_h) / period_h;
    let period_sec = period_h * 3600.0;
    let alpha = clip(smoothing_width_sec / period_sec.max(1.0), 0.0, 1.0);
    (1.0 - alpha) * n_events_raw + alpha * n_events_continuous
}

pub fn gate9_funding(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let deriv = &input.market_state.derivatives;
    let signal = &input.engine_signal;
    let eff = st.effective_prices.expect("gate5 runs before gate9");

    let holding_h = signal.context.expected_holding_hours;
    let t_next_h = deriv.time_to_next_funding_sec / 3600.0;
    let period_h = deriv.funding_period_hours.max(1e-6);
    let n_events_smoothed = smoothed_funding_event_count(holding_h, t_next_h, period_h, cfg.gate9.funding_count_smoothing_width_sec);

    let funding_pnl_frac = -signal.direction.sign() * deriv.funding_rate_current * n_events_smoothed;
    let entry_ref = signal.levels.entry_price;
    let funding_r = funding_pnl_frac * entry_ref / denom_safe_unsigned(eff.unit_risk_allin_net, cfg.gate9.unit_risk_min_for_funding);
    let funding_cost_r = (-funding_r).max(0.0);
    let funding_bonus_r = funding_r.max(0.0);
    let funding_bonus_r_used = if cfg.gate9.funding_credit_allowed { funding_bonus_r } else { 0.0 };

    st.funding_cost_r = funding_cost_r;
    st.funding_bonus_r_used = funding_bonus_r_used;

    let net_yield_r = st.ev_r_price - st.expected_cost_r_postmle - funding_cost_r + funding_bonus_r_used;
    st.net_yield_r = net_yield_r;

    if eff.unit_risk_allin_net < cfg.gate9.unit_risk_min_for_funding {
        return Some(RejectionReason::FundingCostBlock);
    }
    if funding_cost_r >= cfg.gate9.funding_cost_block_r {
        return Some(RejectionReason::FundingCostBlock);
    }
    if net_yield_r < cfg.gate9.min_net_yield_r {
        return Some(RejectionReason::FundingNetYieldBlock);
    }

    let t_to_funding = deriv.time_to_next_funding_sec;
    let tau = clip((cfg.gate9.proximity_soft_sec - t_to_funding) / (cfg.gate9.proximity_soft_sec - cfg.gate9.proximity_hard_sec).max(1e-9), 0.0, 1.0);
    st.funding_proximity_mult = 1.0 - (1.0 - cfg.gate9.proximity_mult_min) * tau.powf(cfg.gate9.proximity_power);

    let blackout = t_to_funding <= cfg.gate9.blackout_sec + 1e-9
        && funding_cost_r > 0.0
        && holding_h <= cfg.gate9.blackout_max_holding_hours
        && funding_cost_r / st.ev_r_price.max(cfg.gate9.blackout_ev_eps) >= cfg.gate9.blackout_cost_share_threshold;
    if blackout {
        return Some(RejectionReason::FundingBlackoutBlock);
    }
    None
}

pub fn gate10_basis_correlation(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let deriv = &input.market_state.derivatives;
    let level_mult = tier_mult(deriv.basis_z.abs(), cfg.gate10.basis_z_soft, cfg.gate10.basis_z_hard);
    let vol_mult = tier_mult(deriv.basis_vol_z.abs(), cfg.gate10.basis_vol_z_soft, cfg.gate10.basis_vol_z_hard);
    let event_mult = tier_mult_inverse(deriv.time_to_next_funding_sec, cfg.gate10.event_proximity_hard_sec, cfg.gate10.event_proximity_soft_sec);
    st.basis_risk_mult = level_mult.min(vol_mult).min(event_mult);

    if st.basis_risk_mult <= 0.0 {
        return Some(RejectionReason::BasisLevelBlock);
    }

    // Gate 14 hasn't sized the candidate yet, so its own contribution has to
    // be a size-invariant stand-in rather than an actual risk_pct: the hard
    // per-trade risk cap, i.e. the worst case this candidate could still
    // consume once sized, is what the exposure check must defend against.
    let candidate_signed_risk = input.engine_signal.direction.sign() * cfg.gate13.max_trade_risk_hard_cap_pct;

    let candidate_cluster_id = input
        .portfolio_state
        .positions
        .iter()
        .find(|p| p.instrument == input.engine_signal.instrument)
        .map(|p| p.cluster_id.clone())
        .unwrap_or_else(|| gk_domain::ClusterId(input.engine_signal.instrument.clone()));

    let existing_same_instrument: f64 = input
        .portfolio_state
        .positions
        .iter()
        .filter(|p| p.instrument == input.engine_signal.instrument)
        .map(|p| p.signed_risk_pct())
        .sum();
    let asset_exposure = (existing_same_instrument + candidate_signed_risk).abs();

    let existing_same_sector: f64 = input
        .portfolio_state
        .positions
        .iter()
        .filter(|p| p.cluster_id == candidate_cluster_id)
        .map(|p| p.signed_risk_pct())
        .sum();
    let sector_exposure = (existing_same_sector + candidate_signed_risk).abs();

    let existing_total: f64 = input.portfolio_state.positions.iter().map(|p| p.signed_risk_pct()).sum();
    let total_exposure = (existing_total + candidate_signed_risk).abs();

    let asset_mult = clip(
        (cfg.gate10.asset_exposure_hard_pct - asset_exposure) / (cfg.gate10.asset_exposure_hard_pct - cfg.gate10.asset_exposure_soft_pct).max(1e-9),
        0.0,
        1.0,
    );
    let sector_mult = clip(
        (cfg.gate10.sector_exposure_hard_pct - sector_exposure) / (cfg.gate10.sector_exposure_hard_pct - cfg.gate10.sector_exposure_soft_pct).max(1e-9),
        0.0,
        1.0,
    );
    let total_mult = clip(
        (cfg.gate10.total_exposure_hard_pct - total_exposure) / (cfg.gate10.total_exposure_hard_pct - cfg.gate10.total_exposure_soft_pct).max(1e-9),
        0.0,
        1.0,
    );
    st.correlation_exposure_mult = asset_mult.min(sector_mult).min(total_mult);
    st.note("asset_exposure", asset_exposure);
    st.note("sector_exposure", sector_exposure);
    st.note("total_exposure", total_exposure);

    if asset_exposure > cfg.gate10.asset_exposure_hard_pct || sector_exposure > cfg.gate10.sector_exposure_hard_pct || total_exposure > cfg.gate10.total_exposure_hard_pct {
        return Some(RejectionReason::CorrelationExposureBlock);
    }
    None
}

fn tier_mult(z_abs: f64, soft: f64, hard: f64) -> f64 {
    if z_abs >= hard {
        0.0
    } else if z_abs >= soft {
        clip((hard - z_abs) / (hard - soft).max(1e-9), 0.0, 1.0)
    } else {
        1.0
    }
}

fn tier_mult_inverse(value: f64, hard: f64, soft: f64) -> f64 {
    if value <= hard {
        0.0
    } else if value <= soft {
        clip((value - hard) / (soft - hard).max(1e-9), 0.0, 1.0)
    } else {
        1.0
    }
}

pub fn gate11_net_rr(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let eff = st.effective_prices.expect("gate5 runs before gate11");
    let net_reward = (eff.tp_eff_allin - eff.entry_eff_allin).abs();
    let net_risk = (eff.entry_eff_allin - eff.sl_eff_allin).abs();
    let net_rr = net_reward / denom_safe_unsigned(net_risk, cfg.gate11.net_rr_eps_price);
    st.net_rr = net_rr;

    let mut required = input.engine_signal.constraints.rr_min_engine;
    if st.probe_trade {
        required += cfg.gate11.rr_min_probe_add;
    }
    if net_rr < required {
        return Some(RejectionReason::NetRrBelowMin);
    }
    None
}

/// `c_stress_portfolio`, `c_psd.matrix`, and `c_blend.matrix` are
/// independently deserialized at the input boundary; a dimension mismatch
/// among them would otherwise surface as a nalgebra panic deep inside Gate
/// 12/13's matrix algebra rather than a clean rejection.
fn validate_correlation_dimensions(input: &EvaluationInput) -> GateOutcome {
    let n_stress = input.c_stress_portfolio.nrows();
    let n_psd = input.c_psd.matrix.nrows();
    let n_blend = input.c_blend.matrix.nrows();
    let square = input.c_stress_portfolio.ncols() == n_stress && input.c_psd.matrix.ncols() == n_psd && input.c_blend.matrix.ncols() == n_blend;
    let consistent = n_stress == n_psd && n_psd == n_blend && n_psd == input.c_psd.instruments.len() && n_blend == input.c_blend.instruments.len();
    if !square || !consistent {
        return Some(RejectionReason::DimensionMismatchBlock);
    }
    None
}

pub fn gate12_bankruptcy(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    if let Some(reason) = validate_correlation_dimensions(input) {
        return Some(reason);
    }
    let eff = st.effective_prices.expect("gate5 runs before gate12");
    let hv30_z = input.market_state.volatility.hv30 / denom_safe_unsigned(cfg.gate12.hv30_ref, 1e-9);
    let gap_frac = clip(
        cfg.gate12.gap_frac_base * (1.0 + cfg.gate12.gap_hv_sensitivity * clip(hv30_z - 1.0, 0.0, cfg.gate12.gap_hv_z_cap)),
        cfg.gate12.gap_frac_min,
        cfg.gate12.gap_frac_max,
    );

    let signal = &input.engine_signal;
    let sl_gap_price = match signal.direction {
        Direction::Long => signal.levels.stop_loss * (1.0 - gap_frac),
        Direction::Short => signal.levels.stop_loss * (1.0 + gap_frac),
    };
    let costs = default_cost_model(input.market_state.liquidity.spread_bps);
    let sl_gap_eff = compute_effective_prices(signal.direction, signal.levels.entry_price, signal.levels.take_profit, sl_gap_price, &costs, 1e-9);
    let gap_mult = (eff.entry_eff_allin - sl_gap_eff.sl_eff_allin).abs() / denom_safe_unsigned(eff.unit_risk_allin_net, cfg.gate12.gap_unit_risk_eps);
    st.gap_mult = gap_mult;

    let risk_pct_upper_bound = cfg.limits.max_cluster_risk_pct;
    if risk_pct_upper_bound * gap_mult > cfg.gate12.max_gap_loss_pct_equity {
        return Some(RejectionReason::BankruptcyGapBlockSingle);
    }

    if let Some(liq_price) = input.estimated_liquidation_price {
        let dist_frac = (signal.levels.stop_loss - liq_price).abs() / denom_safe_unsigned(signal.levels.entry_price, 1e-9);
        if dist_frac < cfg.gate12.liq_buffer_frac {
            return Some(RejectionReason::LiquidationBufferBlock);
        }
    }

    let r = build_portfolio_risk_vector(input);
    let portfolio_gap_loss = (r.transpose() * &input.c_stress_portfolio * &r)[(0, 0)].max(0.0).sqrt();
    st.portfolio_gap_loss_pct = portfolio_gap_loss;
    if portfolio_gap_loss > cfg.gate12.portfolio_max_gap_loss_pct_equity {
        return Some(RejectionReason::BankruptcyPortfolioStressBlock);
    }
    None
}

fn build_portfolio_risk_vector(input: &EvaluationInput) -> DVector<f64> {
    let n = input.c_stress_portfolio.nrows();
    let mut v = vec![0.0; n];
    for p in &input.portfolio_state.positions {
        if let Some(idx) = input.c_psd.instruments.iter().position(|i| i == &p.instrument) {
            if idx < n {
                v[idx] += p.signed_risk_pct();
            }
        }
    }
    DVector::from_vec(v)
}

pub fn gate13_sequential_risk(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let dd = input.portfolio_state.equity.smoothed_drawdown_frac;
    let dd_risk_max = clip(1.0 - cfg.gate13.dd_ladder_alpha * dd, cfg.gate13.dd_risk_floor, cfg.gate13.dd_risk_ceiling);

    let wr = input.mle_output.as_ref().map(|m| m.p_success).unwrap_or(0.5);
    let rr = st.net_rr.max(1e-6);
    let kelly_full = (wr * rr - (1.0 - wr)) / rr;
    let kelly_frac = clip(kelly_full * cfg.gate13.kelly_fraction, 0.0, cfg.gate13.kelly_cap_max);

    let base_risk = dd_risk_max.min(kelly_frac).min(cfg.gate13.max_trade_risk_hard_cap_pct) * st.risk_mult_mle;

    let lambda = input.market_state.correlation.lambda_used;
    let tail_lambda_mult = 1.0 - (1.0 - cfg.gate13.tail_lambda_mult_min) * clip((lambda - cfg.gate13.tail_lambda_soft) / (cfg.gate13.tail_lambda_hard - cfg.gate13.tail_lambda_soft).max(1e-9), 0.0, 1.0);

    let corr = &input.market_state.correlation;
    let beta_mult = tier_mult(corr.stress_beta_to_btc.abs(), 1.0, 2.5);
    let corr_mult = tier_mult(corr.tail_corr_to_btc.abs(), 0.6, 0.9);
    let reliability_mult = clip(corr.tail_reliability_score, 0.0, 1.0);
    let corr_beta_mult = beta_mult.min(corr_mult).min(reliability_mult);

    let adl_risk_mult = input.market_state.derivatives.adl_rank_quantile.map(|q| tier_mult(q, 0.7, 0.95)).unwrap_or(1.0);

    let market_multipliers = [
        st.risk_mult_mle,
        tail_lambda_mult,
        corr_beta_mult,
        st.funding_proximity_mult.max(1e-9),
        st.basis_risk_mult,
        adl_risk_mult,
        st.liquidity_mult,
    ];
    let defensive_mult = defensive_mult(input.drp_state).min(mlops_mult(input.portfolio_state.state.mlops));
    let ops_multipliers = [st.dqs_mult, defensive_mult];

    let combined_market = combine_cluster(&market_multipliers, cfg.gate13.active_threshold, cfg.gate13.active_power, cfg.gate13.stacking_penalty_base);
    let combined_ops = combine_cluster(&ops_multipliers, cfg.gate13.active_threshold, cfg.gate13.active_power, cfg.gate13.stacking_penalty_base);
    let combined_total = 2.0 * combined_market * combined_ops / (combined_market + combined_ops).max(1e-9);

    st.combined_risk_mult = combined_total;
    let allowed_risk = base_risk * combined_total;

    let portfolio_headroom = (cfg.limits.max_portfolio_risk_pct - input.portfolio_state.risk.current_portfolio_risk_pct - input.portfolio_state.risk.reserved_portfolio_risk_pct).max(0.0);
    let cluster_headroom = (cfg.limits.max_cluster_risk_pct - input.portfolio_state.risk.current_cluster_risk_pct - input.portfolio_state.risk.reserved_cluster_risk_pct).max(0.0);
    let allowed_risk = allowed_risk.min(portfolio_headroom).min(cluster_headroom);

    st.allowed_risk_pct = allowed_risk;
    st.note("combined_total", combined_total);
    st.note("allowed_risk_pct", allowed_risk);

    let c_for_heat = if corr.tail_reliability_score < cfg.heat_selection.heat_blend_min_reliability {
        &input.c_psd.matrix
    } else {
        &input.c_blend.matrix
    };
    let r = build_portfolio_risk_vector(input);
    let h_before = gk_heat::heat(&r, c_for_heat).max(gk_heat::heat_uni_abs(&r));
    st.heat_before = h_before;

    let candidate = gk_heat::evaluate_candidate(
        &r,
        &input.c_psd.matrix,
        &r,
        &input.c_blend.matrix,
        input.candidate_risk_index.min(r.len().saturating_sub(1).max(0)),
        input.engine_signal.direction.sign(),
        cfg.heat_selection.max_adjusted_heat_pct,
        h_before,
        cluster_headroom,
        portfolio_headroom,
        &cfg.heat,
    );
    st.heat_remaining_pct = candidate.remaining_heat_limits;
    st.risk_floor_breached = allowed_risk < cfg.gate13.min_risk_floor_pct_by_tier;
    if candidate.blocked {
        return Some(RejectionReason::HeatHardViolation);
    }
    if candidate.forced_hedge_required && candidate.remaining_heat_limits <= 0.0 {
        return Some(RejectionReason::ForcedHedgeNotEffectiveBlock);
    }
    if allowed_risk <= 0.0 {
        return Some(RejectionReason::HeatSoftBlockIncrease);
    }
    None
}

fn defensive_mult(drp: DrpState) -> f64 {
    match drp {
        DrpState::Normal => 1.0,
        DrpState::Degraded => 0.75,
        DrpState::Defensive => 0.5,
        DrpState::Recovery => 0.25,
        DrpState::Emergency | DrpState::Hibernate => 0.0,
    }
}

/// MLOps degradation table: a degraded model-ops pipeline (stale features,
/// failing retrains, drifted scoring) caps risk the same way DRP does; a
/// blocked pipeline is equivalent to DRP's Emergency/Hibernate floor.
fn mlops_mult(mlops: gk_domain::MlOpsState) -> f64 {
    match mlops {
        gk_domain::MlOpsState::Healthy => 1.0,
        gk_domain::MlOpsState::Degraded => 0.5,
        gk_domain::MlOpsState::Blocked => 0.0,
    }
}

fn active_strength(m: f64, active_threshold: f64, power: f64) -> f64 {
    let denom = (1.0 - active_threshold).max(1e-9);
    clip(((1.0 - m) / denom).powf(power), 0.0, 1.0)
}

fn combine_cluster(mults: &[f64], active_threshold: f64, power: f64, stacking_penalty_base: f64) -> f64 {
    let min_mult = mults.iter().cloned().fold(1.0_f64, f64::min);
    let effective_count: f64 = mults.iter().map(|&m| active_strength(m, active_threshold, power)).sum();
    if effective_count <= 1.0 {
        min_mult
    } else {
        min_mult * stacking_penalty_base.powf(effective_count - 1.0)
    }
}

pub fn gate14_sizing(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let eff = st.effective_prices.expect("gate5 runs before gate14");
    let impact = gk_sizing::ImpactModel { a: input.impact_curve.a, b: input.impact_curve.b };
    let result = gk_sizing::solve_qty(eff.unit_risk_allin_net, input.portfolio_state.equity.equity_usd, st.allowed_risk_pct, st.liquidity_mult, &impact, &cfg.sizing);

    st.qty_rounded = result.qty_rounded;
    st.size_notional = result.qty_rounded * input.engine_signal.levels.entry_price;
    st.sizing_not_converged = result.not_converged_event;
    st.note("sizing_iterations", result.iterations);
    if result.not_converged_event {
        st.note("sizing_not_converged_event", true);
    }
    None
}

pub fn gate15_impact(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &PipelineState) -> GateOutcome {
    let impact = gk_sizing::ImpactModel { a: input.impact_curve.a, b: input.impact_curve.b };
    let impact_bps = impact.impact_bps(st.qty_rounded);
    if impact_bps > cfg.gate15.max_acceptable_impact_bps {
        return Some(RejectionReason::ImpactHardBlock);
    }
    None
}

pub fn gate16_reservation(input: &EvaluationInput) -> GateOutcome {
    let r = &input.reservation;
    if r.orphan_sweep_in_progress {
        return Some(RejectionReason::OrphanSweepInProgressBlock);
    }
    if r.writer_queue_depth > r.writer_queue_hard_cap {
        return Some(RejectionReason::PortfolioWriterOverloadBlock);
    }
    if r.portfolio_id_used != r.current_portfolio_id {
        return Some(RejectionReason::StalePortfolioSnapshot);
    }
    None
}

pub fn gate17_actual_risk(input: &EvaluationInput, cfg: &GatekeeperConfig, st: &mut PipelineState) -> GateOutcome {
    let eff = st.effective_prices.expect("gate5 runs before gate17");
    let risk_amount_usd_actual = st.qty_rounded * eff.unit_risk_allin_net;
    let risk_pct_actual = risk_amount_usd_actual / denom_safe_unsigned(input.portfolio_state.equity.equity_usd, 1.0);
    st.risk_pct_actual = risk_pct_actual;

    let target = st.allowed_risk_pct;
    if target > 0.0 {
        let deviation = (risk_pct_actual - target).abs() / target;
        if deviation > cfg.gate17.lot_rounding_risk_deviation_threshold {
            return Some(RejectionReason::SizingNotConvergedBlock);
        }
    }
    if !is_close(risk_pct_actual, target, ToleranceContext::IntegrationKpi) && risk_pct_actual <= 0.0 {
        return Some(RejectionReason::SizingNotConvergedBlock);
    }
    None
}

/// Outcome of a partial-fill economics check (spec §4.7 Gate 18). This runs
/// against a working order after its first partial fill, not during
/// `evaluate_entry_signal` — the admission decision has already been made
/// and sized by the time an order can be partially filled.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PartialFillOutcome {
    pub impact_r_remaining: f64,
    pub abandon_threshold_r: f64,
    pub fill_abandon_event: bool,
    pub passive_fade_timeout_sec: f64,
}

/// `fill_frac` is the fraction of `qty_rounded` already filled; `impact_bps`
/// and `unit_risk_bps` are read off the original sizing/pricing decision.
pub fn gate18_partial_fill_economics(fill_frac: f64, impact_bps: f64, unit_risk_bps: f64, net_rr: f64, atr_z_short: f64, cfg: &crate::config::Gate18Config) -> PartialFillOutcome {
    let unit_risk_bps_safe = denom_safe_unsigned(unit_risk_bps, 1e-9);
    let impact_r_remaining = (impact_bps * (1.0 - fill_frac)) / unit_risk_bps_safe;
    let abandon_threshold_r = (net_rr * cfg.fill_abandonment_rr_frac).max(cfg.min_abandon_r).max(cfg.abandon_threshold_min_bps / unit_risk_bps_safe);
    let fill_abandon_event = impact_r_remaining > abandon_threshold_r;
    let passive_fade_timeout_sec = clip(
        cfg.passive_fade_timeout_base_sec / atr_z_short.max(1.0),
        cfg.passive_fade_timeout_min_sec,
        cfg.passive_fade_timeout_max_sec,
    );
    PartialFillOutcome {
        impact_r_remaining,
        abandon_threshold_r,
        fill_abandon_event,
        passive_fade_timeout_sec,
    }
}
