//! gk-sizing
//!
//! The final sizing solver (spec §4.10, C10): size-invariant target plus
//! size-dependent impact feedback, solved by Newton-Raphson with a damped
//! fixed-point fallback, bounded feasibility caps, and epsilon-compensated
//! lot-step rounding.
//!
//! `liquidity_mult` must only ever scale the sizing target here, never also
//! re-applied inside Gate 13's REM chain against the same target (spec
//! §4.10 "Forbidden: applying `liquidity_mult` both in REM and in sizing to
//! the same target without explicit variable separation") — callers pass in
//! `risk_pre_liquidity`, already excluding any liquidity multiplier.

use gk_numerics::denom_safe_unsigned;
use gk_units::Direction;

fn bps_to_frac(bps: f64) -> f64 {
    bps / 10_000.0
}

/// Power-law impact curve: `impact_bps(qty) = a * qty^b`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImpactModel {
    pub a: f64,
    pub b: f64,
}

impl ImpactModel {
    pub fn impact_bps(&self, qty: f64) -> f64 {
        if qty <= 0.0 {
            return 0.0;
        }
        self.a * qty.powf(self.b)
    }

    /// d(impact_bps)/d(qty).
    fn impact_bps_deriv(&self, qty: f64) -> f64 {
        if qty <= 0.0 || self.b == 0.0 {
            return 0.0;
        }
        self.a * self.b * qty.powf(self.b - 1.0)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub max_sizing_iters: u32,
    pub newton_deriv_floor: f64,
    pub damping_alpha_init: f64,
    pub damping_alpha_min: f64,
    pub convergence_tol_usd: f64,
    pub liquidity_min_convergence_threshold: f64,
    pub sizing_low_liquidity_cap_mult: f64,
    pub max_acceptable_impact_bps: f64,
    pub sizing_high_impact_cap_mult: f64,
    pub sizing_not_converged_risk_cap_mult: f64,
    pub lot_step_qty: f64,
    pub lot_rounding_eps: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            max_sizing_iters: 30,
            newton_deriv_floor: 1e-8,
            damping_alpha_init: 0.5,
            damping_alpha_min: 0.05,
            convergence_tol_usd: 0.01,
            liquidity_min_convergence_threshold: 0.30,
            sizing_low_liquidity_cap_mult: 0.50,
            max_acceptable_impact_bps: 25.0,
            sizing_high_impact_cap_mult: 0.50,
            sizing_not_converged_risk_cap_mult: 0.50,
            lot_step_qty: 1e-6,
            lot_rounding_eps: 1e-9,
        }
    }
}

/// `risk_usd(qty) = qty * unit_risk_allin_net * (1 + b(impact_bps(qty)))` —
/// size-dependent impact feeds back into the effective per-unit risk.
fn risk_usd(qty: f64, unit_risk_allin_net: f64, impact: &ImpactModel) -> f64 {
    qty * unit_risk_allin_net * (1.0 + bps_to_frac(impact.impact_bps(qty)))
}

fn risk_usd_deriv(qty: f64, unit_risk_allin_net: f64, impact: &ImpactModel) -> f64 {
    let cost_frac = bps_to_frac(impact.impact_bps(qty));
    let cost_frac_deriv = bps_to_frac(impact.impact_bps_deriv(qty));
    unit_risk_allin_net * (1.0 + cost_frac) + qty * unit_risk_allin_net * cost_frac_deriv
}

#[derive(Clone, Debug, PartialEq)]
pub struct SizingResult {
    pub qty_raw: f64,
    pub qty_rounded: f64,
    pub iterations: u32,
    pub converged: bool,
    pub not_converged_event: bool,
    pub risk_target_for_sizing: f64,
    pub low_liquidity_capped: bool,
    pub high_impact_capped: bool,
}

/// Solve for the quantity that achieves `risk_target = risk_pre_liquidity *
/// liquidity_mult` of `equity_usd`, net of size-dependent impact, via
/// Newton-Raphson; falls back to a damped fixed-point iteration if Newton
/// oscillates (sign of `qty_{k+1} - qty_k` flips), and to "best iterate so
/// far" if neither converges within `max_sizing_iters`.
pub fn solve_qty(unit_risk_allin_net: f64, equity_usd: f64, risk_pre_liquidity: f64, liquidity_mult: f64, impact: &ImpactModel, cfg: &SizingConfig) -> SizingResult {
    let mut risk_target_for_sizing = risk_pre_liquidity * liquidity_mult;
    let low_liquidity_capped = liquidity_mult < cfg.liquidity_min_convergence_threshold;
    if low_liquidity_capped {
        risk_target_for_sizing *= cfg.sizing_low_liquidity_cap_mult;
    }

    let target_usd = risk_target_for_sizing * equity_usd;
    let unit_risk = denom_safe_unsigned(unit_risk_allin_net, 1e-12);

    let mut qty = target_usd / unit_risk;
    let mut prev_delta_sign: Option<bool> = None;
    let mut alpha = cfg.damping_alpha_init;
    let mut history: Vec<(f64, f64)> = Vec::new(); // (qty, |F(qty)|) for finite, valid iterates
    let mut converged = false;
    let mut iterations = 0;
    let mut oscillating = false;

    for i in 0..cfg.max_sizing_iters {
        iterations = i + 1;
        let f_val = risk_usd(qty, unit_risk, impact) - target_usd;
        if f_val.is_finite() && qty.is_finite() && qty >= 0.0 {
            history.push((qty, f_val.abs()));
        }
        if f_val.abs() < cfg.convergence_tol_usd {
            converged = true;
            break;
        }

        let qty_next = if !oscillating {
            let deriv = risk_usd_deriv(qty, unit_risk, impact).max(cfg.newton_deriv_floor);
            qty - f_val / deriv
        } else {
            let qty_hat = target_usd / (unit_risk * (1.0 + bps_to_frac(impact.impact_bps(qty))));
            (1.0 - alpha) * qty + alpha * qty_hat
        };

        let delta = qty_next - qty;
        let delta_sign = delta >= 0.0;
        if let Some(prev) = prev_delta_sign {
            if prev != delta_sign {
                oscillating = true;
                alpha = (alpha * 0.5).max(cfg.damping_alpha_min);
            }
        }
        prev_delta_sign = Some(delta_sign);
        qty = qty_next.max(0.0);
    }

    let mut impact_bps_at_qty = impact.impact_bps(qty);
    let high_impact_capped = impact_bps_at_qty > cfg.max_acceptable_impact_bps;
    if high_impact_capped {
        risk_target_for_sizing *= cfg.sizing_high_impact_cap_mult;
        let new_target_usd = risk_target_for_sizing * equity_usd;
        qty = new_target_usd / unit_risk;
        impact_bps_at_qty = impact.impact_bps(qty);
        let _ = impact_bps_at_qty;
    }

    let not_converged_event = !converged;
    if not_converged_event && !history.is_empty() {
        history.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        qty = history[0].0 * cfg.sizing_not_converged_risk_cap_mult;
    }

    let qty_rounded = round_lot(qty, cfg.lot_step_qty, cfg.lot_rounding_eps);

    SizingResult {
        qty_raw: qty,
        qty_rounded,
        iterations,
        converged,
        not_converged_event,
        risk_target_for_sizing,
        low_liquidity_capped,
        high_impact_capped,
    }
}

/// Epsilon-compensated floor lot rounding (spec §9 "Lot rounding via
/// truncation -> epsilon-compensated floor"): `steps = floor((amount +
/// lot_rounding_eps) / step)`.
pub fn round_lot(amount: f64, step: f64, lot_rounding_eps: f64) -> f64 {
    if step <= 0.0 {
        return amount.max(0.0);
    }
    let steps = ((amount + lot_rounding_eps) / step).floor();
    (steps.max(0.0)) * step
}

/// Conservative entry-price rounding per direction, delegating to
/// `gk_units::round_price_conservative` (spec §4.2).
pub fn round_entry_price(direction: Direction, price: f64, tick_size: f64) -> f64 {
    gk_units::round_price_conservative(direction, true, price, tick_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_converges_for_mild_impact() {
        let impact = ImpactModel { a: 1e-7, b: 1.0 };
        let cfg = SizingConfig::default();
        let result = solve_qty(2.0, 10_000.0, 0.005, 1.0, &impact, &cfg);
        assert!(result.converged, "iterations={}", result.iterations);
        // risk_target_for_sizing * equity / unit_risk ~= 25, impact pulls it down slightly.
        assert!(result.qty_rounded > 0.0 && result.qty_rounded <= 25.0);
    }

    #[test]
    fn low_liquidity_scales_target_down() {
        let impact = ImpactModel { a: 1e-7, b: 1.0 };
        let cfg = SizingConfig::default();
        let result = solve_qty(2.0, 10_000.0, 0.005, 0.1, &impact, &cfg);
        assert!(result.low_liquidity_capped);
        assert!(result.risk_target_for_sizing < 0.005 * 0.1);
    }

    #[test]
    fn non_convergent_oscillating_impact_falls_back_to_best_iterate() {
        // Steep super-linear impact (a=3e-6, b=1.5) as in the non-convergence scenario.
        let impact = ImpactModel { a: 3e-6, b: 1.5 };
        let mut cfg = SizingConfig::default();
        cfg.max_sizing_iters = 8;
        cfg.convergence_tol_usd = 1e-9; // force non-convergence within the small iter budget
        let result = solve_qty(2.0, 10_000.0, 0.02, 1.0, &impact, &cfg);
        assert!(result.not_converged_event);
        assert!(result.qty_rounded >= 0.0);
    }

    #[test]
    fn lot_rounding_floors_with_epsilon_compensation() {
        assert!((round_lot(1.00000001, 1.0, 1e-6) - 1.0).abs() < 1e-12);
        assert!((round_lot(0.9999999, 1.0, 1e-6) - 1.0).abs() < 1e-12);
        assert!((round_lot(0.99, 1.0, 1e-9) - 0.0).abs() < 1e-12);
    }

    #[test]
    fn high_impact_scales_target_down() {
        let impact = ImpactModel { a: 1e-3, b: 1.0 };
        let cfg = SizingConfig::default();
        let result = solve_qty(2.0, 10_000.0, 0.01, 1.0, &impact, &cfg);
        assert!(result.high_impact_capped);
    }
}
