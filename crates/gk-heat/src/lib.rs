//! gk-heat
//!
//! Portfolio heat algebra (spec §4.9, C9): `H(R) = sqrt(max(R^T C R, 0))`,
//! the candidate-admission quadratic solver, and soft/hard heat limits with
//! forced-hedge admission.

use gk_numerics::{clip, denom_safe_unsigned};
use nalgebra::{DMatrix, DVector};

/// `H(R) = sqrt(max(R^T C R, 0))` for a signed-risk vector `r` against
/// correlation matrix `c`.
pub fn heat(r: &DVector<f64>, c: &DMatrix<f64>) -> f64 {
    let quad = (r.transpose() * c * r)[(0, 0)];
    quad.max(0.0).sqrt()
}

/// Collapse-scenario heat: every pairwise correlation assumed to be 1.
pub fn heat_uni_abs(r: &DVector<f64>) -> f64 {
    r.iter().map(|v| v.abs()).sum()
}

/// Worst-case heat across the PSD matrix, the stress-blended matrix, and the
/// uniform-abs collapse scenario (spec §4.9 "Heat limits are worst-case").
pub fn worst_heat(h_psd: f64, h_blend: f64, h_uni_abs: f64) -> f64 {
    h_psd.max(h_blend).max(h_uni_abs)
}

/// Which correlation matrix a given evaluation should use: `C_psd` when
/// the tail-reliability score is too low to trust the stress blend, else
/// `C_blend` (spec §4.9).
pub fn select_matrix<'a>(c_psd: &'a DMatrix<f64>, c_blend: &'a DMatrix<f64>, tail_reliability_score: f64, heat_blend_min_reliability: f64) -> &'a DMatrix<f64> {
    if tail_reliability_score < heat_blend_min_reliability {
        c_psd
    } else {
        c_blend
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeatConfig {
    pub heat_soft_frac: f64,
    pub heat_min_reduction_bps: f64,
    pub hedge_opt_mult: f64,
    pub hedge_abs_cap_pct: f64,
    pub heat_disc_floor_eps: f64,
    pub lot_step_qty: f64,
    /// Minimum candidate risk-flow direction (`b`) required for a trade to
    /// count as a genuine hedge above `H_hard` (spec §4.9/S4: "admitted only
    /// if `b < -heat_forced_b_min`").
    pub heat_forced_b_min: f64,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            heat_soft_frac: 0.95,
            heat_min_reduction_bps: 10.0,
            hedge_opt_mult: 1.5,
            hedge_abs_cap_pct: 0.02,
            heat_disc_floor_eps: 1e-9,
            lot_step_qty: 1e-6,
            heat_forced_b_min: 1e-6,
        }
    }
}

/// Solve the quadratic `H(x)^2 = x^2 + 2bx + c` for the largest nonnegative
/// `x` with `H(x) <= h_max`, i.e. `disc = b^2 + h_max^2 - c`,
/// `x_max = max(0, -b + sqrt(max(disc,0)))`. When `|b|` is negligible this
/// degenerates to `sqrt(max(h_max^2 - c, 0))`. When the discriminant is at
/// the numerical floor but `c` is still (within tolerance) below `h_max^2`,
/// fall back to an iterative halving search for the largest admissible lot,
/// rejecting once the step would be smaller than `lot_step_qty`.
pub fn quadratic_x_max(c_quad: f64, b: f64, h_max: f64, cfg: &HeatConfig) -> f64 {
    if b.abs() < 1e-12 {
        return (h_max * h_max - c_quad).max(0.0).sqrt();
    }
    let disc = b * b + h_max * h_max - c_quad;
    if disc > cfg.heat_disc_floor_eps {
        return (-b + disc.max(0.0).sqrt()).max(0.0);
    }
    if c_quad < h_max * h_max {
        let mut x_try = h_max;
        loop {
            let trial_quad = c_quad + 2.0 * b * x_try + x_try * x_try;
            if trial_quad.max(0.0).sqrt() <= h_max {
                return x_try;
            }
            x_try *= 0.5;
            if x_try < cfg.lot_step_qty {
                return 0.0;
            }
        }
    }
    0.0
}

/// `x_max` for the uniform-abs collapse matrix, derived in closed form:
/// `x_max = max(0, cap - s*r_j)` where `cap = h_max - sum_{i != j} |r_i|`.
pub fn uni_abs_x_max(r: &DVector<f64>, j: usize, s: f64, h_max: f64) -> f64 {
    let sum_other: f64 = r.iter().enumerate().filter(|(i, _)| *i != j).map(|(_, v)| v.abs()).sum();
    let cap = h_max - sum_other;
    (cap - s * r[j]).max(0.0)
}

/// Hedge cap above `H_hard`: only a genuine risk-reducing trade (`b < 0`) is
/// admitted, capped by an optimistic multiple of the heat reduction needed,
/// an absolute percentage cap, and whatever cluster/portfolio budget remains.
pub fn hedge_cap(b: f64, cfg: &HeatConfig, remaining_cluster: f64, remaining_portfolio: f64) -> f64 {
    let opt = cfg.hedge_opt_mult * (-b).max(0.0);
    opt.min(cfg.hedge_abs_cap_pct).min(remaining_cluster).min(remaining_portfolio)
}

#[derive(Clone, Debug, PartialEq)]
pub struct CandidateHeatResult {
    pub x_max_psd: f64,
    pub x_max_blend: f64,
    pub x_max_uni_abs: f64,
    /// `min` across all three matrices — the final size-invariant heat cap.
    pub remaining_heat_limits: f64,
    pub forced_hedge_required: bool,
    pub blocked: bool,
    pub block_reason: Option<&'static str>,
}

/// Full candidate-admission evaluation at instrument index `j` with signed
/// direction `s` (spec §4.9). `h_max` is the hard heat limit; heat above
/// `heat_soft_frac * h_max` but below `h_max` is allowed without
/// restriction (the soft threshold is advisory, enforced by the caller via
/// diagnostics), heat already above `h_max` requires a genuine hedge.
#[allow(clippy::too_many_arguments)]
pub fn evaluate_candidate(
    r_psd: &DVector<f64>,
    c_psd: &DMatrix<f64>,
    r_blend: &DVector<f64>,
    c_blend: &DMatrix<f64>,
    j: usize,
    s: f64,
    h_max: f64,
    heat_before: f64,
    remaining_cluster: f64,
    remaining_portfolio: f64,
    cfg: &HeatConfig,
) -> CandidateHeatResult {
    let c_quad_psd = (r_psd.transpose() * c_psd * r_psd)[(0, 0)];
    let u_psd = c_psd * r_psd;
    let b_psd = s * u_psd[j];

    let c_quad_blend = (r_blend.transpose() * c_blend * r_blend)[(0, 0)];
    let u_blend = c_blend * r_blend;
    let b_blend = s * u_blend[j];

    let above_hard = heat_before > h_max;
    if above_hard && b_psd >= -cfg.heat_forced_b_min && b_blend >= -cfg.heat_forced_b_min {
        return CandidateHeatResult {
            x_max_psd: 0.0,
            x_max_blend: 0.0,
            x_max_uni_abs: 0.0,
            remaining_heat_limits: 0.0,
            forced_hedge_required: true,
            blocked: true,
            block_reason: Some("heat_hard_violation"),
        };
    }

    let mut x_max_psd = quadratic_x_max(c_quad_psd, b_psd, h_max, cfg);
    let mut x_max_blend = quadratic_x_max(c_quad_blend, b_blend, h_max, cfg);
    let x_max_uni_abs = uni_abs_x_max(r_psd, j, s, h_max);

    let forced_hedge_required = above_hard;
    if forced_hedge_required {
        if b_psd < 0.0 {
            let cap = hedge_cap(b_psd, cfg, remaining_cluster, remaining_portfolio);
            x_max_psd = x_max_psd.min(cap);
        }
        if b_blend < 0.0 {
            let cap = hedge_cap(b_blend, cfg, remaining_cluster, remaining_portfolio);
            x_max_blend = x_max_blend.min(cap);
        }
    }

    let remaining_heat_limits = x_max_psd.min(x_max_blend).min(x_max_uni_abs);

    CandidateHeatResult {
        x_max_psd,
        x_max_blend,
        x_max_uni_abs,
        remaining_heat_limits,
        forced_hedge_required,
        blocked: false,
        block_reason: None,
    }
}

/// Verify a hedge trade actually reduced heat by at least
/// `heat_min_reduction_bps` (spec I5/S4).
pub fn hedge_reduced_heat_enough(heat_before: f64, heat_after: f64, cfg: &HeatConfig) -> bool {
    let required = cfg.heat_min_reduction_bps / 10_000.0;
    heat_before - heat_after >= required - 1e-12
}

/// Guard used before every heat computation (spec §4.9 "asserts `|C_ii-1| <
/// diag_eps`").
pub fn assert_unit_diagonal(c: &DMatrix<f64>, diag_eps: f64) -> bool {
    (0..c.nrows()).all(|i| (c[(i, i)] - 1.0).abs() < diag_eps)
}

/// Size-invariant risk-to-R conversion used when logging `heat_calculation_id`
/// diagnostics alongside a candidate's notional.
pub fn heat_contribution_r(risk_amount_usd: f64, equity_usd: f64) -> f64 {
    risk_amount_usd / denom_safe_unsigned(equity_usd, 1.0)
}

/// Clip a raw heat reading into `[0, h_max]` defensively before logging —
/// never used to silently mask an actual violation, only to guard diagnostics
/// math against a transient negative-under-tolerance quadratic form.
pub fn clip_heat_for_diagnostics(h: f64, h_max: f64) -> f64 {
    clip(h, 0.0, h_max.max(h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corr2(rho: f64) -> DMatrix<f64> {
        DMatrix::from_row_slice(2, 2, &[1.0, rho, rho, 1.0])
    }

    #[test]
    fn heat_matches_quadratic_form_for_diagonal_matrix() {
        let r = DVector::from_vec(vec![0.01, 0.0]);
        let c = DMatrix::<f64>::identity(2, 2);
        assert!((heat(&r, &c) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn heat_uni_abs_sums_absolute_risk() {
        let r = DVector::from_vec(vec![0.01, -0.02]);
        assert!((heat_uni_abs(&r) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn worst_heat_picks_maximum() {
        assert_eq!(worst_heat(0.01, 0.03, 0.02), 0.03);
    }

    #[test]
    fn quadratic_x_max_zero_b_reduces_to_sqrt_form() {
        let cfg = HeatConfig::default();
        let x = quadratic_x_max(0.0001, 0.0, 0.03, &cfg);
        assert!((x - (0.03f64 * 0.03 - 0.0001).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn uni_abs_x_max_respects_remaining_budget() {
        let r = DVector::from_vec(vec![0.01, 0.005]);
        let x = uni_abs_x_max(&r, 0, 1.0, 0.03);
        // cap = 0.03 - 0.005 = 0.025; x = 0.025 - r[0](0.01) = 0.015
        assert!((x - 0.015).abs() < 1e-9);
    }

    #[test]
    fn hedge_reduction_check_enforces_minimum_bps() {
        let cfg = HeatConfig::default();
        assert!(!hedge_reduced_heat_enough(0.032, 0.0319, &cfg));
        assert!(hedge_reduced_heat_enough(0.032, 0.0310, &cfg));
    }

    #[test]
    fn unit_diagonal_guard_flags_bad_matrix() {
        let good = corr2(0.3);
        let bad = DMatrix::from_row_slice(2, 2, &[1.01, 0.3, 0.3, 1.0]);
        assert!(assert_unit_diagonal(&good, 1e-4));
        assert!(!assert_unit_diagonal(&bad, 1e-4));
    }
}
