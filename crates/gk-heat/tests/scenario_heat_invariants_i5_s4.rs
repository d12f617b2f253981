//! I5/S4: heat invariants. For any admitted candidate, `heat_after <=
//! H_hard` against every matrix in play; when the portfolio already sits
//! above `H_hard`, only a genuine hedge (`b < 0`, sized to push heat down by
//! at least `heat_min_reduction_bps/10000`) can be admitted. S4's BTC
//! walk-through is the concrete instance: an existing long at heat 0.031 >
//! H_hard=0.03 blocks another long outright, but admits a short sized as a
//! forced hedge.

use gk_heat::{evaluate_candidate, hedge_reduced_heat_enough, heat, HeatConfig};
use nalgebra::{DMatrix, DVector};

fn corr2(rho: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(2, 2, &[1.0, rho, rho, 1.0])
}

#[test]
fn heat_above_hard_blocks_non_reducing_trade() {
    let r = DVector::from_vec(vec![0.032, 0.0]);
    let c = corr2(0.2);
    let cfg = HeatConfig::default();
    let result = evaluate_candidate(&r, &c, &r, &c, 0, 1.0, 0.03, 0.032, 1.0, 1.0, &cfg);
    assert!(result.blocked);
    assert_eq!(result.block_reason, Some("heat_hard_violation"));
}

#[test]
fn heat_above_hard_admits_genuine_hedge_and_satisfies_i5() {
    let r = DVector::from_vec(vec![0.032, 0.0]);
    let c = corr2(0.2);
    let cfg = HeatConfig::default();
    let heat_before = heat(&r, &c);
    // s = -1 at the same instrument index flips the sign contribution: a
    // short against the existing long, i.e. a genuine hedge.
    let result = evaluate_candidate(&r, &c, &r, &c, 0, -1.0, 0.03, heat_before, 1.0, 1.0, &cfg);
    assert!(!result.blocked);
    assert!(result.forced_hedge_required);
    assert!(result.remaining_heat_limits > 0.0);

    // I5: admitting the hedge at its full remaining-heat allowance must not
    // raise heat above H_hard, and must reduce it by at least the
    // configured minimum.
    let mut r_after = r.clone();
    r_after[0] -= result.remaining_heat_limits;
    let heat_after = heat(&r_after, &c);
    assert!(heat_after <= 0.03 + 1e-9, "heat_after={heat_after} exceeds H_hard");
    assert!(hedge_reduced_heat_enough(heat_before, heat_after, &cfg), "heat_before={heat_before} heat_after={heat_after} did not clear the minimum reduction");
}

#[test]
fn same_direction_trade_below_hard_limit_is_never_forced_into_hedge_path() {
    let r = DVector::from_vec(vec![0.01, 0.0]);
    let c = corr2(0.2);
    let cfg = HeatConfig::default();
    let heat_before = heat(&r, &c);
    let result = evaluate_candidate(&r, &c, &r, &c, 0, 1.0, 0.03, heat_before, 1.0, 1.0, &cfg);
    assert!(!result.blocked);
    assert!(!result.forced_hedge_required);
}
