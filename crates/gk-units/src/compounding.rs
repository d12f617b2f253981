//! Safe geometric compounding and variance-drag detection (spec §4.3).

use gk_numerics::{safe_log_return, NumericsError, COMPOUNDING_R_FLOOR_EPS, LOG1P_SWITCH_THRESHOLD};

/// Result of compounding a sequence of per-trade returns starting from `e0`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CompoundResult {
    pub log_equity: f64,
    pub equity: f64,
}

/// `log(E) = log(E0) + sum(safe_log_return(r_k))`. Fails closed on the first
/// domain-violating return (I8).
pub fn compound_equity(e0: f64, returns: &[f64]) -> Result<CompoundResult, NumericsError> {
    compound_equity_with(e0, returns, LOG1P_SWITCH_THRESHOLD, COMPOUNDING_R_FLOOR_EPS)
}

pub fn compound_equity_with(
    e0: f64,
    returns: &[f64],
    log1p_switch_threshold: f64,
    compounding_r_floor_eps: f64,
) -> Result<CompoundResult, NumericsError> {
    let mut log_equity = e0.ln();
    for &r in returns {
        log_equity += safe_log_return(r, log1p_switch_threshold, compounding_r_floor_eps)?;
    }
    Ok(CompoundResult {
        log_equity,
        equity: log_equity.exp(),
    })
}

/// `variance_drag_per_trade = mean(r) - (exp(mean(log(1+r))) - 1)`, the gap
/// between the arithmetic mean return and the compounded (geometric) mean
/// return. Positive values mean volatility is eating into realized growth.
pub fn variance_drag_per_trade(returns: &[f64]) -> Result<f64, NumericsError> {
    variance_drag_per_trade_with(returns, LOG1P_SWITCH_THRESHOLD, COMPOUNDING_R_FLOOR_EPS)
}

pub fn variance_drag_per_trade_with(
    returns: &[f64],
    log1p_switch_threshold: f64,
    compounding_r_floor_eps: f64,
) -> Result<f64, NumericsError> {
    if returns.is_empty() {
        return Ok(0.0);
    }
    let n = returns.len() as f64;
    let arith_mean: f64 = returns.iter().sum::<f64>() / n;

    let mut log_sum = 0.0;
    for &r in returns {
        log_sum += safe_log_return(r, log1p_switch_threshold, compounding_r_floor_eps)?;
    }
    let geo_mean_log = log_sum / n;
    let geo_mean = geo_mean_log.exp() - 1.0;

    Ok(arith_mean - geo_mean)
}

/// Annualize a per-trade drag figure given a trade frequency.
pub fn annualize_drag(drag_per_trade: f64, trades_per_year: f64) -> f64 {
    drag_per_trade * trades_per_year
}

/// Whether annualized variance drag has breached the critical fraction of
/// the target annual return (spec §4.3: escalates DRP to DEFENSIVE).
pub fn is_variance_drag_critical(variance_drag_annual: f64, variance_drag_critical_frac: f64, target_return_annual: f64) -> bool {
    variance_drag_annual > variance_drag_critical_frac * target_return_annual
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_numerics::{is_close, ToleranceContext};

    #[test]
    fn compound_equity_flat_returns_is_identity() {
        let r = compound_equity(10_000.0, &[0.0, 0.0, 0.0]).unwrap();
        assert!(is_close(r.equity, 10_000.0, ToleranceContext::IntegrationKpi));
    }

    #[test]
    fn compound_equity_rejects_at_floor() {
        let err = compound_equity(10_000.0, &[0.1, -1.0, 0.1]);
        assert!(err.is_err());
    }

    #[test]
    fn compound_equity_matches_direct_product_for_small_sample() {
        let returns = [0.02, -0.01, 0.015];
        let direct = 10_000.0 * (1.0 + returns[0]) * (1.0 + returns[1]) * (1.0 + returns[2]);
        let got = compound_equity(10_000.0, &returns).unwrap();
        assert!(is_close(got.equity, direct, ToleranceContext::IntegrationKpi));
    }

    #[test]
    fn variance_drag_is_nonnegative_for_volatile_returns() {
        // By AM-GM, arithmetic mean >= geometric mean for returns that aren't
        // all identical, so drag should be positive.
        let drag = variance_drag_per_trade(&[0.1, -0.1, 0.1, -0.1]).unwrap();
        assert!(drag > 0.0, "expected positive drag, got {drag}");
    }

    #[test]
    fn variance_drag_zero_for_constant_returns() {
        let drag = variance_drag_per_trade(&[0.02, 0.02, 0.02]).unwrap();
        assert!(drag.abs() < 1e-9, "expected ~0 drag, got {drag}");
    }

    #[test]
    fn variance_drag_critical_threshold() {
        assert!(is_variance_drag_critical(0.06, 0.5, 0.10));
        assert!(!is_variance_drag_critical(0.04, 0.5, 0.10));
    }
}
