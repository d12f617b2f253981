//! gk-units
//!
//! Risk units (R), all-in effective prices, and safe compounding. Every
//! quantity here is size-invariant: none of it may depend on `qty_actual`
//! or lot rounding (that begins at Gate 14, which lives in `gk-sizing`).

use gk_numerics::{denom_safe_signed, denom_safe_unsigned, safe_log_return, NumericsError};
use serde::{Deserialize, Serialize};

pub mod compounding;

// ─── Direction ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

// ─── Execution cost model ────────────────────────────────────────────────────

/// bps cost components feeding the all-in effective-price computation.
/// Every field is a basis-point quantity (1 bp = 1/10000).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CostBps {
    pub spread_bps: f64,
    pub slippage_entry_bps: f64,
    pub slippage_tp_bps: f64,
    pub slippage_stop_bps: f64,
    pub impact_entry_bps: f64,
    pub impact_exit_bps: f64,
    pub impact_stop_bps: f64,
    pub fee_entry_bps: f64,
    pub fee_exit_bps: f64,
    /// Stop fills are assumed to slip by this multiple of `slippage_stop_bps`
    /// (stops are taker/market orders in a fast-moving book).
    pub stop_slippage_mult: f64,
}

/// `b(x) = x / 10000` — converts a basis-point quantity to a fraction.
#[inline]
pub fn b(x: f64) -> f64 {
    x / 10_000.0
}

impl CostBps {
    /// Half-spread + slippage + impact + fee charged when crossing in on entry.
    pub fn entry_cost_bps(&self) -> f64 {
        self.spread_bps / 2.0 + self.slippage_entry_bps + self.impact_entry_bps + self.fee_entry_bps
    }

    /// Half-spread + slippage + impact + fee charged when exiting at take-profit.
    pub fn tp_exit_cost_bps(&self) -> f64 {
        self.spread_bps / 2.0 + self.slippage_tp_bps + self.impact_exit_bps + self.fee_exit_bps
    }

    /// Half-spread + (amplified) stop slippage + impact + fee charged when
    /// exiting at the protective stop.
    pub fn sl_exit_cost_bps(&self) -> f64 {
        self.spread_bps / 2.0
            + self.slippage_stop_bps * self.stop_slippage_mult
            + self.impact_stop_bps
            + self.fee_exit_bps
    }
}

// ─── Effective prices ────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EffectivePrices {
    pub entry_eff_allin: f64,
    pub tp_eff_allin: f64,
    pub sl_eff_allin: f64,
    /// `|entry_eff_allin - sl_eff_allin|` — the authoritative unit risk.
    pub unit_risk_allin_net: f64,
    /// `unit_risk_allin_net` expressed in bps of `entry_price_ref`.
    pub unit_risk_bps: f64,
}

/// Compute all-in effective entry/tp/sl prices and the resulting unit risk.
///
/// LONG adds costs to entry (you pay more to get in) and subtracts costs
/// from tp/sl (you receive less on the way out); SHORT is the mirror image.
pub fn compute_effective_prices(
    direction: Direction,
    entry: f64,
    tp: f64,
    sl: f64,
    costs: &CostBps,
    unit_risk_eps: f64,
) -> EffectivePrices {
    let entry_c = b(costs.entry_cost_bps());
    let tp_c = b(costs.tp_exit_cost_bps());
    let sl_c = b(costs.sl_exit_cost_bps());

    let (entry_eff, tp_eff, sl_eff) = match direction {
        Direction::Long => (entry * (1.0 + entry_c), tp * (1.0 - tp_c), sl * (1.0 - sl_c)),
        Direction::Short => (entry * (1.0 - entry_c), tp * (1.0 + tp_c), sl * (1.0 + sl_c)),
    };

    let unit_risk_allin_net = (entry_eff - sl_eff).abs();
    let entry_price_ref = denom_safe_unsigned(entry, unit_risk_eps);
    let unit_risk_bps = 10_000.0 * unit_risk_allin_net / entry_price_ref;

    EffectivePrices {
        entry_eff_allin: entry_eff,
        tp_eff_allin: tp_eff,
        sl_eff_allin: sl_eff,
        unit_risk_allin_net,
        unit_risk_bps,
    }
}

/// Conservative tick-size rounding. `is_entry_leg` marks the entry price
/// (as opposed to a tp/sl exit price) since the conservative direction
/// flips between the two legs.
pub fn round_price_conservative(direction: Direction, is_entry_leg: bool, price: f64, tick_size: f64) -> f64 {
    if tick_size <= 0.0 {
        return price;
    }
    let round_up = matches!(
        (direction, is_entry_leg),
        (Direction::Long, true) | (Direction::Short, false)
    );
    let steps = price / tick_size;
    let rounded_steps = if round_up { steps.ceil() } else { steps.floor() };
    rounded_steps * tick_size
}

// ─── Conversions ─────────────────────────────────────────────────────────────

/// `R = PnL / denom_safe_signed(risk_amount_usd, eps)`.
pub fn pnl_to_r(pnl_usd: f64, risk_amount_usd: f64, eps: f64) -> f64 {
    pnl_usd / denom_safe_signed(risk_amount_usd, eps)
}

/// `risk_pct = risk_amount_usd / max(equity, pnl_eps)`.
pub fn risk_amount_to_pct(risk_amount_usd: f64, equity_usd: f64, pnl_eps: f64) -> f64 {
    risk_amount_usd / equity_usd.max(pnl_eps)
}

/// Convenience re-export so downstream crates that only need the domain
/// violation type don't have to depend on `gk-numerics` directly for it.
pub type UnitsError = NumericsError;

/// `unit_risk_allin_net >= unit_risk_min_abs` and `>= unit_risk_min_atr_mult * atr`.
pub fn unit_risk_passes_floor(unit_risk_allin_net: f64, unit_risk_min_abs: f64, unit_risk_min_atr_mult: f64, atr: f64) -> bool {
    unit_risk_allin_net >= unit_risk_min_abs && unit_risk_allin_net >= unit_risk_min_atr_mult * atr
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_numerics::{is_close, ToleranceContext};

    fn s1_costs() -> CostBps {
        CostBps {
            spread_bps: 5.0,
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

    #[test]
    fn long_entry_pays_more_sl_tp_receive_less() {
        let eff = compute_effective_prices(Direction::Long, 100.0, 106.0, 98.0, &s1_costs(), 1e-9);
        assert!(eff.entry_eff_allin > 100.0);
        assert!(eff.tp_eff_allin < 106.0);
        assert!(eff.sl_eff_allin < 98.0);
        assert!(eff.unit_risk_allin_net > 2.0, "costs must widen unit risk beyond raw entry-sl distance, got {}", eff.unit_risk_allin_net);
    }

    #[test]
    fn short_is_mirror_of_long() {
        let long = compute_effective_prices(Direction::Long, 100.0, 94.0, 102.0, &s1_costs(), 1e-9);
        let short = compute_effective_prices(Direction::Short, 100.0, 106.0, 98.0, &s1_costs(), 1e-9);
        // Short entry pays less, exits receive more (in absolute terms, the
        // deviation from the raw price has the opposite sign).
        assert!(short.entry_eff_allin < 100.0);
        assert!(is_close(long.entry_eff_allin - 100.0, 100.0 - short.entry_eff_allin, ToleranceContext::Prices));
    }

    #[test]
    fn unit_risk_bps_is_size_invariant_scale() {
        let eff = compute_effective_prices(Direction::Long, 100.0, 106.0, 98.0, &s1_costs(), 1e-9);
        assert!(eff.unit_risk_bps > 0.0);
        // Doubling all prices (same relative costs) should not change bps.
        let eff2 = compute_effective_prices(Direction::Long, 200.0, 212.0, 196.0, &s1_costs(), 1e-9);
        assert!(is_close(eff.unit_risk_bps, eff2.unit_risk_bps, ToleranceContext::Prices));
    }

    #[test]
    fn tick_rounding_is_conservative_per_leg() {
        // LONG: entry rounds up, exits round down.
        assert_eq!(round_price_conservative(Direction::Long, true, 100.03, 0.05), 100.05);
        assert_eq!(round_price_conservative(Direction::Long, false, 100.03, 0.05), 100.00);
        // SHORT mirrors.
        assert_eq!(round_price_conservative(Direction::Short, true, 100.03, 0.05), 100.00);
        assert_eq!(round_price_conservative(Direction::Short, false, 100.03, 0.05), 100.05);
    }

    #[test]
    fn pnl_to_r_sl_equals_minus_one() {
        // SL=-1R invariant: a stop-out PnL exactly equal to -risk_amount yields R=-1.
        let r = pnl_to_r(-500.0, 500.0, 1e-9);
        assert!(is_close(r, -1.0, ToleranceContext::IntegrationKpi));
    }

    #[test]
    fn risk_amount_to_pct_basic() {
        let pct = risk_amount_to_pct(50.0, 10_000.0, 1e-9);
        assert!(is_close(pct, 0.005, ToleranceContext::StrictUnit));
    }

    #[test]
    fn unit_risk_floor_checks_both_conditions() {
        assert!(unit_risk_passes_floor(2.0, 1.0, 1.0, 1.5));
        assert!(!unit_risk_passes_floor(1.0, 1.5, 1.0, 1.5));
        assert!(!unit_risk_passes_floor(1.0, 0.5, 1.0, 1.5));
    }
}
