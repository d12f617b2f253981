//! Mutable accumulator threaded through the gate chain. Each gate reads
//! what earlier gates produced and writes only its own fields — mirroring
//! the ordered short-circuit style of a risk engine's `evaluate()`, just
//! generalized from a handful of checks to nineteen gates.

use gk_units::EffectivePrices;

use crate::result::Diagnostics;

#[derive(Clone, Debug, Default)]
pub struct PipelineState {
    pub diagnostics: Diagnostics,

    // Gate 0
    pub dqs_mult: f64,

    // Gate 2/3
    pub final_regime: Option<gk_domain::RegimeHint>,
    pub probe_trade: bool,

    // Gate 5
    pub effective_prices: Option<EffectivePrices>,
    pub expected_cost_r_premle: f64,

    // Gate 6
    pub ev_r_price: f64,
    pub expected_cost_r_postmle: f64,
    pub risk_mult_mle: f64,

    // Gate 7
    pub liquidity_mult: f64,
    pub obi: f64,
    pub impact_bps_est: f64,

    // Gate 9
    pub funding_cost_r: f64,
    pub funding_bonus_r_used: f64,
    pub net_yield_r: f64,
    pub funding_proximity_mult: f64,

    // Gate 10
    pub basis_risk_mult: f64,
    pub correlation_exposure_mult: f64,

    // Gate 11
    pub net_rr: f64,

    // Gate 12
    pub gap_mult: f64,
    pub portfolio_gap_loss_pct: f64,

    // Gate 13
    pub combined_risk_mult: f64,
    pub allowed_risk_pct: f64,
    pub heat_before: f64,
    pub heat_remaining_pct: f64,

    // Gate 13, step 17: risk floor breach. The caller's DRP machine, not
    // this pure gate, owns the HIBERNATE transition once this has been true
    // for `hibernate_trigger_n` consecutive evaluations.
    pub risk_floor_breached: bool,

    // Gate 14/15
    pub qty_rounded: f64,
    pub size_notional: f64,
    pub sizing_not_converged: bool,

    // Gate 17
    pub risk_pct_actual: f64,
}

impl PipelineState {
    pub fn note(&mut self, key: &str, value: impl ToString) {
        self.diagnostics.insert(key.to_string(), value.to_string());
    }
}
