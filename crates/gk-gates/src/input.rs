//! Input shapes for one `evaluate_entry_signal` call (spec §6 admission
//! contract). Everything here is a frozen snapshot reference; the gate
//! chain never mutates any of it.

use std::sync::Arc;

use gk_domain::{DrpState, EngineSignal, MarketState, MleOutput, PortfolioState, RegimeHint};
use nalgebra::DMatrix;

use gk_correlation::CorrelationSnapshot;

#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MrcInput {
    pub regime: RegimeHint,
    pub confidence: f64,
}

/// Per-call reservation/writer backpressure signals, normally supplied by
/// `gk-reservation`'s coordinator and the portfolio writer (spec §4.11,
/// Gate 16).
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReservationContext {
    pub writer_queue_depth: u32,
    pub writer_queue_hard_cap: u32,
    pub orphan_sweep_in_progress: bool,
    pub portfolio_id_used: u64,
    pub current_portfolio_id: u64,
}

impl Default for ReservationContext {
    fn default() -> Self {
        Self {
            writer_queue_depth: 0,
            writer_queue_hard_cap: 10_000,
            orphan_sweep_in_progress: false,
            portfolio_id_used: 0,
            current_portfolio_id: 0,
        }
    }
}

/// Impact-curve parameters for the sizing solver (spec §4.10).
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImpactCurve {
    pub a: f64,
    pub b: f64,
}

pub struct EvaluationInput {
    pub mrc_regime: MrcInput,
    pub baseline_regime: RegimeHint,
    pub engine_signal: EngineSignal,
    pub mle_output: Option<MleOutput>,
    pub required_feature_schema_version: u32,
    pub market_state: MarketState,
    pub portfolio_state: PortfolioState,
    pub drp_state: DrpState,
    pub now_ms: u64,
    /// Candidate's index into the signed-risk vector used for heat algebra
    /// (the instrument's slot in `portfolio_state.positions`' cluster
    /// ordering, or a fresh slot appended at the end for a new instrument).
    pub candidate_risk_index: usize,
    pub c_psd: Arc<CorrelationSnapshot>,
    pub c_blend: Arc<CorrelationSnapshot>,
    pub c_stress_portfolio: DMatrix<f64>,
    pub reservation: ReservationContext,
    pub impact_curve: ImpactCurve,
    pub price_prev: f64,
    pub recent_prices: Vec<f64>,
    pub estimated_liquidation_price: Option<f64>,
}
