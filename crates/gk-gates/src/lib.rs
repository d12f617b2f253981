//! gk-gates
//!
//! The nineteen-gate admission chain (spec §4.7, C8): a single fixed-order
//! pipeline from raw market/portfolio snapshots down to an admit/reject
//! decision with a concrete sized notional. Modeled on a risk engine's
//! `evaluate()` — one ordered pass of short-circuiting checks — generalized
//! from a handful of checks to nineteen named gates, each a pure function of
//! the snapshot plus whatever earlier gates wrote into [`PipelineState`].

pub mod config;
pub mod gates;
pub mod input;
pub mod result;
pub mod state;

pub use config::GatekeeperConfig;
pub use gates::{gate18_partial_fill_economics, PartialFillOutcome};
pub use input::{EvaluationInput, ImpactCurve, MrcInput, ReservationContext};
pub use result::{Decision, Diagnostics, RejectionReason};
pub use state::PipelineState;

/// Run the full Gate00..Gate17 admission chain against one candidate signal.
/// Gate 18 (partial-fill economics) runs later, against a working order, via
/// [`gate18_partial_fill_economics`] — it has no place in a single
/// synchronous admission call.
pub fn evaluate_entry_signal(input: &EvaluationInput, cfg: &GatekeeperConfig) -> Decision {
    let mut st = PipelineState::default();

    macro_rules! run {
        ($gate_no:expr, $call:expr) => {
            if let Some(reason) = $call {
                return Decision::reject(reason, $gate_no, st.diagnostics.clone());
            }
        };
    }

    run!(0, gates::gate0_dqs_drp(input, cfg, &mut st));
    run!(1, gates::gate1_halts_mode(input));
    run!(2, gates::gate2_regime_resolution(input, cfg, &mut st));
    run!(3, gates::gate3_regime_compatibility(input, cfg, &st));
    run!(4, gates::gate4_signal_sanity(input, cfg));
    run!(5, gates::gate5_presizing_invariants(input, cfg, &mut st));
    // Gate 6 is also where SHADOW trading mode exits after a full evaluation
    // (the decision is computed and logged, but never admitted).
    run!(6, gates::gate6_mle_decision(input, cfg, &mut st));
    run!(7, gates::gate7_liquidity(input, cfg, &mut st));
    run!(8, gates::gate8_gap_glitch(input, cfg));
    run!(9, gates::gate9_funding(input, cfg, &mut st));
    run!(10, gates::gate10_basis_correlation(input, cfg, &mut st));
    run!(11, gates::gate11_net_rr(input, cfg, &mut st));
    run!(12, gates::gate12_bankruptcy(input, cfg, &mut st));
    run!(13, gates::gate13_sequential_risk(input, cfg, &mut st));
    run!(14, gates::gate14_sizing(input, cfg, &mut st));
    run!(15, gates::gate15_impact(input, cfg, &st));
    run!(16, gates::gate16_reservation(input));
    run!(17, gates::gate17_actual_risk(input, cfg, &mut st));

    Decision {
        allowed: true,
        size_notional: st.size_notional,
        rejection_reason: None,
        diagnostics: st.diagnostics.clone(),
        last_gate_evaluated: 17,
    }
}
