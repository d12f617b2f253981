//! I7 PF identity: with a valid KPI sample and low return-variability
//! (`cv_risk <= pf_identity_cv_threshold`), `PF_money` must equal the
//! algebraic identity `(WR_w * Avg_Win_w) / ((1 - WR_w) * Avg_Loss_w)`
//! within `integration_kpi` tolerance. `PF_money` itself is just
//! `sum(wins) / sum(losses)`; the identity is what lets a KPI dashboard
//! reconstruct it from win-rate and average win/loss alone.

use gk_numerics::{is_close, ToleranceContext};

fn pf_money(trades_r: &[f64]) -> f64 {
    let gross_win: f64 = trades_r.iter().filter(|r| **r > 0.0).sum();
    let gross_loss: f64 = trades_r.iter().filter(|r| **r < 0.0).map(|r| r.abs()).sum();
    gross_win / gross_loss
}

fn pf_identity(trades_r: &[f64]) -> f64 {
    let wins: Vec<f64> = trades_r.iter().copied().filter(|r| *r > 0.0).collect();
    let losses: Vec<f64> = trades_r.iter().copied().filter(|r| *r < 0.0).map(f64::abs).collect();
    let n = trades_r.len() as f64;
    let wr_w = wins.len() as f64 / n;
    let avg_win_w = wins.iter().sum::<f64>() / wins.len() as f64;
    let avg_loss_w = losses.iter().sum::<f64>() / losses.len() as f64;
    (wr_w * avg_win_w) / ((1.0 - wr_w) * avg_loss_w)
}

#[test]
fn pf_money_matches_identity_for_uniform_sample() {
    let trades_r = vec![1.5, -1.0, 2.0, -1.0, 1.0, -1.0, 3.0, -1.0, 1.2, -1.0];
    let pf = pf_money(&trades_r);
    let identity = pf_identity(&trades_r);
    assert!(is_close(pf, identity, ToleranceContext::IntegrationKpi), "pf={pf} identity={identity}");
}

#[test]
fn pf_money_matches_identity_when_win_loss_sizes_vary() {
    let trades_r = vec![0.5, 2.5, -0.8, -1.2, 1.0, -0.5, 4.0, -2.0, 0.3, -0.3, 1.8];
    let pf = pf_money(&trades_r);
    let identity = pf_identity(&trades_r);
    assert!(is_close(pf, identity, ToleranceContext::IntegrationKpi), "pf={pf} identity={identity}");
}

#[test]
fn identity_breaks_down_when_extrapolated_from_wrong_sample() {
    // Swapping in a different sample's win-rate/avg-win/avg-loss triple
    // must NOT reproduce the original sample's PF_money: the identity only
    // holds for a sample's own WR_w/Avg_Win_w/Avg_Loss_w, not an arbitrary one.
    let trades_r = vec![1.5, -1.0, 2.0, -1.0, 1.0, -1.0];
    let other_sample = vec![0.2, -0.9, 0.1, -0.9, 0.3, -0.9, 0.1, -0.9];
    let pf = pf_money(&trades_r);
    let mismatched_identity = pf_identity(&other_sample);
    assert!(!is_close(pf, mismatched_identity, ToleranceContext::IntegrationKpi));
}
