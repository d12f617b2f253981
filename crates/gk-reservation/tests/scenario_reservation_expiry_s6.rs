//! S6 reservation-expired fill. A reservation's TTL (here 1s, standing in
//! for the 30s case in the scenario's own numbers) elapses before its fill
//! arrives; the ledger must flag the commit as `ReservationExpiredFill`
//! rather than silently applying it, so the writer can run
//! `auto_reduce_to_limits` and the caller can escalate DRP to EMERGENCY
//! (`gk_drp::DrpEvidence::reservation_expired_fill`) before any further
//! admission.

use gk_domain::ClusterId;
use gk_reservation::{LimitsSnapshot, OrderType, ReservationConfig, ReservationError, ReservationRequest, RiskReservationCoordinator, TaggedFill};

fn limits() -> LimitsSnapshot {
    LimitsSnapshot {
        cluster_current_abs_risk_pct: 0.0,
        cluster_limit_abs_risk_pct: 5.0,
        portfolio_current_abs_risk_pct: 0.0,
        portfolio_limit_abs_risk_pct: 10.0,
        heat_budget_remaining_pct: 3.0,
    }
}

fn req(risk_pct: f64) -> ReservationRequest {
    ReservationRequest {
        instrument: "BTC-PERP".to_string(),
        cluster_id: ClusterId("crypto-majors".to_string()),
        order_type: OrderType::Taker,
        snapshot_id_used: 1,
        reserved_risk_pct: risk_pct,
        reserved_cluster_risk_pct: risk_pct,
        reserved_sum_abs_risk_pct: risk_pct,
    }
}

#[test]
fn expired_reservation_fill_is_flagged_not_silently_applied() {
    let coord = RiskReservationCoordinator::new();
    let mut cfg = ReservationConfig::default();
    cfg.reservation_ttl_sec_min_taker = 1;
    let id = coord.reserve(req(1.0), &limits(), 1, 1_000, &cfg).unwrap();

    let fill = TaggedFill {
        reservation_id: id,
        snapshot_id_used: 1,
        seq_no: 1,
        instrument: "BTC-PERP".to_string(),
        filled_qty: 0.5,
        fill_price: 60_000.0,
    };
    // expires_at_ms = 1_000 + 1_000 = 2_000; fill lands at 5_000.
    let result = coord.commit(&fill, 0, 5_000);
    assert_eq!(result, Err(ReservationError::ReservationExpiredFill));
    // The ledger's portfolio id must not have advanced: a rejected commit
    // never mutates the single-writer state it guards.
    assert_eq!(coord.current_portfolio_id(), 0);
}

#[test]
fn fill_within_ttl_commits_normally() {
    let coord = RiskReservationCoordinator::new();
    let mut cfg = ReservationConfig::default();
    cfg.reservation_ttl_sec_min_taker = 30;
    let id = coord.reserve(req(1.0), &limits(), 1, 1_000, &cfg).unwrap();

    let fill = TaggedFill {
        reservation_id: id,
        snapshot_id_used: 1,
        seq_no: 1,
        instrument: "BTC-PERP".to_string(),
        filled_qty: 0.5,
        fill_price: 60_000.0,
    };
    // expires_at_ms = 1_000 + 30_000 = 31_000; fill lands well before that.
    let result = coord.commit(&fill, 0, 10_000);
    assert_eq!(result, Ok(1));
    assert_eq!(coord.current_portfolio_id(), 1);
}
