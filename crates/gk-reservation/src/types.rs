//! Reservation record and error types (spec §4.11).

use gk_domain::ClusterId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Maker,
    Taker,
    Stop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationState {
    Reserved,
    Committed,
    Cancelled,
    Expired,
}

/// A caller's request to hold a risk budget ahead of sending an order.
#[derive(Clone, Debug, PartialEq)]
pub struct ReservationRequest {
    pub instrument: String,
    pub cluster_id: ClusterId,
    pub order_type: OrderType,
    pub snapshot_id_used: u64,
    pub reserved_risk_pct: f64,
    pub reserved_cluster_risk_pct: f64,
    pub reserved_sum_abs_risk_pct: f64,
}

/// `{reservation_id, snapshot_id_used, instrument, cluster_id,
/// reserved_risk_pct, reserved_cluster_risk_pct, reserved_sum_abs_risk_pct,
/// reserved_heat_upper_bound_pct, expires_at, lease_id,
/// lease_renewal_deadline, order_type}` per spec §4.11.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: Uuid,
    pub snapshot_id_used: u64,
    pub instrument: String,
    pub cluster_id: ClusterId,
    pub reserved_risk_pct: f64,
    pub reserved_cluster_risk_pct: f64,
    pub reserved_sum_abs_risk_pct: f64,
    pub reserved_heat_upper_bound_pct: f64,
    pub order_type: OrderType,
    pub state: ReservationState,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub lease_id: Uuid,
    pub lease_renewal_deadline_ms: u64,
    pub last_renewed_ms: u64,
    pub last_heartbeat_ms: u64,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.state == ReservationState::Reserved
    }
}

/// A fill tagged with a broker/EXM-assigned sequence number, applied to the
/// reservation ledger in canonical `(seq_no, instrument)` order — same
/// ordering discipline as a ledger applying tagged fills to FIFO lots.
#[derive(Clone, Debug, PartialEq)]
pub struct TaggedFill {
    pub reservation_id: Uuid,
    pub snapshot_id_used: u64,
    pub seq_no: u64,
    pub instrument: String,
    pub filled_qty: f64,
    pub fill_price: f64,
}

/// Current usage the coordinator checks a reservation request against.
/// Supplied by the caller (the heat/risk-aggregate side of the pipeline);
/// the coordinator itself holds no opinion on limit values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LimitsSnapshot {
    pub cluster_current_abs_risk_pct: f64,
    pub cluster_limit_abs_risk_pct: f64,
    pub portfolio_current_abs_risk_pct: f64,
    pub portfolio_limit_abs_risk_pct: f64,
    pub heat_budget_remaining_pct: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReservationError {
    PortfolioLimitExceeded,
    ClusterLimitExceeded,
    HeatBudgetExceeded,
    StaleSnapshot,
    UnknownReservation,
    AlreadyTerminal,
    OccConflict { current_portfolio_id: u64 },
    OccRetriesExhausted,
    ReservationExpiredFill,
}

impl std::fmt::Display for ReservationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PortfolioLimitExceeded => write!(f, "portfolio_limit_exceeded"),
            Self::ClusterLimitExceeded => write!(f, "cluster_limit_exceeded"),
            Self::HeatBudgetExceeded => write!(f, "heat_budget_exceeded"),
            Self::StaleSnapshot => write!(f, "stale_snapshot"),
            Self::UnknownReservation => write!(f, "unknown_reservation_id"),
            Self::AlreadyTerminal => write!(f, "reservation_already_terminal"),
            Self::OccConflict { current_portfolio_id } => {
                write!(f, "occ_conflict current_portfolio_id={current_portfolio_id}")
            }
            Self::OccRetriesExhausted => write!(f, "occ_retries_exhausted"),
            Self::ReservationExpiredFill => write!(f, "reservation_expired_fill_event"),
        }
    }
}

impl std::error::Error for ReservationError {}
