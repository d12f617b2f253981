//! `gk-reservation` — pre-execution risk reservation ledger and the
//! single-writer portfolio commit protocol (spec §4.11, Gate 16).
//!
//! `PortfolioStateWriter` (spec term) is modeled here as the exclusive
//! holder of [`RiskReservationCoordinator`]; every successful
//! [`RiskReservationCoordinator::commit`] increments the ledger's
//! `portfolio_id`, and readers (the gate chain, via
//! [`RiskReservationCoordinator::context_snapshot`]) only ever see an
//! immutable snapshot of it.

pub mod config;
pub mod coordinator;
pub mod types;

pub use config::ReservationConfig;
pub use coordinator::RiskReservationCoordinator;
pub use types::{
    LimitsSnapshot, OrderType, Reservation, ReservationError, ReservationRequest,
    ReservationState, TaggedFill,
};
