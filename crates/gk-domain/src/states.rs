//! Closed, exhaustively-matched state enums shared by `PortfolioState` and
//! the DRP state machine (`gk-drp`). Kept here rather than in `gk-drp` so
//! `gk-domain` has no dependency on the behavior crate — only the shapes.

use serde::{Deserialize, Serialize};

/// Disaster-Recovery Protocol state (spec §4.6). Priority for conflicting
/// transitions: `Emergency > Hibernate > Recovery > Defensive > Degraded > Normal`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrpState {
    Normal,
    Degraded,
    Defensive,
    Emergency,
    Recovery,
    Hibernate,
}

impl DrpState {
    /// Priority rank used to resolve simultaneous-transition conflicts;
    /// higher wins.
    pub fn priority(self) -> u8 {
        match self {
            DrpState::Normal => 0,
            DrpState::Degraded => 1,
            DrpState::Defensive => 2,
            DrpState::Recovery => 3,
            DrpState::Hibernate => 4,
            DrpState::Emergency => 5,
        }
    }

    pub fn blocks_new_entries(self) -> bool {
        matches!(self, DrpState::Emergency | DrpState::Hibernate | DrpState::Recovery)
    }
}

/// Cause of an `Emergency -> Recovery` transition, driving the warm-up bar
/// count (spec §4.6).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryCause {
    DataGlitch,
    Liquidity,
    Depeg,
    Other,
}

/// MLOps health state, feeding the `defensive_mult` table in Gate 13.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MlOpsState {
    Healthy,
    Degraded,
    Blocked,
}

/// Trading mode. Gate 1 only allows `Live`/`Shadow` through; anything else
/// blocks with `trading_mode_block`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    Live,
    Shadow,
    Paused,
    Maintenance,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ManualHalts {
    pub manual_halt_all_trading: bool,
    pub manual_halt_new_entries: bool,
}
