//! `PortfolioState` — frozen snapshot of equity, risk aggregates, and open
//! positions (spec §3). Positions live in an append-only arena addressed by
//! [`PositionId`]; clusters are a derived index partition over that arena
//! (Design Note "cyclic references -> arena + indices"), directly modeled
//! on `mqk-portfolio::types::PortfolioState`'s ledger + derived-positions split.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gk_units::Direction;

use crate::ids::PortfolioId;
use crate::states::{DrpState, ManualHalts, MlOpsState, TradingMode};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub String);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u32);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub cluster_id: ClusterId,
    pub direction: Direction,
    pub qty: f64,
    pub entry_price: f64,
    pub entry_eff_allin: f64,
    pub sl_eff_allin: f64,
    pub risk_amount_usd: f64,
    pub risk_pct_equity: f64,
    pub notional_usd: f64,
    pub unrealized_pnl_usd: f64,
    pub funding_pnl_usd: f64,
    pub opened_ts_ms: u64,
}

impl Position {
    /// Signed risk contribution: `+risk_pct` for long, `-risk_pct` for short.
    /// This is the `s_i * risk_i` term used by the heat algebra (spec §4.9).
    pub fn signed_risk_pct(&self) -> f64 {
        self.direction.sign() * self.risk_pct_equity
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquityState {
    pub equity_usd: f64,
    pub peak_equity_usd: f64,
    pub drawdown_frac: f64,
    pub smoothed_drawdown_frac: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskAggregates {
    pub current_portfolio_risk_pct: f64,
    pub reserved_portfolio_risk_pct: f64,
    pub current_cluster_risk_pct: f64,
    pub reserved_cluster_risk_pct: f64,
    pub sum_abs_risk_pct: f64,
    pub reserved_heat_upper_bound_pct: f64,
    pub adjusted_heat_base_pct: f64,
    pub adjusted_heat_blend_pct: f64,
    pub adjusted_heat_worst_pct: f64,
    pub heat_uni_abs_pct: f64,
    pub max_portfolio_risk_cap_pct: f64,
    pub max_cluster_risk_cap_pct: f64,
    pub max_trade_risk_cap_pct: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationalState {
    pub drp: DrpState,
    pub mlops: MlOpsState,
    pub trading_mode: TradingMode,
    pub warmup_bars_remaining: u32,
    pub drp_flap_count: u32,
    pub hibernate_until_ts_ms: Option<u64>,
    pub manual_halts: ManualHalts,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub schema_version: u32,
    pub portfolio_id: PortfolioId,
    pub equity: EquityState,
    pub risk: RiskAggregates,
    pub state: OperationalState,
    pub positions: Vec<Position>,
}

impl PortfolioState {
    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(id.0 as usize)
    }

    /// Derived partition of position indices by cluster (Design Note
    /// "arena + indices" — the cluster view is never stored, only computed).
    pub fn cluster_index(&self) -> BTreeMap<ClusterId, Vec<PositionId>> {
        let mut idx: BTreeMap<ClusterId, Vec<PositionId>> = BTreeMap::new();
        for (i, p) in self.positions.iter().enumerate() {
            idx.entry(p.cluster_id.clone()).or_default().push(PositionId(i as u32));
        }
        idx
    }

    /// Signed risk vector in arena order, as consumed by `gk-heat`.
    pub fn signed_risk_vector(&self) -> Vec<f64> {
        self.positions.iter().map(Position::signed_risk_pct).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pos(instrument: &str, dir: Direction, risk_pct: f64) -> Position {
        Position {
            instrument: instrument.to_string(),
            cluster_id: ClusterId("BTC".to_string()),
            direction: dir,
            qty: 1.0,
            entry_price: 100.0,
            entry_eff_allin: 100.1,
            sl_eff_allin: 98.0,
            risk_amount_usd: 50.0,
            risk_pct_equity: risk_pct,
            notional_usd: 100.0,
            unrealized_pnl_usd: 0.0,
            funding_pnl_usd: 0.0,
            opened_ts_ms: 0,
        }
    }

    #[test]
    fn signed_risk_pct_follows_direction() {
        let long = sample_pos("BTCUSDT", Direction::Long, 0.01);
        let short = sample_pos("ETHUSDT", Direction::Short, 0.02);
        assert_eq!(long.signed_risk_pct(), 0.01);
        assert_eq!(short.signed_risk_pct(), -0.02);
    }

    #[test]
    fn cluster_index_groups_by_cluster() {
        let mut p1 = sample_pos("BTCUSDT", Direction::Long, 0.01);
        p1.cluster_id = ClusterId("BTC".into());
        let mut p2 = sample_pos("ETHUSDT", Direction::Long, 0.01);
        p2.cluster_id = ClusterId("ETH".into());
        let state = PortfolioState {
            schema_version: 1,
            portfolio_id: PortfolioId::new(1),
            equity: EquityState { equity_usd: 10_000.0, peak_equity_usd: 10_000.0, drawdown_frac: 0.0, smoothed_drawdown_frac: 0.0 },
            risk: RiskAggregates {
                current_portfolio_risk_pct: 0.0,
                reserved_portfolio_risk_pct: 0.0,
                current_cluster_risk_pct: 0.0,
                reserved_cluster_risk_pct: 0.0,
                sum_abs_risk_pct: 0.02,
                reserved_heat_upper_bound_pct: 0.0,
                adjusted_heat_base_pct: 0.0,
                adjusted_heat_blend_pct: 0.0,
                adjusted_heat_worst_pct: 0.0,
                heat_uni_abs_pct: 0.0,
                max_portfolio_risk_cap_pct: 0.04,
                max_cluster_risk_cap_pct: 0.02,
                max_trade_risk_cap_pct: 0.005,
            },
            state: OperationalState {
                drp: DrpState::Normal,
                mlops: MlOpsState::Healthy,
                trading_mode: TradingMode::Live,
                warmup_bars_remaining: 0,
                drp_flap_count: 0,
                hibernate_until_ts_ms: None,
                manual_halts: ManualHalts::default(),
            },
            positions: vec![p1, p2],
        };
        let idx = state.cluster_index();
        assert_eq!(idx.len(), 2);
        assert_eq!(idx[&ClusterId("BTC".into())], vec![PositionId(0)]);
        assert_eq!(idx[&ClusterId("ETH".into())], vec![PositionId(1)]);
    }
}
