//! `MarketState` — frozen, schema-versioned market snapshot (spec §3).

use serde::{Deserialize, Serialize};

use crate::ids::SnapshotId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub last: f64,
    pub mid: f64,
    pub bid: f64,
    pub ask: f64,
    pub tick_size: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolatilityInfo {
    pub atr: f64,
    pub atr_z_short: f64,
    pub atr_z_long: f64,
    pub hv30: f64,
    pub hv30_z: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidityInfo {
    pub spread_bps: f64,
    pub bid_depth_usd: f64,
    pub ask_depth_usd: f64,
    pub volume_24h_usd: f64,
    pub impact_bps_est: f64,
    pub depth_volatility_cv: f64,
    pub orderbook_staleness_ms: f64,
    pub orderbook_last_update_id_age_ms: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivativesInfo {
    pub funding_rate_current: f64,
    pub funding_rate_forecast: f64,
    pub funding_period_hours: f64,
    pub time_to_next_funding_sec: f64,
    pub open_interest_usd: f64,
    pub basis_value: f64,
    pub basis_z: f64,
    pub basis_vol_z: f64,
    pub adl_rank_quantile: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrelationContext {
    pub tail_reliability_score: f64,
    pub tail_corr_to_btc: f64,
    pub stress_beta_to_btc: f64,
    pub lambda_used: f64,
    pub corr_matrix_snapshot_id: Option<SnapshotId>,
    pub corr_matrix_age_sec: f64,
    pub gamma_s: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataQualityInputs {
    pub suspected_data_glitch: bool,
    pub stale_book_glitch: bool,
    pub price_staleness_ms: f64,
    pub volatility_staleness_ms: f64,
    pub orderbook_staleness_ms: f64,
    pub orderbook_integrity_ok: bool,
    pub derivatives_staleness_ms: f64,
    pub completeness_frac: f64,
    pub cross_source_staleness_ms: Option<f64>,
    pub xdev_bps: f64,
    pub oracle_price: Option<f64>,
    pub oracle_dev_frac: Option<f64>,
    pub oracle_staleness_ms: Option<f64>,
    pub toxic_flow_suspected: bool,
    pub any_critical_field_non_finite: bool,
}

/// Frozen market snapshot. Immutable once published (spec §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub schema_version: u32,
    pub market_data_id: crate::ids::MarketDataId,
    pub ts_utc_ms: u64,
    pub instrument: String,
    pub timeframe: String,
    pub price: PriceInfo,
    pub volatility: VolatilityInfo,
    pub liquidity: LiquidityInfo,
    pub derivatives: DerivativesInfo,
    pub correlation: CorrelationContext,
    pub data_quality: DataQualityInputs,
}
