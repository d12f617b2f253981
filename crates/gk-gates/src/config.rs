//! Process-wide immutable gate configuration (spec §9 "Global mutable config
//! -> process-wide immutable config with explicit versions"). Loaded once by
//! `gk-config` and carried by reference into every gate; a hot-reload
//! produces a new `GatekeeperConfig` value, never a mutation of this one.

use gk_dqs::DqsConfig;
use gk_drp::DrpConfig;
use gk_heat::HeatConfig;
use gk_sizing::SizingConfig;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate2Config {
    pub mrc_very_high_conf_threshold: f64,
    pub conflict_window_bars: u32,
    pub conflict_ratio_threshold: f64,
    pub diagnostic_block_minutes: f64,
    pub probe_min_depth_usd: f64,
    pub probe_max_spread_bps: f64,
    pub probe_risk_mult: f64,
    pub noise_range_atr_z_cap: f64,
    /// Open question (c): not numerically specified beyond "reduced";
    /// documented conservative default, exercised by I3 monotonicity tests.
    pub noise_override_risk_mult: f64,
}

impl Default for Gate2Config {
    fn default() -> Self {
        Self {
            mrc_very_high_conf_threshold: 0.85,
            conflict_window_bars: 10,
            conflict_ratio_threshold: 0.5,
            diagnostic_block_minutes: 15.0,
            probe_min_depth_usd: 500_000.0,
            probe_max_spread_bps: 3.0,
            probe_risk_mult: 0.33,
            noise_range_atr_z_cap: 1.5,
            noise_override_risk_mult: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate4Config {
    pub sl_min_atr_mult: f64,
    pub sl_max_atr_mult: f64,
    pub holding_hours_min: f64,
    pub holding_hours_max: f64,
}

impl Default for Gate4Config {
    fn default() -> Self {
        Self {
            sl_min_atr_mult: 0.5,
            sl_max_atr_mult: 4.0,
            holding_hours_min: 0.25,
            holding_hours_max: 72.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate5Config {
    pub unit_risk_min_abs: f64,
    pub unit_risk_min_atr_mult: f64,
    pub unit_risk_eps: f64,
}

impl Default for Gate5Config {
    fn default() -> Self {
        Self {
            unit_risk_min_abs: 0.0001,
            unit_risk_min_atr_mult: 0.10,
            unit_risk_eps: 1e-9,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate6Config {
    pub ev_weak_upper: f64,
    pub ev_normal_upper: f64,
    pub p_neutral_cutoff: f64,
    pub ev_near_zero_band: f64,
    pub beta_base: f64,
    pub beta_min: f64,
    pub beta_max: f64,
    pub net_edge_floor_r: f64,
    pub risk_mult_weak: f64,
    pub risk_mult_normal: f64,
    pub risk_mult_strong: f64,
}

impl Default for Gate6Config {
    fn default() -> Self {
        Self {
            ev_weak_upper: 0.15,
            ev_normal_upper: 0.40,
            p_neutral_cutoff: 0.50,
            ev_near_zero_band: 0.05,
            beta_base: 1.0,
            beta_min: 0.5,
            beta_max: 3.0,
            net_edge_floor_r: 0.0,
            risk_mult_weak: 0.5,
            risk_mult_normal: 1.0,
            risk_mult_strong: 1.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate7Config {
    pub bid_depth_min_usd: f64,
    pub ask_depth_min_usd: f64,
    pub spread_max_hard_bps: f64,
    pub spread_soft_bps: f64,
    pub volume_24h_min_usd: f64,
    pub depth_volatility_cv_threshold: f64,
    pub impact_k: f64,
    pub impact_pow: f64,
    pub impact_soft_bps: f64,
    pub impact_hard_bps: f64,
}

impl Default for Gate7Config {
    fn default() -> Self {
        Self {
            bid_depth_min_usd: 50_000.0,
            ask_depth_min_usd: 50_000.0,
            spread_max_hard_bps: 40.0,
            spread_soft_bps: 15.0,
            volume_24h_min_usd: 1_000_000.0,
            depth_volatility_cv_threshold: 2.5,
            impact_k: 1.0,
            impact_pow: 0.5,
            impact_soft_bps: 10.0,
            impact_hard_bps: 25.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate8Config {
    pub price_jump_threshold_frac: f64,
    pub price_jump_hard_frac: f64,
    pub spike_z_threshold: f64,
    pub stale_book_age_ms: f64,
}

impl Default for Gate8Config {
    fn default() -> Self {
        Self {
            price_jump_threshold_frac: 0.01,
            price_jump_hard_frac: 0.03,
            spike_z_threshold: 4.0,
            stale_book_age_ms: 3000.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate9Config {
    pub funding_count_smoothing_width_sec: f64,
    pub unit_risk_min_for_funding: f64,
    pub funding_credit_allowed: bool,
    pub funding_cost_block_r: f64,
    pub min_net_yield_r: f64,
    pub proximity_soft_sec: f64,
    pub proximity_hard_sec: f64,
    pub proximity_mult_min: f64,
    pub proximity_power: f64,
    pub blackout_sec: f64,
    pub blackout_max_holding_hours: f64,
    pub blackout_cost_share_threshold: f64,
    pub blackout_ev_eps: f64,
}

impl Default for Gate9Config {
    fn default() -> Self {
        Self {
            funding_count_smoothing_width_sec: 300.0,
            unit_risk_min_for_funding: 1e-6,
            funding_credit_allowed: false,
            funding_cost_block_r: 0.30,
            min_net_yield_r: 0.0,
            proximity_soft_sec: 3600.0,
            proximity_hard_sec: 300.0,
            proximity_mult_min: 0.5,
            proximity_power: 2.0,
            blackout_sec: 15.0 * 60.0,
            blackout_max_holding_hours: 4.0,
            blackout_cost_share_threshold: 0.40,
            blackout_ev_eps: 1e-6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate10Config {
    pub basis_z_soft: f64,
    pub basis_z_hard: f64,
    pub basis_vol_z_soft: f64,
    pub basis_vol_z_hard: f64,
    pub event_proximity_soft_sec: f64,
    pub event_proximity_hard_sec: f64,
    pub asset_exposure_soft_pct: f64,
    pub asset_exposure_hard_pct: f64,
    pub sector_exposure_soft_pct: f64,
    pub sector_exposure_hard_pct: f64,
    pub total_exposure_soft_pct: f64,
    pub total_exposure_hard_pct: f64,
}

impl Default for Gate10Config {
    fn default() -> Self {
        Self {
            basis_z_soft: 2.0,
            basis_z_hard: 3.5,
            basis_vol_z_soft: 2.0,
            basis_vol_z_hard: 3.5,
            event_proximity_soft_sec: 1800.0,
            event_proximity_hard_sec: 300.0,
            asset_exposure_soft_pct: 0.02,
            asset_exposure_hard_pct: 0.03,
            sector_exposure_soft_pct: 0.03,
            sector_exposure_hard_pct: 0.05,
            total_exposure_soft_pct: 0.06,
            total_exposure_hard_pct: 0.10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate11Config {
    pub rr_min_probe_add: f64,
    pub net_rr_eps_price: f64,
}

impl Default for Gate11Config {
    fn default() -> Self {
        Self {
            rr_min_probe_add: 0.10,
            net_rr_eps_price: 1e-9,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate12Config {
    pub hv30_ref: f64,
    pub gap_frac_base: f64,
    pub gap_hv_sensitivity: f64,
    pub gap_hv_z_cap: f64,
    pub gap_frac_min: f64,
    pub gap_frac_max: f64,
    pub gap_unit_risk_eps: f64,
    pub max_gap_loss_pct_equity: f64,
    pub liq_buffer_frac: f64,
    pub stress_gap_lambda_unity_threshold: f64,
    pub portfolio_max_gap_loss_pct_equity: f64,
    pub top_k_by_risk: usize,
}

impl Default for Gate12Config {
    fn default() -> Self {
        Self {
            hv30_ref: 0.60,
            gap_frac_base: 0.03,
            gap_hv_sensitivity: 0.5,
            gap_hv_z_cap: 3.0,
            gap_frac_min: 0.01,
            gap_frac_max: 0.15,
            gap_unit_risk_eps: 1e-9,
            max_gap_loss_pct_equity: 0.02,
            liq_buffer_frac: 0.10,
            stress_gap_lambda_unity_threshold: 0.95,
            portfolio_max_gap_loss_pct_equity: 0.08,
            top_k_by_risk: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate13Config {
    pub dd_ladder_alpha: f64,
    pub dd_risk_floor: f64,
    pub dd_risk_ceiling: f64,
    pub kelly_fraction: f64,
    pub kelly_cap_max: f64,
    pub max_trade_risk_hard_cap_pct: f64,
    pub tail_lambda_soft: f64,
    pub tail_lambda_hard: f64,
    pub tail_lambda_mult_min: f64,
    pub active_threshold: f64,
    pub active_power: f64,
    pub stacking_penalty_base: f64,
    pub min_risk_floor_pct_by_tier: f64,
    pub hibernate_trigger_n: u32,
}

impl Default for Gate13Config {
    fn default() -> Self {
        Self {
            dd_ladder_alpha: 0.2,
            dd_risk_floor: 0.20,
            dd_risk_ceiling: 1.0,
            kelly_fraction: 0.50,
            kelly_cap_max: 0.004,
            max_trade_risk_hard_cap_pct: 0.005,
            tail_lambda_soft: 1.0,
            tail_lambda_hard: 3.0,
            tail_lambda_mult_min: 0.3,
            active_threshold: 0.90,
            active_power: 2.0,
            stacking_penalty_base: 0.85,
            min_risk_floor_pct_by_tier: 0.0005,
            hibernate_trigger_n: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate15Config {
    pub max_acceptable_impact_bps: f64,
}

impl Default for Gate15Config {
    fn default() -> Self {
        Self {
            max_acceptable_impact_bps: 25.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate17Config {
    pub lot_rounding_risk_deviation_threshold: f64,
}

impl Default for Gate17Config {
    fn default() -> Self {
        Self {
            lot_rounding_risk_deviation_threshold: 0.15,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Gate18Config {
    pub fill_abandonment_rr_frac: f64,
    pub min_abandon_r: f64,
    pub abandon_threshold_min_bps: f64,
    pub passive_fade_timeout_min_sec: f64,
    pub passive_fade_timeout_max_sec: f64,
    pub passive_fade_timeout_base_sec: f64,
}

impl Default for Gate18Config {
    fn default() -> Self {
        Self {
            fill_abandonment_rr_frac: 0.30,
            min_abandon_r: 0.05,
            abandon_threshold_min_bps: 5.0,
            passive_fade_timeout_min_sec: 5.0,
            passive_fade_timeout_max_sec: 120.0,
            passive_fade_timeout_base_sec: 60.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HeatSelectionConfig {
    pub heat_blend_min_reliability: f64,
    pub max_adjusted_heat_pct: f64,
    pub corr_matrix_max_age_sec: f64,
}

impl Default for HeatSelectionConfig {
    fn default() -> Self {
        Self {
            heat_blend_min_reliability: 0.5,
            max_adjusted_heat_pct: 0.03,
            corr_matrix_max_age_sec: 120.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_portfolio_risk_pct: f64,
    pub max_cluster_risk_pct: f64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_portfolio_risk_pct: 0.04,
            max_cluster_risk_pct: 0.02,
        }
    }
}

/// The full, versioned, immutable configuration object threaded by
/// reference into every gate.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GatekeeperConfig {
    pub config_version: u32,
    pub dqs: DqsConfig,
    pub drp: DrpConfig,
    pub heat: HeatConfig,
    pub heat_selection: HeatSelectionConfig,
    pub sizing: SizingConfig,
    pub limits: LimitsConfig,
    pub gate2: Gate2Config,
    pub gate4: Gate4Config,
    pub gate5: Gate5Config,
    pub gate6: Gate6Config,
    pub gate7: Gate7Config,
    pub gate8: Gate8Config,
    pub gate9: Gate9Config,
    pub gate10: Gate10Config,
    pub gate11: Gate11Config,
    pub gate12: Gate12Config,
    pub gate13: Gate13Config,
    pub gate15: Gate15Config,
    pub gate17: Gate17Config,
    pub gate18: Gate18Config,
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            config_version: 1,
            dqs: DqsConfig::default(),
            drp: DrpConfig::default(),
            heat: HeatConfig::default(),
            heat_selection: HeatSelectionConfig::default(),
            sizing: SizingConfig::default(),
            limits: LimitsConfig::default(),
            gate2: Gate2Config::default(),
            gate4: Gate4Config::default(),
            gate5: Gate5Config::default(),
            gate6: Gate6Config::default(),
            gate7: Gate7Config::default(),
            gate8: Gate8Config::default(),
            gate9: Gate9Config::default(),
            gate10: Gate10Config::default(),
            gate11: Gate11Config::default(),
            gate12: Gate12Config::default(),
            gate13: Gate13Config::default(),
            gate15: Gate15Config::default(),
            gate17: Gate17Config::default(),
            gate18: Gate18Config::default(),
        }
    }
}
