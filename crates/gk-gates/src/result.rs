//! Stable rejection reason codes (spec §6) and the final admission decision.

use std::collections::BTreeMap;

/// Closed set of admission-block reason codes. `Display` yields exactly the
/// wire string named in the spec's reason-code table; an allowed decision
/// carries no reason (`""`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    DqsHardGateBlock,
    OracleSanityBlock,
    StaleBookGlitchBlock,
    ManualHaltBlock,
    TradingModeBlock,
    ShadowModeNoTrade,
    MrcConflictBlock,
    RegimeIncompatibleBlock,
    SignalSanityBlock,
    UnitRiskTooSmallBlock,
    UnitRiskBelowMinAtrBlock,
    FeatureSchemaIncompatibleBlock,
    MleReject,
    NetEdgeBelowFloor,
    LiquidityHardBlock,
    SpoofingSuspectedBlock,
    GapGlitchBlock,
    FundingCostBlock,
    FundingNetYieldBlock,
    FundingBlackoutBlock,
    BasisLevelBlock,
    CorrelationExposureBlock,
    NetRrBelowMin,
    BankruptcyGapBlockSingle,
    BankruptcyPortfolioStressBlock,
    LiquidationBufferBlock,
    HeatHardViolation,
    HeatSoftBlockIncrease,
    ForcedHedgeNotEffectiveBlock,
    SizingNotConvergedBlock,
    ImpactHardBlock,
    PortfolioWriterOverloadBlock,
    ReservationConflict,
    StalePortfolioSnapshot,
    PreexecValidationTimeout,
    OrphanSweepInProgressBlock,
    DimensionMismatchBlock,
}

impl RejectionReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::DqsHardGateBlock => "dqs_hard_gate_block",
            Self::OracleSanityBlock => "oracle_sanity_block",
            Self::StaleBookGlitchBlock => "stale_book_glitch_block",
            Self::ManualHaltBlock => "manual_halt_block",
            Self::TradingModeBlock => "trading_mode_block",
            Self::ShadowModeNoTrade => "shadow_mode_no_trade",
            Self::MrcConflictBlock => "mrc_conflict_block",
            Self::RegimeIncompatibleBlock => "regime_incompatible_block",
            Self::SignalSanityBlock => "signal_sanity_block",
            Self::UnitRiskTooSmallBlock => "unit_risk_too_small_block",
            Self::UnitRiskBelowMinAtrBlock => "unit_risk_below_min_atr_block",
            Self::FeatureSchemaIncompatibleBlock => "feature_schema_incompatible_block",
            Self::MleReject => "mle_reject",
            Self::NetEdgeBelowFloor => "net_edge_below_floor",
            Self::LiquidityHardBlock => "liquidity_hard_block",
            Self::SpoofingSuspectedBlock => "spoofing_suspected_block",
            Self::GapGlitchBlock => "gap_glitch_block",
            Self::FundingCostBlock => "funding_cost_block",
            Self::FundingNetYieldBlock => "funding_net_yield_block",
            Self::FundingBlackoutBlock => "funding_blackout_block",
            Self::BasisLevelBlock => "basis_level_block",
            Self::CorrelationExposureBlock => "correlation_exposure_block",
            Self::NetRrBelowMin => "net_rr_below_min",
            Self::BankruptcyGapBlockSingle => "bankruptcy_gap_block_single",
            Self::BankruptcyPortfolioStressBlock => "bankruptcy_portfolio_stress_block",
            Self::LiquidationBufferBlock => "liquidation_buffer_block",
            Self::HeatHardViolation => "heat_hard_violation",
            Self::HeatSoftBlockIncrease => "heat_soft_block_increase",
            Self::ForcedHedgeNotEffectiveBlock => "forced_hedge_not_effective_block",
            Self::SizingNotConvergedBlock => "sizing_not_converged_block",
            Self::ImpactHardBlock => "impact_hard_block",
            Self::PortfolioWriterOverloadBlock => "portfolio_writer_overload_block",
            Self::ReservationConflict => "reservation_conflict",
            Self::StalePortfolioSnapshot => "stale_portfolio_snapshot",
            Self::PreexecValidationTimeout => "preexec_validation_timeout",
            Self::OrphanSweepInProgressBlock => "orphan_sweep_in_progress_block",
            Self::DimensionMismatchBlock => "dimension_mismatch_block",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

pub type Diagnostics = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub size_notional: f64,
    pub rejection_reason: Option<RejectionReason>,
    pub diagnostics: Diagnostics,
    pub last_gate_evaluated: u32,
}

impl Decision {
    pub fn reject(reason: RejectionReason, gate: u32, diagnostics: Diagnostics) -> Self {
        Self {
            allowed: false,
            size_notional: 0.0,
            rejection_reason: Some(reason),
            diagnostics,
            last_gate_evaluated: gate,
        }
    }

    /// The reason string exactly as specified by the admission contract:
    /// empty when allowed.
    pub fn reason_string(&self) -> String {
        self.rejection_reason.map(|r| r.code().to_string()).unwrap_or_default()
    }
}
