//! gk-dqs
//!
//! Data Quality Score evaluator (spec §4.5, C6). Feeds Gate 0's hard-gate
//! check and the DRP state machine; emits `dqs_mult`, the risk multiplier
//! carried through Gate 13's REM chain.

use gk_domain::DataQualityInputs;
use gk_numerics::clip;

/// Per-source staleness weights and hard thresholds (spec §4.5 `staleness_hard_i`).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DqsConfig {
    pub price_staleness_hard_ms: f64,
    pub volatility_staleness_hard_ms: f64,
    pub orderbook_staleness_hard_ms: f64,
    pub derivatives_staleness_hard_ms: f64,
    pub price_weight: f64,
    pub volatility_weight: f64,
    pub orderbook_weight: f64,
    pub derivatives_weight: f64,
    pub dqs_weight_critical: f64,
    pub dqs_sources_min: f64,
    pub xdev_block_bps: f64,
    pub cross_source_staleness_hard_ms: f64,
    pub oracle_dev_block_frac: f64,
    pub oracle_staleness_hard_ms: f64,
    pub dqs_degraded_threshold: f64,
    pub dqs_emergency_threshold: f64,
}

impl Default for DqsConfig {
    fn default() -> Self {
        Self {
            price_staleness_hard_ms: 2000.0,
            volatility_staleness_hard_ms: 10_000.0,
            orderbook_staleness_hard_ms: 3000.0,
            derivatives_staleness_hard_ms: 15_000.0,
            price_weight: 1.0,
            volatility_weight: 0.6,
            orderbook_weight: 1.0,
            derivatives_weight: 0.4,
            dqs_weight_critical: 0.75,
            dqs_sources_min: 0.50,
            xdev_block_bps: 25.0,
            cross_source_staleness_hard_ms: 5000.0,
            oracle_dev_block_frac: 0.01,
            oracle_staleness_hard_ms: 5000.0,
            dqs_degraded_threshold: 0.70,
            dqs_emergency_threshold: 0.40,
        }
    }
}

/// Stable hard-gate reason codes, a subset of the ones named in spec §6.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HardGateReason {
    CriticalStalenessExceeded,
    CrossSourceDeviationBlock,
    SourcesFloorBreached,
    NonFiniteCriticalField,
    SuspectedDataGlitch,
    OracleSanityBlock,
    StaleBookFreshPrice,
}

impl HardGateReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::CriticalStalenessExceeded => "dqs_hard_gate_block",
            Self::CrossSourceDeviationBlock => "dqs_hard_gate_block",
            Self::SourcesFloorBreached => "dqs_hard_gate_block",
            Self::NonFiniteCriticalField => "dqs_hard_gate_block",
            Self::SuspectedDataGlitch => "dqs_hard_gate_block",
            Self::OracleSanityBlock => "oracle_sanity_block",
            Self::StaleBookFreshPrice => "stale_book_glitch_block",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DqsOutcome {
    pub dqs_sources: f64,
    pub dqs_critical: f64,
    pub dqs_noncritical: f64,
    pub dqs: f64,
    pub dqs_mult: f64,
    pub hard_gate: Option<HardGateReason>,
}

impl DqsOutcome {
    pub fn is_hard_gated(&self) -> bool {
        self.hard_gate.is_some()
    }
}

fn src_score(staleness_ms: f64, hard_ms: f64) -> f64 {
    clip(1.0 - staleness_ms / hard_ms.max(1e-9), 0.0, 1.0)
}

/// Evaluate the full DQS pipeline for one `DataQualityInputs` reading.
pub fn evaluate(inputs: &DataQualityInputs, cfg: &DqsConfig) -> DqsOutcome {
    let price_score = src_score(inputs.price_staleness_ms, cfg.price_staleness_hard_ms);
    let vol_score = src_score(inputs.volatility_staleness_ms, cfg.volatility_staleness_hard_ms);
    let book_score = src_score(inputs.orderbook_staleness_ms, cfg.orderbook_staleness_hard_ms);
    let deriv_score = src_score(inputs.derivatives_staleness_ms, cfg.derivatives_staleness_hard_ms);
    let integrity_score = if inputs.orderbook_integrity_ok { 1.0 } else { 0.0 };

    let weighted_sum = price_score * cfg.price_weight
        + vol_score * cfg.volatility_weight
        + book_score * cfg.orderbook_weight
        + deriv_score * cfg.derivatives_weight;
    let weight_total = cfg.price_weight + cfg.volatility_weight + cfg.orderbook_weight + cfg.derivatives_weight;
    let dqs_sources = weighted_sum / weight_total.max(1e-9);

    let dqs_critical = price_score.min(vol_score).min(book_score).min(integrity_score);
    let dqs_noncritical = (deriv_score + inputs.completeness_frac.clamp(0.0, 1.0)) / 2.0;
    let dqs_raw = cfg.dqs_weight_critical * dqs_critical + (1.0 - cfg.dqs_weight_critical) * dqs_noncritical;

    let hard_gate = detect_hard_gate(inputs, cfg, price_score, vol_score, book_score, dqs_sources);
    let dqs = if hard_gate.is_some() { 0.0 } else { dqs_raw };

    let span = (cfg.dqs_degraded_threshold - cfg.dqs_emergency_threshold).max(1e-9);
    let dqs_mult = clip((dqs - cfg.dqs_emergency_threshold) / span, 0.0, 1.0);

    DqsOutcome {
        dqs_sources,
        dqs_critical,
        dqs_noncritical,
        dqs,
        dqs_mult,
        hard_gate,
    }
}

fn detect_hard_gate(
    inputs: &DataQualityInputs,
    cfg: &DqsConfig,
    price_score: f64,
    vol_score: f64,
    book_score: f64,
    dqs_sources: f64,
) -> Option<HardGateReason> {
    if inputs.any_critical_field_non_finite {
        return Some(HardGateReason::NonFiniteCriticalField);
    }
    if inputs.suspected_data_glitch {
        return Some(HardGateReason::SuspectedDataGlitch);
    }
    if inputs.stale_book_glitch {
        return Some(HardGateReason::StaleBookFreshPrice);
    }
    if price_score <= 0.0 || vol_score <= 0.0 || book_score <= 0.0 || !inputs.orderbook_integrity_ok {
        return Some(HardGateReason::CriticalStalenessExceeded);
    }
    if let Some(cross_staleness) = inputs.cross_source_staleness_ms {
        if cross_staleness <= cfg.cross_source_staleness_hard_ms && inputs.xdev_bps >= cfg.xdev_block_bps {
            return Some(HardGateReason::CrossSourceDeviationBlock);
        }
    }
    if dqs_sources < cfg.dqs_sources_min {
        return Some(HardGateReason::SourcesFloorBreached);
    }
    if let (Some(dev), Some(staleness)) = (inputs.oracle_dev_frac, inputs.oracle_staleness_ms) {
        if dev >= cfg.oracle_dev_block_frac && staleness <= cfg.oracle_staleness_hard_ms {
            return Some(HardGateReason::OracleSanityBlock);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_inputs() -> DataQualityInputs {
        DataQualityInputs {
            suspected_data_glitch: false,
            stale_book_glitch: false,
            price_staleness_ms: 100.0,
            volatility_staleness_ms: 500.0,
            orderbook_staleness_ms: 200.0,
            orderbook_integrity_ok: true,
            derivatives_staleness_ms: 1000.0,
            completeness_frac: 0.98,
            cross_source_staleness_ms: Some(100.0),
            xdev_bps: 2.0,
            oracle_price: Some(100.0),
            oracle_dev_frac: Some(0.0005),
            oracle_staleness_ms: Some(200.0),
            toxic_flow_suspected: false,
            any_critical_field_non_finite: false,
        }
    }

    #[test]
    fn clean_snapshot_yields_high_dqs_and_no_hard_gate() {
        let out = evaluate(&clean_inputs(), &DqsConfig::default());
        assert!(out.hard_gate.is_none());
        assert!(out.dqs > 0.90, "dqs={}", out.dqs);
        assert!((out.dqs_mult - 1.0).abs() < 1e-9);
    }

    #[test]
    fn price_staleness_beyond_hard_zeros_dqs() {
        let mut inputs = clean_inputs();
        inputs.price_staleness_ms = 3000.0; // > 2000 hard
        let out = evaluate(&inputs, &DqsConfig::default());
        assert_eq!(out.hard_gate, Some(HardGateReason::CriticalStalenessExceeded));
        assert_eq!(out.dqs, 0.0);
        assert_eq!(out.dqs_mult, 0.0);
        assert_eq!(out.hard_gate.unwrap().code(), "dqs_hard_gate_block");
    }

    #[test]
    fn oracle_sanity_block_requires_both_conditions() {
        let mut inputs = clean_inputs();
        inputs.oracle_dev_frac = Some(0.02);
        inputs.oracle_staleness_ms = Some(200.0);
        let out = evaluate(&inputs, &DqsConfig::default());
        assert_eq!(out.hard_gate, Some(HardGateReason::OracleSanityBlock));
        assert_eq!(out.hard_gate.unwrap().code(), "oracle_sanity_block");
    }

    #[test]
    fn oracle_deviation_alone_with_stale_oracle_does_not_block() {
        let mut inputs = clean_inputs();
        inputs.oracle_dev_frac = Some(0.02);
        inputs.oracle_staleness_ms = Some(50_000.0); // stale, so not "valid"
        let out = evaluate(&inputs, &DqsConfig::default());
        assert_ne!(out.hard_gate, Some(HardGateReason::OracleSanityBlock));
    }

    #[test]
    fn dqs_mult_interpolates_between_thresholds() {
        let cfg = DqsConfig::default();
        // Construct a non-hard-gated DQS of ~0.55 by degrading noncritical completeness.
        let mut inputs = clean_inputs();
        inputs.completeness_frac = 0.0;
        inputs.derivatives_staleness_ms = cfg.derivatives_staleness_hard_ms; // deriv score -> 0
        let out = evaluate(&inputs, &cfg);
        assert!(out.dqs_mult > 0.0 && out.dqs_mult < 1.0, "dqs={} mult={}", out.dqs, out.dqs_mult);
    }
}
