//! `gatekeeper evaluate` — reads a JSON snapshot bundle from a file or
//! stdin, runs it through `gk_gates::evaluate_entry_signal`, and prints the
//! decision as JSON. Grounded in `mqk-cli::commands::run`'s pattern of
//! loading config, running one engine call, and printing the structured
//! result — narrowed from a DB-backed run lifecycle to a single stateless
//! evaluation.
//!
//! Before the gate chain runs, this command drives the DQS -> DRP flow
//! (spec §2): `gk_dqs::evaluate` scores the incoming market data, and that
//! score plus the evidence fields below feed `gk_drp::DrpMachine::evaluate`.
//! The machine's state is the engine's memory across ticks, so it's
//! persisted as JSON next to the audit log rather than re-derived fresh on
//! every invocation.

use std::io::Read;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::json;

use gk_domain::{EngineSignal, MarketState, MleOutput, PortfolioState, RecoveryCause, RegimeHint};
use gk_drp::{DrpEvidence, DrpMachine};
use gk_gates::{EvaluationInput, GatekeeperConfig, ImpactCurve, MrcInput, ReservationContext};

/// A `CorrelationSnapshot` carries a `DMatrix`, which has no serde support
/// in this workspace's nalgebra feature set; the bundle instead ships the
/// matrix as nested rows and the CLI assembles the real snapshot type.
#[derive(Deserialize)]
struct CorrelationSnapshotBundle {
    snapshot_id: u64,
    computed_at_ms: u64,
    valid_from_ms: u64,
    gamma_s: f64,
    instruments: Vec<String>,
    matrix_rows: Vec<Vec<f64>>,
}

impl CorrelationSnapshotBundle {
    fn validate_square(&self, label: &str) -> Result<usize> {
        let n = self.instruments.len();
        if self.matrix_rows.len() != n || self.matrix_rows.iter().any(|row| row.len() != n) {
            bail!("{label}: matrix_rows must be {n}x{n} to match {n} instruments, got {} rows", self.matrix_rows.len());
        }
        Ok(n)
    }

    fn into_snapshot(self) -> gk_correlation::CorrelationSnapshot {
        let n = self.matrix_rows.len();
        let flat: Vec<f64> = self.matrix_rows.into_iter().flatten().collect();
        let matrix = nalgebra::DMatrix::from_row_slice(n, n, &flat);
        gk_correlation::CorrelationSnapshot {
            id: gk_domain::SnapshotId::new(self.snapshot_id),
            computed_at_ms: self.computed_at_ms,
            valid_from_ms: self.valid_from_ms,
            gamma_s: self.gamma_s,
            sha256: String::new(),
            instruments: self.instruments,
            matrix,
        }
    }
}

/// Evidence the gate chain itself has no way to derive (spec §4.6): the
/// compounding/reservation/ADL/oracle escalation triggers, and the
/// operator's sign-off to leave `Hibernate`. Everything else `DrpEvidence`
/// needs — `dqs`, `hard_gate_triggered`, `oracle_block`, `atr_z_short` — is
/// derived from `market_state` and the DQS outcome below.
#[derive(Deserialize, Default)]
#[serde(default)]
struct DrpEvidenceBundle {
    compounding_domain_violation: bool,
    reservation_expired_fill: bool,
    adl_critical: bool,
    crisis_index: f64,
    recovery_cause_if_cleared: Option<RecoveryCause>,
    operator_ack: bool,
}

#[derive(Deserialize)]
struct SnapshotBundle {
    mrc_regime: MrcInput,
    baseline_regime: RegimeHint,
    engine_signal: EngineSignal,
    mle_output: Option<MleOutput>,
    required_feature_schema_version: u32,
    market_state: MarketState,
    portfolio_state: PortfolioState,
    #[serde(default)]
    drp_evidence: DrpEvidenceBundle,
    now_ms: u64,
    candidate_risk_index: usize,
    c_psd: CorrelationSnapshotBundle,
    c_blend: CorrelationSnapshotBundle,
    c_stress_portfolio: Vec<Vec<f64>>,
    #[serde(default)]
    reservation: ReservationContext,
    impact_curve: ImpactCurve,
    #[serde(default)]
    price_prev: f64,
    #[serde(default)]
    recent_prices: Vec<f64>,
    #[serde(default)]
    estimated_liquidation_price: Option<f64>,
}

impl SnapshotBundle {
    /// Dimension agreement between the three correlation matrices is
    /// checked here, at the input boundary, rather than left to panic
    /// inside nalgebra once Gate 12/13 multiply them.
    fn validate_dimensions(&self) -> Result<()> {
        let n_psd = self.c_psd.validate_square("c_psd")?;
        let n_blend = self.c_blend.validate_square("c_blend")?;
        let n_stress = self.c_stress_portfolio.len();
        if self.c_stress_portfolio.iter().any(|row| row.len() != n_stress) {
            bail!("c_stress_portfolio must be square, got {n_stress} rows of uneven width");
        }
        if n_psd != n_blend || n_psd != n_stress {
            bail!("correlation matrix dimensions disagree: c_psd={n_psd}, c_blend={n_blend}, c_stress_portfolio={n_stress}");
        }
        Ok(())
    }

    fn into_evaluation_input(self, drp_state: gk_domain::DrpState) -> EvaluationInput {
        let n = self.c_stress_portfolio.len();
        let flat: Vec<f64> = self.c_stress_portfolio.into_iter().flatten().collect();
        let c_stress_portfolio = nalgebra::DMatrix::from_row_slice(n, n, &flat);

        EvaluationInput {
            mrc_regime: self.mrc_regime,
            baseline_regime: self.baseline_regime,
            engine_signal: self.engine_signal,
            mle_output: self.mle_output,
            required_feature_schema_version: self.required_feature_schema_version,
            market_state: self.market_state,
            portfolio_state: self.portfolio_state,
            drp_state,
            now_ms: self.now_ms,
            candidate_risk_index: self.candidate_risk_index,
            c_psd: std::sync::Arc::new(self.c_psd.into_snapshot()),
            c_blend: std::sync::Arc::new(self.c_blend.into_snapshot()),
            c_stress_portfolio,
            reservation: self.reservation,
            impact_curve: self.impact_curve,
            price_prev: self.price_prev,
            recent_prices: self.recent_prices,
            estimated_liquidation_price: self.estimated_liquidation_price,
        }
    }
}

fn load_drp_machine(path: &Option<String>) -> Result<DrpMachine> {
    match path {
        Some(p) if std::path::Path::new(p).exists() => {
            let raw = std::fs::read_to_string(p).with_context(|| format!("read DRP state: {p}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parse DRP state: {p}"))
        }
        _ => Ok(DrpMachine::new()),
    }
}

fn save_drp_machine(path: &Option<String>, machine: &DrpMachine) -> Result<()> {
    if let Some(p) = path {
        let raw = serde_json::to_string_pretty(machine).context("serialize DRP state")?;
        std::fs::write(p, raw).with_context(|| format!("write DRP state: {p}"))?;
    }
    Ok(())
}

pub fn run(input_path: Option<String>, config_paths: Vec<String>, audit_log: Option<String>, drp_state_path: Option<String>) -> Result<()> {
    let raw = match input_path {
        Some(p) => std::fs::read_to_string(&p).with_context(|| format!("read snapshot bundle: {p}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("read snapshot bundle from stdin")?;
            buf
        }
    };
    let bundle: SnapshotBundle = serde_json::from_str(&raw).context("parse snapshot bundle JSON")?;
    bundle.validate_dimensions()?;
    let signal_id = format!("{}@{}", bundle.engine_signal.instrument, bundle.now_ms);

    let cfg = if config_paths.is_empty() {
        GatekeeperConfig::default()
    } else {
        let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
        gk_config::load_layered_yaml(&path_refs)?.config
    };

    // DQS -> DRP transitions -> gates (spec §2), run in that order ahead of
    // the pure gate chain, which then only reads the resulting DRP state.
    let dqs = gk_dqs::evaluate(&bundle.market_state.data_quality, &cfg.dqs);
    let mut drp_machine = load_drp_machine(&drp_state_path)?;
    let drp_state_before = drp_machine.state();
    let evidence = DrpEvidence {
        hard_gate_triggered: dqs.hard_gate.is_some(),
        dqs: dqs.dqs,
        compounding_domain_violation: bundle.drp_evidence.compounding_domain_violation,
        reservation_expired_fill: bundle.drp_evidence.reservation_expired_fill,
        adl_critical: bundle.drp_evidence.adl_critical,
        oracle_block: dqs.hard_gate == Some(gk_dqs::HardGateReason::OracleSanityBlock),
        crisis_index: bundle.drp_evidence.crisis_index,
        recovery_cause_if_cleared: bundle.drp_evidence.recovery_cause_if_cleared,
        atr_z_short: bundle.market_state.volatility.atr_z_short,
        now_ms: bundle.now_ms,
        operator_ack: bundle.drp_evidence.operator_ack,
    };
    let drp_state = drp_machine.evaluate(&evidence, &cfg.drp);

    let mut writer = match audit_log {
        Some(path) => Some(gk_audit::AuditWriter::resume(&path, uuid::Uuid::new_v4())?),
        None => None,
    };
    if drp_state != drp_state_before {
        if let Some(w) = writer.as_mut() {
            let cause = evidence
                .recovery_cause_if_cleared
                .map(|c| format!("{c:?}"))
                .unwrap_or_else(|| "escalation".to_string());
            w.record_drp_transition(drp_state_before, drp_state, &cause)?;
        }
    }

    let input = bundle.into_evaluation_input(drp_state);
    let decision = gk_gates::evaluate_entry_signal(&input, &cfg);

    if let Some(w) = writer.as_mut() {
        w.record_decision(&signal_id, &decision)?;
    }
    save_drp_machine(&drp_state_path, &drp_machine)?;

    let out = json!({
        "allowed": decision.allowed,
        "size_notional": decision.size_notional,
        "rejection_reason": decision.rejection_reason.map(|r| r.code()),
        "last_gate_evaluated": decision.last_gate_evaluated,
        "diagnostics": decision.diagnostics,
        "drp_state": format!("{:?}", drp_state),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
