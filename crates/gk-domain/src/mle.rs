//! `MLEOutput` — the ML-edge model's verdict on a candidate signal (spec §3).
//! The model itself is an out-of-scope external collaborator; this crate
//! only defines the fixed schema its output must satisfy.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MleDecision {
    Reject,
    Weak,
    Normal,
    Strong,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MleOutput {
    pub model_id: String,
    /// 64 lowercase hex chars.
    pub artifact_sha256: String,
    pub feature_schema_version: u32,
    pub calibration_version: u32,
    pub decision: MleDecision,
    pub risk_mult: f64,
    pub ev_r_price: f64,
    pub p_fail: f64,
    pub p_neutral: f64,
    pub p_success: f64,
    pub p_stopout_noise: Option<f64>,
    pub expected_cost_r_pre_mle: Option<f64>,
    pub expected_cost_r_post_mle: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MleValidationError {
    BadArtifactHash,
    ProbabilitiesOutOfRange,
    ProbabilitiesDoNotSumToOne { sum: String },
    RiskMultOutOfRange,
}

impl std::fmt::Display for MleValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadArtifactHash => write!(f, "artifact_sha256 must be 64 lowercase hex chars"),
            Self::ProbabilitiesOutOfRange => write!(f, "p_success/p_neutral/p_fail must each be in [0,1]"),
            Self::ProbabilitiesDoNotSumToOne { sum } => write!(f, "p_success+p_neutral+p_fail={sum}, expected ~1"),
            Self::RiskMultOutOfRange => write!(f, "risk_mult must be in [0,1]"),
        }
    }
}

impl std::error::Error for MleValidationError {}

const PROB_SUM_TOLERANCE: f64 = 1e-3;

impl MleOutput {
    pub fn validate(&self) -> Result<(), MleValidationError> {
        if self.artifact_sha256.len() != 64 || !self.artifact_sha256.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            return Err(MleValidationError::BadArtifactHash);
        }
        for p in [self.p_success, self.p_neutral, self.p_fail] {
            if !(0.0..=1.0).contains(&p) {
                return Err(MleValidationError::ProbabilitiesOutOfRange);
            }
        }
        let sum = self.p_success + self.p_neutral + self.p_fail;
        if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
            return Err(MleValidationError::ProbabilitiesDoNotSumToOne { sum: sum.to_string() });
        }
        if !(0.0..=1.0).contains(&self.risk_mult) {
            return Err(MleValidationError::RiskMultOutOfRange);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MleOutput {
        MleOutput {
            model_id: "mle-v1".into(),
            artifact_sha256: "a".repeat(64),
            feature_schema_version: 3,
            calibration_version: 1,
            decision: MleDecision::Normal,
            risk_mult: 1.0,
            ev_r_price: 0.35,
            p_fail: 0.40,
            p_neutral: 0.05,
            p_success: 0.55,
            p_stopout_noise: None,
            expected_cost_r_pre_mle: None,
            expected_cost_r_post_mle: None,
        }
    }

    #[test]
    fn valid_output_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_bad_hash() {
        let mut m = sample();
        m.artifact_sha256 = "not-hex".into();
        assert_eq!(m.validate(), Err(MleValidationError::BadArtifactHash));
    }

    #[test]
    fn rejects_probabilities_not_summing_to_one() {
        let mut m = sample();
        m.p_fail = 0.9;
        assert!(matches!(m.validate(), Err(MleValidationError::ProbabilitiesDoNotSumToOne { .. })));
    }

    #[test]
    fn rejects_risk_mult_out_of_range() {
        let mut m = sample();
        m.risk_mult = 1.5;
        assert_eq!(m.validate(), Err(MleValidationError::RiskMultOutOfRange));
    }
}
