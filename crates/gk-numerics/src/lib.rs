//! gk-numerics
//!
//! Safe floating-point primitives shared by every other crate in the
//! workspace. Gate code must never compare floats with bare `==`/`<`; it
//! routes every comparison through [`is_close`] and every division through
//! [`denom_safe_signed`]/[`denom_safe_unsigned`].

use std::fmt;

// ─── Error ─────────────────────────────────────────────────────────────────

/// A numerical domain violation. Fatal for the evaluation that triggered it;
/// callers at the pipeline boundary translate this into a DRP escalation.
#[derive(Clone, Debug, PartialEq)]
pub enum NumericsError {
    /// A log-return input was at or below the compounding floor
    /// (`r <= -1 + compounding_r_floor_eps`); compounding that trade would
    /// require a negative price.
    CompoundingDomainViolation { r: f64, floor_eps: f64 },
    /// A value was NaN/±inf in a context where that is forbidden.
    ForbiddenNonFinite { context: &'static str, value: f64 },
}

impl fmt::Display for NumericsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompoundingDomainViolation { r, floor_eps } => write!(
                f,
                "compounding domain violation: r={r} <= -1+{floor_eps} (floor_eps={floor_eps})"
            ),
            Self::ForbiddenNonFinite { context, value } => {
                write!(f, "non-finite value {value} forbidden in context '{context}'")
            }
        }
    }
}

impl std::error::Error for NumericsError {}

// ─── Safe division ───────────────────────────────────────────────────────────

/// Returns `x` unless `|x| < eps`, in which case returns `±eps` with the sign
/// of `x` preserved (and `+eps` when `x == 0.0`).
pub fn denom_safe_signed(x: f64, eps: f64) -> f64 {
    if x.abs() < eps {
        if x.is_sign_negative() && x != 0.0 {
            -eps
        } else {
            eps
        }
    } else {
        x
    }
}

/// Returns `max(|x|, eps)`.
pub fn denom_safe_unsigned(x: f64, eps: f64) -> f64 {
    x.abs().max(eps)
}

// ─── Safe log return ─────────────────────────────────────────────────────────

/// Default threshold below which `log1p(r)` is used in preference to
/// `(1.0 + r).ln()` for numerical stability near `r == 0`.
pub const LOG1P_SWITCH_THRESHOLD: f64 = 0.01;

/// Default epsilon below `-1.0` that marks the compounding domain floor.
pub const COMPOUNDING_R_FLOOR_EPS: f64 = 1e-6;

/// `log(1 + r)` computed via `log1p` when `|r|` is small (`log1p_switch_threshold`),
/// else via the direct formula. Rejects `r <= -1 + compounding_r_floor_eps`.
pub fn safe_log_return(r: f64, log1p_switch_threshold: f64, compounding_r_floor_eps: f64) -> Result<f64, NumericsError> {
    if r <= -1.0 + compounding_r_floor_eps {
        return Err(NumericsError::CompoundingDomainViolation {
            r,
            floor_eps: compounding_r_floor_eps,
        });
    }
    if r.abs() < log1p_switch_threshold {
        Ok(r.ln_1p())
    } else {
        Ok((1.0 + r).ln())
    }
}

// ─── Sanitize ────────────────────────────────────────────────────────────────

/// Maps NaN/±inf to `fallback`; returns the original value otherwise.
pub fn sanitize(x: f64, fallback: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        fallback
    }
}

/// Like [`sanitize`] but raises [`NumericsError::ForbiddenNonFinite`] instead
/// of substituting a fallback, for contexts where silent substitution would
/// hide a data-quality fault (e.g. critical market-state fields).
pub fn sanitize_or_reject(x: f64, context: &'static str) -> Result<f64, NumericsError> {
    if x.is_finite() {
        Ok(x)
    } else {
        Err(NumericsError::ForbiddenNonFinite { context, value: x })
    }
}

// ─── is_close ────────────────────────────────────────────────────────────────

/// Named tolerance profiles. Every `is_close` call site must pick one
/// explicitly rather than passing ad hoc `(rtol, atol)` pairs, so a reviewer
/// can audit which numeric domain a comparison belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ToleranceContext {
    /// Strict unit-test-grade comparisons of pure math (e.g. PSD round-trips).
    StrictUnit,
    /// Integration-level KPI comparisons (I1 SL=-1R, I7 PF identity).
    IntegrationKpi,
    /// Price-domain comparisons (effective prices, tick-rounded values).
    Prices,
    /// ML-output probability/EV comparisons.
    MlOutputs,
}

impl ToleranceContext {
    /// `(rtol, atol)` for this context.
    pub fn tolerances(self) -> (f64, f64) {
        match self {
            ToleranceContext::StrictUnit => (1e-9, 1e-12),
            ToleranceContext::IntegrationKpi => (1e-3, 1e-6),
            ToleranceContext::Prices => (1e-6, 1e-8),
            ToleranceContext::MlOutputs => (1e-4, 1e-6),
        }
    }
}

/// `|a - b| <= atol + rtol * max(|a|, |b|)` for the given tolerance context.
pub fn is_close(a: f64, b: f64, ctx: ToleranceContext) -> bool {
    let (rtol, atol) = ctx.tolerances();
    (a - b).abs() <= atol + rtol * a.abs().max(b.abs())
}

/// `x` clamped to `[lo, hi]`. Panics in debug builds if `lo > hi` (a config bug).
pub fn clip(x: f64, lo: f64, hi: f64) -> f64 {
    debug_assert!(lo <= hi, "clip: lo ({lo}) > hi ({hi})");
    x.max(lo).min(hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denom_safe_signed_preserves_sign_near_zero() {
        assert_eq!(denom_safe_signed(1e-12, 1e-6), 1e-6);
        assert_eq!(denom_safe_signed(-1e-12, 1e-6), -1e-6);
        assert_eq!(denom_safe_signed(0.0, 1e-6), 1e-6);
        assert_eq!(denom_safe_signed(5.0, 1e-6), 5.0);
        assert_eq!(denom_safe_signed(-5.0, 1e-6), -5.0);
    }

    #[test]
    fn denom_safe_unsigned_floors_magnitude() {
        assert_eq!(denom_safe_unsigned(0.0, 1e-6), 1e-6);
        assert_eq!(denom_safe_unsigned(-2.0, 1e-6), 2.0);
    }

    #[test]
    fn safe_log_return_rejects_at_floor() {
        let err = safe_log_return(-1.0, LOG1P_SWITCH_THRESHOLD, COMPOUNDING_R_FLOOR_EPS);
        assert!(err.is_err());
        let err2 = safe_log_return(-1.0 + 1e-9, LOG1P_SWITCH_THRESHOLD, COMPOUNDING_R_FLOOR_EPS);
        assert!(err2.is_err());
    }

    #[test]
    fn safe_log_return_matches_ln_for_large_r() {
        let small = safe_log_return(0.5, LOG1P_SWITCH_THRESHOLD, COMPOUNDING_R_FLOOR_EPS).unwrap();
        assert!(is_close(small, 1.5f64.ln(), ToleranceContext::StrictUnit));
    }

    #[test]
    fn safe_log_return_uses_log1p_for_small_r() {
        let r = 0.0001;
        let got = safe_log_return(r, LOG1P_SWITCH_THRESHOLD, COMPOUNDING_R_FLOOR_EPS).unwrap();
        assert!(is_close(got, r.ln_1p(), ToleranceContext::StrictUnit));
    }

    #[test]
    fn sanitize_replaces_non_finite() {
        assert_eq!(sanitize(f64::NAN, 0.0), 0.0);
        assert_eq!(sanitize(f64::INFINITY, 0.0), 0.0);
        assert_eq!(sanitize(3.0, 0.0), 3.0);
    }

    #[test]
    fn sanitize_or_reject_raises_on_nan() {
        assert!(sanitize_or_reject(f64::NAN, "price").is_err());
        assert!(sanitize_or_reject(1.0, "price").is_ok());
    }

    #[test]
    fn is_close_respects_context() {
        assert!(is_close(1.0000001, 1.0, ToleranceContext::IntegrationKpi));
        assert!(!is_close(1.0000001, 1.0, ToleranceContext::StrictUnit));
    }

    #[test]
    fn clip_bounds_value() {
        assert_eq!(clip(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clip(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(clip(0.5, 0.0, 1.0), 0.5);
    }
}
