//! Correlation-matrix algebra pipeline (spec §4.4):
//! shrinkage -> PSD projection (Higham, bounded iterations, eigenvalue-clip
//! fallback) -> symmetrize -> diagonal clip -> unit-diagonal normalize ->
//! (repeat clip/normalize) -> optional re-regularization -> stress transform
//! -> EMA-blend with the stressed matrix.

use nalgebra::{DMatrix, SymmetricEigen};

/// Defaults from spec §6.
pub const PSD_EIG_FLOOR: f64 = 1e-6;
pub const PSD_DIAG_FLOOR: f64 = 1e-6;
pub const DIAG_EPS: f64 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StressMode {
    BreakHedges,
    PreserveSign,
    Asymmetric,
}

/// Result of the PSD invariant check (I6: `|C_ii-1| < diag_eps` and
/// `lambda_min >= -psd_neg_eig_tol`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PsdCheck {
    pub max_diag_deviation: f64,
    pub min_eigenvalue: f64,
}

impl PsdCheck {
    pub fn passes(&self, diag_eps: f64, psd_neg_eig_tol: f64) -> bool {
        self.max_diag_deviation < diag_eps && self.min_eigenvalue >= -psd_neg_eig_tol
    }
}

/// Shrinkage toward identity: `C' = (1-alpha)*C + alpha*I`.
pub fn shrink(m: &DMatrix<f64>, alpha: f64) -> DMatrix<f64> {
    let n = m.nrows();
    let identity = DMatrix::<f64>::identity(n, n);
    m * (1.0 - alpha) + identity * alpha
}

pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

fn eigenvalues(m: &DMatrix<f64>) -> Vec<f64> {
    let eig = SymmetricEigen::new(m.clone());
    eig.eigenvalues.iter().copied().collect()
}

pub fn min_eigenvalue(m: &DMatrix<f64>) -> f64 {
    eigenvalues(m).into_iter().fold(f64::INFINITY, f64::min)
}

/// Clip all eigenvalues below `floor` up to `floor`, then reconstruct.
/// This is the fallback path when Higham's alternating projection does not
/// converge within the iteration budget.
pub fn clip_eigenvalues(m: &DMatrix<f64>, floor: f64) -> DMatrix<f64> {
    let eig = SymmetricEigen::new(m.clone());
    let clipped: Vec<f64> = eig.eigenvalues.iter().map(|&l| l.max(floor)).collect();
    let d = DMatrix::<f64>::from_diagonal(&nalgebra::DVector::from_vec(clipped));
    &eig.eigenvectors * d * eig.eigenvectors.transpose()
}

/// Clip the diagonal up to `floor` (guards against a shrinkage/stress pass
/// producing a near-zero or negative variance entry).
pub fn clip_diagonal(m: &mut DMatrix<f64>, floor: f64) {
    let n = m.nrows();
    for i in 0..n {
        if m[(i, i)] < floor {
            m[(i, i)] = floor;
        }
    }
}

/// `D^{-1/2} C D^{-1/2}` — rescale so the diagonal is exactly 1.
pub fn normalize_unit_diagonal(m: &DMatrix<f64>) -> DMatrix<f64> {
    let n = m.nrows();
    let mut d_inv_sqrt = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        let v = m[(i, i)].max(1e-12);
        d_inv_sqrt[(i, i)] = 1.0 / v.sqrt();
    }
    &d_inv_sqrt * m * &d_inv_sqrt
}

/// Higham-style PSD projection: alternately project onto the PSD cone
/// (eigenvalue clip to `eig_floor`) and re-normalize the diagonal to 1,
/// bounded to `max_iters`. If the result is still not within `diag_eps` of
/// unit diagonal after the loop, fall back to a single hard eigenvalue clip
/// plus one normalization pass (spec §4.4 "fallback to eigenvalue clip").
pub fn project_psd_higham(m: &DMatrix<f64>, max_iters: usize, eig_floor: f64, diag_eps: f64) -> DMatrix<f64> {
    let mut current = symmetrize(m);
    for _ in 0..max_iters {
        current = clip_eigenvalues(&current, eig_floor);
        current = normalize_unit_diagonal(&current);
        let max_dev = (0..current.nrows())
            .map(|i| (current[(i, i)] - 1.0).abs())
            .fold(0.0_f64, f64::max);
        if max_dev < diag_eps {
            return current;
        }
    }
    // Fallback: one more hard clip + normalize, accepting whatever residual
    // diagonal deviation remains (still bounded by construction).
    let fallback = clip_eigenvalues(&current, eig_floor);
    normalize_unit_diagonal(&fallback)
}

/// If `lambda_min(m) < corr_min_eigenvalue_floor`, regularize with `alpha*I`
/// then re-normalize to unit diagonal.
pub fn regularize_if_needed(m: &DMatrix<f64>, corr_min_eigenvalue_floor: f64, alpha: f64) -> DMatrix<f64> {
    if min_eigenvalue(m) < corr_min_eigenvalue_floor {
        normalize_unit_diagonal(&shrink(m, alpha))
    } else {
        m.clone()
    }
}

/// Per-pair stress transform (spec §4.4). `delta` in `(0,1]` moves each
/// off-diagonal pair toward its stressed counterpart.
pub fn stress_transform(m: &DMatrix<f64>, delta: f64, mode: StressMode) -> DMatrix<f64> {
    let n = m.nrows();
    let mut out = m.clone();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let rho = m[(i, j)];
            let stressed = match mode {
                // Correlations collapse toward +1 under stress: hedges stop working.
                StressMode::BreakHedges => rho + delta * (1.0 - rho),
                // Magnitude increases toward 1 but sign of the original correlation
                // is preserved (a negative correlation gets "more negative").
                StressMode::PreserveSign => rho.signum() * (rho.abs() + delta * (1.0 - rho.abs())),
                // Asymmetric (default): positive correlations break toward +1
                // harder than negative correlations do, matching the empirical
                // "flight to the same exit" pattern in a risk-off move.
                StressMode::Asymmetric => {
                    if rho >= 0.0 {
                        rho + delta * (1.0 - rho)
                    } else {
                        rho + (delta * 0.5) * (-1.0 - rho) * -1.0
                    }
                }
            };
            out[(i, j)] = stressed.clamp(-1.0, 1.0);
        }
    }
    out
}

/// `C_blend = (1-gamma)*C_psd + gamma*C_stress`, then re-PSD/normalize.
pub fn blend(c_psd: &DMatrix<f64>, c_stress: &DMatrix<f64>, gamma: f64, max_iters: usize, eig_floor: f64, diag_eps: f64) -> DMatrix<f64> {
    let raw = c_psd * (1.0 - gamma) + c_stress * gamma;
    project_psd_higham(&raw, max_iters, eig_floor, diag_eps)
}

/// EMA-smooth the blend weight `gamma_s` itself (spec §4.4 "EMA-smoothed gamma").
pub fn ema_smooth_gamma(prev_gamma: f64, raw_gamma: f64, alpha: f64) -> f64 {
    alpha * raw_gamma + (1.0 - alpha) * prev_gamma
}

pub fn psd_check(m: &DMatrix<f64>) -> PsdCheck {
    let n = m.nrows();
    let max_diag_deviation = (0..n).map(|i| (m[(i, i)] - 1.0).abs()).fold(0.0_f64, f64::max);
    let min_eigenvalue = min_eigenvalue(m);
    PsdCheck { max_diag_deviation, min_eigenvalue }
}
