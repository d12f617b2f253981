//! Off-hot-path correlation snapshot publication (spec §4.4): the publisher
//! runs the algebra pipeline and emits an immutable, content-addressed
//! `CorrelationSnapshot`. Gatekeeper only ever reads finished snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::DMatrix;
use sha2::{Digest, Sha256};

use gk_domain::SnapshotId;

use crate::algebra::{self, StressMode};

#[derive(Clone, Debug)]
pub struct CorrelationSnapshot {
    pub id: SnapshotId,
    pub computed_at_ms: u64,
    pub valid_from_ms: u64,
    pub gamma_s: f64,
    pub sha256: String,
    pub instruments: Vec<String>,
    pub matrix: DMatrix<f64>,
}

impl CorrelationSnapshot {
    /// Snapshot age in seconds relative to `now_ms` (spec §4.4 `matrix_age_sec`).
    pub fn matrix_age_sec(&self, now_ms: u64) -> f64 {
        now_ms.saturating_sub(self.computed_at_ms) as f64 / 1000.0
    }

    pub fn is_usable(&self, now_ms: u64, corr_matrix_max_age_sec: f64) -> bool {
        now_ms >= self.valid_from_ms && self.matrix_age_sec(now_ms) <= corr_matrix_max_age_sec
    }
}

fn hash_matrix(instruments: &[String], m: &DMatrix<f64>) -> String {
    let mut hasher = Sha256::new();
    for name in instruments {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    for v in m.iter() {
        hasher.update(v.to_bits().to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Parameters controlling one publication cycle.
#[derive(Clone, Debug)]
pub struct PublishParams {
    pub shrinkage_alpha: f64,
    pub psd_max_iters: usize,
    pub psd_eig_floor: f64,
    pub psd_diag_floor: f64,
    pub diag_eps: f64,
    pub corr_min_eigenvalue_floor: f64,
    pub regularize_alpha: f64,
    pub stress_delta: f64,
    pub stress_mode: StressMode,
    pub prev_gamma: f64,
    pub raw_gamma: f64,
    pub gamma_ema_alpha: f64,
    pub valid_from_delay_ms: u64,
}

impl Default for PublishParams {
    fn default() -> Self {
        Self {
            shrinkage_alpha: 0.1,
            psd_max_iters: 25,
            psd_eig_floor: algebra::PSD_EIG_FLOOR,
            psd_diag_floor: algebra::PSD_DIAG_FLOOR,
            diag_eps: algebra::DIAG_EPS,
            corr_min_eigenvalue_floor: 1e-4,
            regularize_alpha: 0.05,
            stress_delta: 0.4,
            stress_mode: StressMode::Asymmetric,
            prev_gamma: 0.0,
            raw_gamma: 0.0,
            gamma_ema_alpha: 0.3,
            valid_from_delay_ms: 0,
        }
    }
}

pub struct CorrelationPublisher;

impl CorrelationPublisher {
    /// Run the full pipeline over a raw sample correlation matrix and emit a
    /// snapshot. `id` and `computed_at_ms` are supplied by the caller (the
    /// registry/clock, not computed here — this function stays pure).
    pub fn publish(
        id: SnapshotId,
        computed_at_ms: u64,
        instruments: Vec<String>,
        raw: &DMatrix<f64>,
        params: &PublishParams,
    ) -> CorrelationSnapshot {
        let shrunk = algebra::shrink(raw, params.shrinkage_alpha);
        let mut psd = algebra::project_psd_higham(&shrunk, params.psd_max_iters, params.psd_eig_floor, params.diag_eps);
        algebra::clip_diagonal(&mut psd, params.psd_diag_floor);
        psd = algebra::normalize_unit_diagonal(&psd);
        psd = algebra::regularize_if_needed(&psd, params.corr_min_eigenvalue_floor, params.regularize_alpha);

        let stressed_raw = algebra::stress_transform(&psd, params.stress_delta, params.stress_mode);
        let stressed = algebra::project_psd_higham(&stressed_raw, params.psd_max_iters, params.psd_eig_floor, params.diag_eps);

        let gamma_s = algebra::ema_smooth_gamma(params.prev_gamma, params.raw_gamma, params.gamma_ema_alpha);
        let blended = algebra::blend(&psd, &stressed, gamma_s, params.psd_max_iters, params.psd_eig_floor, params.diag_eps);

        let sha256 = hash_matrix(&instruments, &blended);
        CorrelationSnapshot {
            id,
            computed_at_ms,
            valid_from_ms: computed_at_ms + params.valid_from_delay_ms,
            gamma_s,
            sha256,
            instruments,
            matrix: blended,
        }
    }
}

/// Copy-on-write cache of published snapshots, keyed by `SnapshotId`. The
/// Gatekeeper's hot path only ever clones an `Arc`, never the matrix itself.
#[derive(Default)]
pub struct CorrelationSnapshotStore {
    snapshots: HashMap<SnapshotId, Arc<CorrelationSnapshot>>,
    latest: Option<SnapshotId>,
}

impl CorrelationSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: CorrelationSnapshot) -> Arc<CorrelationSnapshot> {
        let id = snapshot.id;
        let arc = Arc::new(snapshot);
        self.snapshots.insert(id, arc.clone());
        self.latest = Some(id);
        arc
    }

    pub fn get(&self, id: SnapshotId) -> Option<Arc<CorrelationSnapshot>> {
        self.snapshots.get(&id).cloned()
    }

    pub fn latest(&self) -> Option<Arc<CorrelationSnapshot>> {
        self.latest.and_then(|id| self.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_produces_unit_diagonal_snapshot() {
        let raw = DMatrix::from_row_slice(2, 2, &[1.0, 0.6, 0.6, 1.0]);
        let snap = CorrelationPublisher::publish(
            SnapshotId::new(1),
            1_000,
            vec!["BTCUSDT".into(), "ETHUSDT".into()],
            &raw,
            &PublishParams::default(),
        );
        assert!((snap.matrix[(0, 0)] - 1.0).abs() < 1e-2);
        assert!((snap.matrix[(1, 1)] - 1.0).abs() < 1e-2);
        assert_eq!(snap.sha256.len(), 64);
    }

    #[test]
    fn staleness_check_respects_max_age() {
        let raw = DMatrix::from_row_slice(2, 2, &[1.0, 0.2, 0.2, 1.0]);
        let snap = CorrelationPublisher::publish(SnapshotId::new(1), 1_000, vec!["A".into(), "B".into()], &raw, &PublishParams::default());
        assert!(snap.is_usable(1_500, 5.0));
        assert!(!snap.is_usable(10_000, 5.0));
    }

    #[test]
    fn store_tracks_latest_snapshot() {
        let mut store = CorrelationSnapshotStore::new();
        let raw = DMatrix::from_row_slice(2, 2, &[1.0, 0.1, 0.1, 1.0]);
        let snap = CorrelationPublisher::publish(SnapshotId::new(7), 0, vec!["A".into(), "B".into()], &raw, &PublishParams::default());
        store.insert(snap);
        assert_eq!(store.latest().unwrap().id, SnapshotId::new(7));
        assert!(store.get(SnapshotId::new(7)).is_some());
    }
}
