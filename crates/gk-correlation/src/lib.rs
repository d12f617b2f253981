//! gk-correlation
//!
//! Correlation-matrix algebra and snapshot publication (spec §4.4, C5).
//! The hot admission path never computes a correlation matrix itself; it
//! only ever reads an already-published, already-validated
//! [`publisher::CorrelationSnapshot`].

pub mod algebra;
pub mod publisher;

pub use algebra::{
    blend, clip_diagonal, clip_eigenvalues, ema_smooth_gamma, min_eigenvalue, normalize_unit_diagonal, project_psd_higham, psd_check,
    regularize_if_needed, shrink, stress_transform, symmetrize, PsdCheck, StressMode, DIAG_EPS, PSD_DIAG_FLOOR, PSD_EIG_FLOOR,
};
pub use publisher::{CorrelationPublisher, CorrelationSnapshot, CorrelationSnapshotStore, PublishParams};
