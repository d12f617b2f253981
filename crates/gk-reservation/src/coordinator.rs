//! `RiskReservationCoordinator` — the in-memory reservation ledger and the
//! single-writer portfolio-id check-and-swap (spec §4.11).
//!
//! The ledger is a `HashMap<ReservationId, Reservation>` behind one
//! `Mutex`, matching the spec's "scalar reservations... single-writer
//! handle" description — no external datastore, no sharding (a sharded
//! deployment would run one coordinator per shard). Grounded in
//! `mqk-portfolio::ordering`'s canonical-fill-ordering discipline for the
//! commit path and `mqk-isolation::EngineStore`'s scoped in-memory map for
//! the ledger shape; the OCC check-and-swap itself is this crate's own,
//! since neither teacher crate version-guards a mutation the way this one
//! needs to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};
use std::sync::Mutex;

use uuid::Uuid;

use gk_gates::ReservationContext;

use crate::config::ReservationConfig;
use crate::types::{
    LimitsSnapshot, Reservation, ReservationError, ReservationRequest, ReservationState,
    TaggedFill,
};

struct Inner {
    reservations: HashMap<Uuid, Reservation>,
    portfolio_id: u64,
}

pub struct RiskReservationCoordinator {
    inner: Mutex<Inner>,
    writer_queue_depth: AtomicU32,
    orphan_sweep_in_progress: AtomicBool,
    heartbeat_loss_streak: AtomicU32,
}

impl Default for RiskReservationCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskReservationCoordinator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { reservations: HashMap::new(), portfolio_id: 0 }),
            writer_queue_depth: AtomicU32::new(0),
            orphan_sweep_in_progress: AtomicBool::new(false),
            heartbeat_loss_streak: AtomicU32::new(0),
        }
    }

    pub fn current_portfolio_id(&self) -> u64 {
        self.inner.lock().expect("reservation ledger mutex poisoned").portfolio_id
    }

    /// Sum of `reserved_*_pct` across all still-`Reserved` records, used by
    /// the caller to enforce I9 (`current + reserved + inflight <= limits`).
    fn inflight_sums(inner: &Inner, cluster_id: &gk_domain::ClusterId) -> (f64, f64, f64) {
        let mut cluster = 0.0;
        let mut portfolio = 0.0;
        let mut heat = 0.0;
        for r in inner.reservations.values().filter(|r| r.is_active()) {
            portfolio += r.reserved_sum_abs_risk_pct;
            heat += r.reserved_heat_upper_bound_pct;
            if &r.cluster_id == cluster_id {
                cluster += r.reserved_cluster_risk_pct;
            }
        }
        (cluster, portfolio, heat)
    }

    /// Atomic check-and-set: verify the request fits under current +
    /// inflight usage, then insert a new `Reserved` record. Spec §4.11
    /// reservation ledger API `reserve(req) -> {reservation_id|conflict}`.
    pub fn reserve(
        &self,
        req: ReservationRequest,
        limits: &LimitsSnapshot,
        known_snapshot_id: u64,
        now_ms: u64,
        cfg: &ReservationConfig,
    ) -> Result<Uuid, ReservationError> {
        if req.snapshot_id_used != known_snapshot_id {
            return Err(ReservationError::StaleSnapshot);
        }
        let mut inner = self.inner.lock().expect("reservation ledger mutex poisoned");
        let (cluster_inflight, portfolio_inflight, heat_inflight) =
            Self::inflight_sums(&inner, &req.cluster_id);

        if limits.cluster_current_abs_risk_pct + cluster_inflight + req.reserved_cluster_risk_pct
            > limits.cluster_limit_abs_risk_pct
        {
            return Err(ReservationError::ClusterLimitExceeded);
        }
        if limits.portfolio_current_abs_risk_pct + portfolio_inflight + req.reserved_sum_abs_risk_pct
            > limits.portfolio_limit_abs_risk_pct
        {
            return Err(ReservationError::PortfolioLimitExceeded);
        }
        let heat_upper_bound_pct = req.reserved_risk_pct.abs();
        if heat_inflight + heat_upper_bound_pct > limits.heat_budget_remaining_pct {
            return Err(ReservationError::HeatBudgetExceeded);
        }

        let reservation_id = Uuid::new_v4();
        let lease_id = Uuid::new_v4();
        let ttl_sec = cfg.ttl_sec_for(req.order_type);
        let expires_at_ms = now_ms + ttl_sec * 1_000;
        inner.reservations.insert(
            reservation_id,
            Reservation {
                reservation_id,
                snapshot_id_used: req.snapshot_id_used,
                instrument: req.instrument,
                cluster_id: req.cluster_id,
                reserved_risk_pct: req.reserved_risk_pct,
                reserved_cluster_risk_pct: req.reserved_cluster_risk_pct,
                reserved_sum_abs_risk_pct: req.reserved_sum_abs_risk_pct,
                reserved_heat_upper_bound_pct: heat_upper_bound_pct,
                order_type: req.order_type,
                state: ReservationState::Reserved,
                created_at_ms: now_ms,
                expires_at_ms,
                lease_id,
                lease_renewal_deadline_ms: expires_at_ms,
                last_renewed_ms: now_ms,
                last_heartbeat_ms: now_ms,
            },
        );
        Ok(reservation_id)
    }

    /// Independent liveness signal, separate from lease renewal. A missed
    /// heartbeat beyond `reservation_heartbeat_grace_ms` is swept by
    /// [`Self::sweep_lost_heartbeats`].
    pub fn heartbeat(&self, reservation_id: Uuid, now_ms: u64) -> Result<(), ReservationError> {
        let mut inner = self.inner.lock().expect("reservation ledger mutex poisoned");
        let r = inner
            .reservations
            .get_mut(&reservation_id)
            .ok_or(ReservationError::UnknownReservation)?;
        if !r.is_active() {
            return Err(ReservationError::AlreadyTerminal);
        }
        r.last_heartbeat_ms = now_ms;
        Ok(())
    }

    /// Renews the lease on an active-order FSM transition, throttled to at
    /// most once per `reservation_renewal_min_period_sec`. A call inside the
    /// throttle window is a silent no-op, not an error.
    pub fn renew(&self, reservation_id: Uuid, now_ms: u64, cfg: &ReservationConfig) -> Result<(), ReservationError> {
        let mut inner = self.inner.lock().expect("reservation ledger mutex poisoned");
        let r = inner
            .reservations
            .get_mut(&reservation_id)
            .ok_or(ReservationError::UnknownReservation)?;
        if !r.is_active() {
            return Err(ReservationError::AlreadyTerminal);
        }
        let min_period_ms = cfg.reservation_renewal_min_period_sec * 1_000;
        if now_ms.saturating_sub(r.last_renewed_ms) < min_period_ms {
            return Ok(());
        }
        let ttl_sec = cfg.ttl_sec_for(r.order_type);
        r.expires_at_ms = now_ms + ttl_sec * 1_000;
        r.lease_renewal_deadline_ms = r.expires_at_ms;
        r.last_renewed_ms = now_ms;
        Ok(())
    }

    pub fn cancel(&self, reservation_id: Uuid) -> Result<(), ReservationError> {
        let mut inner = self.inner.lock().expect("reservation ledger mutex poisoned");
        let r = inner
            .reservations
            .get_mut(&reservation_id)
            .ok_or(ReservationError::UnknownReservation)?;
        match r.state {
            ReservationState::Reserved => {
                r.state = ReservationState::Cancelled;
                Ok(())
            }
            // RESERVE -> CANCEL/EXPIRE is idempotent in reservation_id (I9).
            ReservationState::Cancelled | ReservationState::Expired => Ok(()),
            ReservationState::Committed => Err(ReservationError::AlreadyTerminal),
        }
    }

    /// Two-phase fill commit, step 2: the writer's OCC check-and-swap.
    /// `expected_portfolio_id` is the `portfolio_id` the caller's snapshot
    /// was read at; a mismatch means another commit landed first and the
    /// caller must refresh its snapshot and recheck limits before retrying
    /// (spec §4.11: "on conflict refresh snapshot and recheck limits").
    /// Commit is idempotent in `reservation_id`: a repeat commit of an
    /// already-`Committed` reservation is a no-op returning the current
    /// `portfolio_id`.
    pub fn commit(&self, fill: &TaggedFill, expected_portfolio_id: u64, now_ms: u64) -> Result<u64, ReservationError> {
        let mut inner = self.inner.lock().expect("reservation ledger mutex poisoned");
        let portfolio_id = inner.portfolio_id;
        let r = inner
            .reservations
            .get(&fill.reservation_id)
            .ok_or(ReservationError::UnknownReservation)?;
        match r.state {
            ReservationState::Committed => return Ok(portfolio_id),
            ReservationState::Cancelled => return Err(ReservationError::AlreadyTerminal),
            ReservationState::Expired => return Err(ReservationError::ReservationExpiredFill),
            ReservationState::Reserved => {}
        }
        if now_ms > r.expires_at_ms {
            inner.reservations.get_mut(&fill.reservation_id).unwrap().state = ReservationState::Expired;
            return Err(ReservationError::ReservationExpiredFill);
        }
        if expected_portfolio_id != portfolio_id {
            tracing::warn!(expected_portfolio_id, portfolio_id, "reservation commit OCC conflict");
            return Err(ReservationError::OccConflict { current_portfolio_id: portfolio_id });
        }
        inner.portfolio_id += 1;
        let new_id = inner.portfolio_id;
        inner.reservations.get_mut(&fill.reservation_id).unwrap().state = ReservationState::Committed;
        Ok(new_id)
    }

    /// Retries [`Self::commit`] up to `cfg.commit_retry_count` times,
    /// calling `refresh` between attempts to obtain a fresh
    /// `expected_portfolio_id` after an OCC conflict.
    pub fn commit_with_retries(
        &self,
        fill: &TaggedFill,
        now_ms: u64,
        cfg: &ReservationConfig,
        mut refresh: impl FnMut() -> u64,
    ) -> Result<u64, ReservationError> {
        let mut expected = refresh();
        for _ in 0..=cfg.commit_retry_count {
            match self.commit(fill, expected, now_ms) {
                Err(ReservationError::OccConflict { current_portfolio_id }) => {
                    expected = current_portfolio_id.max(refresh());
                }
                other => return other,
            }
        }
        Err(ReservationError::OccRetriesExhausted)
    }

    /// TTL sweep: releases `Reserved` records past `expires_at_ms`.
    pub fn sweep_expired(&self, now_ms: u64) -> Vec<Uuid> {
        let mut inner = self.inner.lock().expect("reservation ledger mutex poisoned");
        let mut expired = Vec::new();
        for r in inner.reservations.values_mut() {
            if r.is_active() && now_ms > r.expires_at_ms {
                r.state = ReservationState::Expired;
                expired.push(r.reservation_id);
            }
        }
        expired
    }

    /// Heartbeat sweep: releases `Reserved` records whose heartbeat has
    /// gone silent beyond `reservation_heartbeat_grace_ms`, tracking a
    /// consecutive-loss streak for the caller to escalate DRP on repetition.
    pub fn sweep_lost_heartbeats(&self, now_ms: u64, cfg: &ReservationConfig) -> Vec<Uuid> {
        let mut inner = self.inner.lock().expect("reservation ledger mutex poisoned");
        let mut lost = Vec::new();
        for r in inner.reservations.values_mut() {
            if r.is_active() && now_ms.saturating_sub(r.last_heartbeat_ms) > cfg.reservation_heartbeat_grace_ms {
                r.state = ReservationState::Expired;
                lost.push(r.reservation_id);
            }
        }
        if lost.is_empty() {
            self.heartbeat_loss_streak.store(0, AtomicOrdering::Relaxed);
        } else {
            let streak = self.heartbeat_loss_streak.fetch_add(1, AtomicOrdering::Relaxed) + 1;
            tracing::warn!(count = lost.len(), streak, "reservation heartbeat lost, releasing");
        }
        lost
    }

    /// Whether the consecutive heartbeat-loss streak has crossed the
    /// repetition threshold that should force DRP to `DEFENSIVE`.
    pub fn heartbeat_loss_repeated(&self, cfg: &ReservationConfig) -> bool {
        self.heartbeat_loss_streak.load(AtomicOrdering::Relaxed) >= cfg.heartbeat_loss_repetition_threshold
    }

    pub fn begin_orphan_sweep(&self) {
        self.orphan_sweep_in_progress.store(true, AtomicOrdering::SeqCst);
    }

    pub fn end_orphan_sweep(&self) {
        self.orphan_sweep_in_progress.store(false, AtomicOrdering::SeqCst);
    }

    pub fn is_orphan_sweep_in_progress(&self) -> bool {
        self.orphan_sweep_in_progress.load(AtomicOrdering::SeqCst)
    }

    /// Exchange-side orders without a matching local reservation are
    /// orphans; local reservations without a matching exchange order id are
    /// the mirror case. Either reconciliation needs the exchange-side order
    /// list, which this crate does not hold — the caller (the execution
    /// shadow in the wiring layer) drives reconciliation and only asks this
    /// ledger whether a given id is still known.
    pub fn is_known(&self, reservation_id: Uuid) -> bool {
        self.inner
            .lock()
            .expect("reservation ledger mutex poisoned")
            .reservations
            .contains_key(&reservation_id)
    }

    pub fn note_writer_task_enqueued(&self) {
        self.writer_queue_depth.fetch_add(1, AtomicOrdering::SeqCst);
    }

    pub fn note_writer_task_dequeued(&self) {
        self.writer_queue_depth.fetch_sub(1, AtomicOrdering::SeqCst);
    }

    pub fn writer_queue_depth(&self) -> u32 {
        self.writer_queue_depth.load(AtomicOrdering::SeqCst)
    }

    pub fn get(&self, reservation_id: Uuid) -> Option<Reservation> {
        self.inner
            .lock()
            .expect("reservation ledger mutex poisoned")
            .reservations
            .get(&reservation_id)
            .cloned()
    }

    /// Builds the frozen `ReservationContext` Gate 16 consumes.
    /// `portfolio_id_used` is the id the caller's admission snapshot was
    /// built against; `current_portfolio_id` is read live from the ledger.
    pub fn context_snapshot(&self, portfolio_id_used: u64, cfg: &ReservationConfig) -> ReservationContext {
        ReservationContext {
            writer_queue_depth: self.writer_queue_depth(),
            writer_queue_hard_cap: cfg.writer_queue_hard_cap,
            orphan_sweep_in_progress: self.is_orphan_sweep_in_progress(),
            portfolio_id_used,
            current_portfolio_id: self.current_portfolio_id(),
        }
    }
}
