//! Reservation TTL/heartbeat/OCC tunables (spec §4.11).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationConfig {
    pub reservation_ttl_sec_min_maker: u64,
    pub reservation_ttl_sec_min_taker: u64,
    pub reservation_ttl_sec_min_stop: u64,
    pub passive_fade_hard_timeout_sec: u64,
    pub reservation_renewal_min_period_sec: u64,
    pub reservation_heartbeat_period_ms: u64,
    pub reservation_heartbeat_grace_ms: u64,
    pub commit_retry_count: u32,
    pub max_occ_retries: u32,
    pub writer_queue_hard_cap: u32,
    /// Consecutive heartbeat-loss events before the caller should escalate
    /// DRP to `DEFENSIVE` (spec §4.11: "on repetition").
    pub heartbeat_loss_repetition_threshold: u32,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            reservation_ttl_sec_min_maker: 45,
            reservation_ttl_sec_min_taker: 10,
            reservation_ttl_sec_min_stop: 20,
            passive_fade_hard_timeout_sec: 60,
            reservation_renewal_min_period_sec: 5,
            reservation_heartbeat_period_ms: 2_000,
            reservation_heartbeat_grace_ms: 8_000,
            commit_retry_count: 3,
            max_occ_retries: 5,
            writer_queue_hard_cap: 10_000,
            heartbeat_loss_repetition_threshold: 2,
        }
    }
}

impl ReservationConfig {
    pub fn ttl_sec_for(&self, order_type: crate::OrderType) -> u64 {
        let base = match order_type {
            crate::OrderType::Maker => self.reservation_ttl_sec_min_maker,
            crate::OrderType::Taker => self.reservation_ttl_sec_min_taker,
            crate::OrderType::Stop => self.reservation_ttl_sec_min_stop,
        };
        if matches!(order_type, crate::OrderType::Maker) {
            base.max(self.passive_fade_hard_timeout_sec)
        } else {
            base
        }
    }
}
