//! Monotone identifiers and the logical clock (spec §3 "Identifiers and clocks").
//!
//! Modeled on `mqk-portfolio::fixedpoint::Micros`: a newtype with no
//! `From<u64>` so an unrelated counter can never be silently substituted
//! for a snapshot id or a clock reading.

use serde::{Deserialize, Serialize};

macro_rules! monotone_id {
    ($name:ident) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(u64);

        impl $name {
            #[inline]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u64 {
                self.0
            }

            #[inline]
            pub fn succ(self) -> Self {
                Self(self.0 + 1)
            }
        }
    };
}

monotone_id!(MarketDataId);
monotone_id!(PortfolioId);
monotone_id!(SnapshotId);
monotone_id!(LogicalClockMs);

/// Lamport-style logical clock: `logical_clock_ms = max(external_ts_ms, prev + 1)`.
///
/// Invariant: `logical_clock_ms >= market_state.ts_utc_ms` always holds after
/// [`LogicalClock::advance`]; violating it upstream is a diagnostic event that
/// forces `DRP >= DEFENSIVE` (enforced by the caller in `gk-drp`, not here —
/// this type only guarantees the monotonicity half of the invariant).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LogicalClock {
    current: LogicalClockMs,
}

impl LogicalClock {
    pub fn starting_at(initial_ms: u64) -> Self {
        Self {
            current: LogicalClockMs::new(initial_ms),
        }
    }

    pub fn current(&self) -> LogicalClockMs {
        self.current
    }

    /// Advance the clock against an externally observed timestamp, returning
    /// the new reading. Never moves backward.
    pub fn advance(&mut self, external_ts_ms: u64) -> LogicalClockMs {
        let candidate = external_ts_ms.max(self.current.raw() + 1);
        self.current = LogicalClockMs::new(candidate);
        self.current
    }
}

/// A monotone snapshot id allocator plus max-age enforcement (spec §3
/// "Snapshots are immutable once published; staleness beyond
/// `snapshot_max_age_ms` invalidates them for admission").
#[derive(Debug)]
pub struct SnapshotRegistry {
    next: SnapshotId,
}

impl Default for SnapshotRegistry {
    fn default() -> Self {
        Self {
            next: SnapshotId::new(1),
        }
    }
}

impl SnapshotRegistry {
    /// Allocate the next monotone snapshot id.
    pub fn allocate(&mut self) -> SnapshotId {
        let id = self.next;
        self.next = self.next.succ();
        id
    }

    /// Whether a snapshot published at `published_ms` is still usable for
    /// admission at `now_ms`.
    pub fn is_fresh(published_ms: u64, now_ms: u64, snapshot_max_age_ms: u64) -> bool {
        now_ms.saturating_sub(published_ms) <= snapshot_max_age_ms
    }
}
