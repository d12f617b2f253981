//! gk-drp
//!
//! The Disaster-Recovery Protocol state machine (spec §4.6, C7): warm-up,
//! anti-flapping, and the crisis-escalation ladder feeding Gate 0/1.
//!
//! The ordered short-circuit evaluation mirrors a risk engine's `evaluate()`
//! (sanity clamp -> sticky halted-state handling -> ladder of escalating
//! checks -> default steady state): escalation triggers are checked first
//! and win regardless of what the sticky state would otherwise do, then
//! sticky-state handling (Emergency/Recovery/Hibernate) takes over, and only
//! if nothing overrides does the machine fall through to its current state.

use gk_domain::{DrpState, RecoveryCause};

/// Evidence bundle for one evaluation tick. Each field is an independent
/// escalation trigger (spec §4.6 "any hard-gate or DQS<emergency or ... ->
/// EMERGENCY"); the caller assembles these from Gate 0's DQS outcome, the
/// compounding module, the reservation ledger, and ADL/oracle feeds.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DrpEvidence {
    pub hard_gate_triggered: bool,
    pub dqs: f64,
    pub compounding_domain_violation: bool,
    pub reservation_expired_fill: bool,
    pub adl_critical: bool,
    pub oracle_block: bool,
    pub crisis_index: f64,
    /// Present only while in `Emergency`, set once the triggering condition
    /// has cleared; `None` means "still active".
    pub recovery_cause_if_cleared: Option<RecoveryCause>,
    pub atr_z_short: f64,
    pub now_ms: u64,
    pub operator_ack: bool,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DrpConfig {
    pub dqs_emergency_threshold: f64,
    pub crisis_emergency_threshold: f64,
    pub warmup_bars_data_glitch: u32,
    pub warmup_bars_liquidity: u32,
    pub warmup_bars_depeg: u32,
    pub warmup_bars_other: u32,
    pub flap_window_minutes_base: f64,
    pub flap_window_minutes_min: f64,
    pub flap_window_minutes_max: f64,
    pub flap_to_hibernate_threshold: u32,
    pub hibernate_duration_ms: u64,
}

impl Default for DrpConfig {
    fn default() -> Self {
        Self {
            dqs_emergency_threshold: 0.40,
            crisis_emergency_threshold: 0.85,
            warmup_bars_data_glitch: 3,
            warmup_bars_liquidity: 6,
            warmup_bars_depeg: 24,
            warmup_bars_other: 6,
            flap_window_minutes_base: 60.0,
            flap_window_minutes_min: 10.0,
            flap_window_minutes_max: 120.0,
            flap_to_hibernate_threshold: 4,
            hibernate_duration_ms: 2 * 60 * 60 * 1000,
        }
    }
}

impl DrpConfig {
    fn warmup_bars(&self, cause: RecoveryCause) -> u32 {
        match cause {
            RecoveryCause::DataGlitch => self.warmup_bars_data_glitch,
            RecoveryCause::Liquidity => self.warmup_bars_liquidity,
            RecoveryCause::Depeg => self.warmup_bars_depeg,
            RecoveryCause::Other => self.warmup_bars_other,
        }
    }

    fn flap_window_minutes_eff(&self, atr_z_short: f64) -> f64 {
        let denom = atr_z_short.max(1.0);
        (self.flap_window_minutes_base / denom).clamp(self.flap_window_minutes_min, self.flap_window_minutes_max)
    }
}

/// "Strict" states participate in the anti-flapping count: every state that
/// is not the steady `Normal` state. Hibernate itself is excluded since it's
/// the destination the flapping count escalates *to*, not a state visited on
/// the way there.
fn is_strict_state(s: DrpState) -> bool {
    matches!(s, DrpState::Degraded | DrpState::Defensive | DrpState::Emergency | DrpState::Recovery)
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct Transition {
    at_ms: u64,
}

/// Serializable so a host process (the CLI, a live runner) can persist the
/// machine's state across ticks instead of re-deriving it from scratch.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DrpMachine {
    state: DrpState,
    warmup_bars_remaining: u32,
    hibernate_until_ms: u64,
    flap_history: Vec<Transition>,
    flap_count_sticky: u32,
}

impl Default for DrpMachine {
    fn default() -> Self {
        Self {
            state: DrpState::Normal,
            warmup_bars_remaining: 0,
            hibernate_until_ms: 0,
            flap_history: Vec::new(),
            flap_count_sticky: 0,
        }
    }
}

impl DrpMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DrpState {
        self.state
    }

    pub fn warmup_bars_remaining(&self) -> u32 {
        self.warmup_bars_remaining
    }

    fn record_transition_if_strict(&mut self, new_state: DrpState, now_ms: u64, cfg: &DrpConfig, atr_z_short: f64) {
        if new_state == self.state {
            return;
        }
        if is_strict_state(new_state) {
            self.flap_history.push(Transition { at_ms: now_ms });
        }
        let window_ms = (cfg.flap_window_minutes_eff(atr_z_short) * 60_000.0) as u64;
        self.flap_history.retain(|t| now_ms.saturating_sub(t.at_ms) <= window_ms);
        self.flap_count_sticky = self.flap_history.len() as u32;
    }

    /// Advance the machine by one evaluation tick; returns the resulting state.
    pub fn evaluate(&mut self, evidence: &DrpEvidence, cfg: &DrpConfig) -> DrpState {
        let escalate = evidence.hard_gate_triggered
            || evidence.dqs < cfg.dqs_emergency_threshold
            || evidence.compounding_domain_violation
            || evidence.reservation_expired_fill
            || evidence.adl_critical
            || evidence.oracle_block
            || evidence.crisis_index >= cfg.crisis_emergency_threshold;

        let next = if escalate {
            DrpState::Emergency
        } else {
            match self.state {
                DrpState::Emergency => match evidence.recovery_cause_if_cleared {
                    Some(cause) => {
                        self.warmup_bars_remaining = cfg.warmup_bars(cause);
                        DrpState::Recovery
                    }
                    None => DrpState::Emergency,
                },
                DrpState::Recovery => {
                    if self.warmup_bars_remaining > 0 {
                        self.warmup_bars_remaining -= 1;
                    }
                    if self.warmup_bars_remaining == 0 {
                        DrpState::Normal
                    } else {
                        DrpState::Recovery
                    }
                }
                DrpState::Hibernate => {
                    if evidence.now_ms >= self.hibernate_until_ms && evidence.operator_ack {
                        DrpState::Normal
                    } else {
                        DrpState::Hibernate
                    }
                }
                other => other,
            }
        };

        self.record_transition_if_strict(next, evidence.now_ms, cfg, evidence.atr_z_short);

        let final_state = if self.flap_count_sticky >= cfg.flap_to_hibernate_threshold && next != DrpState::Hibernate {
            self.hibernate_until_ms = evidence.now_ms + cfg.hibernate_duration_ms;
            DrpState::Hibernate
        } else {
            next
        };

        self.state = final_state;
        final_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(now_ms: u64) -> DrpEvidence {
        DrpEvidence {
            dqs: 0.95,
            atr_z_short: 1.0,
            now_ms,
            ..Default::default()
        }
    }

    #[test]
    fn clean_evidence_stays_normal() {
        let mut m = DrpMachine::new();
        let cfg = DrpConfig::default();
        assert_eq!(m.evaluate(&evidence(0), &cfg), DrpState::Normal);
    }

    #[test]
    fn reservation_expired_fill_forces_emergency() {
        let mut m = DrpMachine::new();
        let cfg = DrpConfig::default();
        let mut e = evidence(0);
        e.reservation_expired_fill = true;
        assert_eq!(m.evaluate(&e, &cfg), DrpState::Emergency);
    }

    #[test]
    fn hard_gate_forces_emergency() {
        let mut m = DrpMachine::new();
        let cfg = DrpConfig::default();
        let mut e = evidence(0);
        e.hard_gate_triggered = true;
        assert_eq!(m.evaluate(&e, &cfg), DrpState::Emergency);
    }

    #[test]
    fn emergency_to_recovery_enforces_warmup_by_cause() {
        let mut m = DrpMachine::new();
        let cfg = DrpConfig::default();
        let mut e = evidence(0);
        e.hard_gate_triggered = true;
        assert_eq!(m.evaluate(&e, &cfg), DrpState::Emergency);

        let mut e2 = evidence(1000);
        e2.recovery_cause_if_cleared = Some(RecoveryCause::DataGlitch);
        assert_eq!(m.evaluate(&e2, &cfg), DrpState::Recovery);
        assert_eq!(m.warmup_bars_remaining(), cfg.warmup_bars_data_glitch - 1);

        for i in 0..(cfg.warmup_bars_data_glitch - 1) {
            let e3 = evidence(2000 + i as u64);
            let s = m.evaluate(&e3, &cfg);
            if i < cfg.warmup_bars_data_glitch - 2 {
                assert_eq!(s, DrpState::Recovery);
            } else {
                assert_eq!(s, DrpState::Normal);
            }
        }
    }

    #[test]
    fn repeated_strict_transitions_trigger_hibernate() {
        let mut m = DrpMachine::new();
        let cfg = DrpConfig::default();
        let mut now = 0u64;
        for _ in 0..cfg.flap_to_hibernate_threshold {
            let mut e = evidence(now);
            e.hard_gate_triggered = true;
            m.evaluate(&e, &cfg);
            now += 1_000;
            let mut recover = evidence(now);
            recover.recovery_cause_if_cleared = Some(RecoveryCause::Other);
            m.evaluate(&recover, &cfg);
            now += 1_000;
        }
        assert_eq!(m.state(), DrpState::Hibernate);
    }

    #[test]
    fn hibernate_requires_both_deadline_and_operator_ack() {
        let mut m = DrpMachine::new();
        let cfg = DrpConfig::default();
        let mut now = 0u64;
        for _ in 0..cfg.flap_to_hibernate_threshold {
            let mut e = evidence(now);
            e.hard_gate_triggered = true;
            m.evaluate(&e, &cfg);
            now += 1_000;
            let mut recover = evidence(now);
            recover.recovery_cause_if_cleared = Some(RecoveryCause::Other);
            m.evaluate(&recover, &cfg);
            now += 1_000;
        }
        assert_eq!(m.state(), DrpState::Hibernate);

        let mut past_deadline = evidence(now + cfg.hibernate_duration_ms + 1);
        past_deadline.operator_ack = false;
        assert_eq!(m.evaluate(&past_deadline, &cfg), DrpState::Hibernate);

        past_deadline.operator_ack = true;
        assert_eq!(m.evaluate(&past_deadline, &cfg), DrpState::Normal);
    }
}
