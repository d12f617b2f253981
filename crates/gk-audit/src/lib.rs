//! Hash-chained append-only audit log (spec §7: "all rejections are logged
//! with full diagnostics", §5's EMERGENCY-vs-sampled-hot-path logging
//! distinction). Grounded in `mqk-audit::AuditWriter`: same canonical-JSON +
//! SHA-256 `hash_prev`/`hash_self` chain and deterministic `event_id`
//! derivation, narrowed from an arbitrary `(topic, event_type, payload)`
//! triple to the two event shapes this repo actually emits: admission
//! decisions and DRP state transitions.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use gk_domain::DrpState;
use gk_gates::Decision;

/// Append-only writer. One JSON line per event; each event's `hash_self`
/// chains from the previous event's `hash_self`, so truncating or editing
/// any line breaks the chain from that point forward.
pub struct AuditWriter {
    path: PathBuf,
    run_id: Uuid,
    last_hash: Option<String>,
    seq: u64,
}

impl AuditWriter {
    pub fn new(path: impl AsRef<Path>, run_id: Uuid) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self { path, run_id, last_hash: None, seq: 0 })
    }

    /// Resume an existing log after a restart: replay its tail to recover
    /// the chain head and sequence counter before appending further.
    pub fn resume(path: impl AsRef<Path>, run_id: Uuid) -> Result<Self> {
        let path_ref = path.as_ref();
        let mut writer = Self::new(path_ref, run_id)?;
        if path_ref.exists() {
            let content = fs::read_to_string(path_ref).with_context(|| format!("read audit log {:?}", path_ref))?;
            let mut seq = 0u64;
            let mut last_hash = None;
            for line in content.lines() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let ev: AuditEvent = serde_json::from_str(trimmed).context("parse audit event while resuming")?;
                seq += 1;
                last_hash = ev.hash_self.clone();
            }
            writer.seq = seq;
            writer.last_hash = last_hash;
        }
        Ok(writer)
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Record one admission decision. `signal_id` names the candidate
    /// signal (instrument + timestamp or an upstream correlation id); the
    /// full [`Decision`], including diagnostics, is captured verbatim.
    pub fn record_decision(&mut self, signal_id: &str, decision: &Decision) -> Result<AuditEvent> {
        let payload = json!({
            "signal_id": signal_id,
            "allowed": decision.allowed,
            "size_notional": decision.size_notional,
            "rejection_reason": decision.rejection_reason.map(|r| r.code()),
            "last_gate_evaluated": decision.last_gate_evaluated,
            "diagnostics": decision.diagnostics,
        });
        self.append("admission_decision", payload)
    }

    /// Record a DRP state transition (spec §4.6). `cause` is a short,
    /// human-readable note on why the machine moved (e.g. the evidence
    /// field that tripped, or the recovery condition that cleared).
    pub fn record_drp_transition(&mut self, from: DrpState, to: DrpState, cause: &str) -> Result<AuditEvent> {
        let payload = json!({
            "from": format!("{:?}", from),
            "to": format!("{:?}", to),
            "cause": cause,
        });
        self.append("drp_transition", payload)
    }

    fn append(&mut self, event_type: &str, payload: Value) -> Result<AuditEvent> {
        let ts_utc = Utc::now();
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;
        self.seq += 1;

        let mut ev = AuditEvent {
            event_id,
            run_id: self.run_id,
            ts_utc,
            event_type: event_type.to_string(),
            payload,
            hash_prev: self.last_hash.clone(),
            hash_self: None,
        };

        let self_hash = compute_event_hash(&ev)?;
        ev.hash_self = Some(self_hash.clone());
        self.last_hash = Some(self_hash);

        let line = canonical_json_line(&ev)?;
        append_line(&self.path, &line)?;
        Ok(ev)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Deterministic from chain state + payload + sequence number: no RNG, so
/// two writers replaying the same inputs derive the same `event_id`.
fn derive_event_id(prev_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.unwrap_or("").as_bytes());
    hasher.update(canonicalize_json(payload).as_bytes());
    hasher.update(seq.to_le_bytes());
    let digest = hasher.finalize();
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_OID, &digest))
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new().create(true).append(true).open(path).with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes()).context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    Ok(canonicalize_json(&raw))
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization of an audit event must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Hash chain is computed over the canonical JSON of the event WITHOUT
/// `hash_self`, to avoid hashing the hash.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;
    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref()).with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let ev: AuditEvent = serde_json::from_str(trimmed).with_context(|| format!("parse audit event at line {}", i + 1))?;
        line_count += 1;

        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken { line: i + 1, reason: format!("hash_prev mismatch: expected {:?}, got {:?}", prev_hash, ev.hash_prev) });
        }
        if let Some(ref claimed_hash) = ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed_hash != recomputed {
                return Ok(VerifyResult::Broken { line: i + 1, reason: format!("hash_self mismatch: claimed {}, recomputed {}", claimed_hash, recomputed) });
            }
        }
        prev_hash = ev.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}
