//! Layered YAML config loading for [`gk_gates::GatekeeperConfig`] (spec §9
//! "Global mutable config -> process-wide immutable config with explicit
//! versions"). Grounded in `mqk-config`'s deep-merge + canonical-JSON +
//! SHA-256 hashing pipeline, generalized from an opaque `serde_json::Value`
//! consumer contract to a typed `GatekeeperConfig` with its own compiled-in
//! defaults as the base layer.

use std::fs;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};

use gk_gates::GatekeeperConfig;

/// Result of loading and merging one or more YAML layers: the typed config,
/// plus the canonicalized JSON and its hash for snapshot-attribution and
/// audit logging (spec §7: "config change is auditable and
/// snapshot-attributable").
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: GatekeeperConfig,
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load and deep-merge YAML layers from disk, in order (base -> env ->
/// per-venue -> stress overrides, ...). Later files override earlier ones.
/// Compiled-in [`GatekeeperConfig::default()`] values form the implicit
/// zeroth layer, so a layer only needs to name the fields it overrides.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut layers = Vec::with_capacity(paths.len());
    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        layers.push(s);
    }
    load_layered_yaml_from_strings(&layers)
}

/// Same merge pipeline as [`load_layered_yaml`], but takes YAML source
/// strings directly. Exists mainly so tests can exercise merge/hash
/// behavior without touching the filesystem.
pub fn load_layered_yaml_from_strings(layers: &[impl AsRef<str>]) -> Result<LoadedConfig> {
    let mut merged = serde_json::to_value(GatekeeperConfig::default()).context("serialize default config")?;

    for layer in layers {
        let yaml_val: serde_yaml::Value = serde_yaml::from_str(layer.as_ref()).context("parse yaml layer")?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    let canonical = canonicalize_json(&merged);
    let config_json: Value = serde_json::from_str(&canonical).context("canonical json parse failed")?;
    let config: GatekeeperConfig = serde_json::from_value(config_json.clone()).context("deserialize GatekeeperConfig from merged layers")?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let config_hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config,
        config_json,
        canonical_json: canonical,
        config_hash,
    })
}

/// Objects merge recursively; arrays and scalars are replaced wholesale.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization of a config value must not fail")
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

/// Top-level config sections recognized by the gate chain. Used to flag
/// YAML keys that no gate will ever read — almost always a typo'd override.
const KNOWN_SECTIONS: &[&str] = &[
    "config_version",
    "dqs",
    "drp",
    "heat",
    "heat_selection",
    "sizing",
    "limits",
    "gate2",
    "gate4",
    "gate5",
    "gate6",
    "gate7",
    "gate8",
    "gate9",
    "gate10",
    "gate11",
    "gate12",
    "gate13",
    "gate15",
    "gate17",
    "gate18",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnusedKeyReport {
    pub unused_top_level_keys: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_top_level_keys.is_empty()
    }
}

/// Flags top-level keys in `config_json` that fall outside
/// [`KNOWN_SECTIONS`] — a section no gate config struct declares, so it
/// would silently be dropped by [`serde_json::from_value`]'s default
/// `#[serde(default)]` fallback were it not caught here first.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut unused: Vec<String> = match config_json.as_object() {
        Some(map) => map.keys().filter(|k| !KNOWN_SECTIONS.contains(&k.as_str())).cloned().collect(),
        None => Vec::new(),
    };
    unused.sort();

    if policy == UnusedKeyPolicy::Fail && !unused.is_empty() {
        bail!("CONFIG_UNUSED_KEYS: unrecognized top-level config section(s): {}", unused.join(", "));
    }

    Ok(UnusedKeyReport { unused_top_level_keys: unused })
}
