//! Hashing System - SHA-256 for Run Manifests
//!
//! Job hashes identify what a run was asked to produce; output digests
//! show whether two runs produced the same files.

use sha2::{Sha256, Digest};
use serde::Serialize;
use serde_json::{Value, to_string};
use std::fs;
use std::io;
use std::path::Path;

use crate::layout::Layout;
use crate::plan::Combination;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Digest of a file on disk
pub fn hash_file(path: &Path) -> io::Result<String> {
    Ok(sha256_hex(&fs::read(path)?))
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => {
            Value::Array(arr.iter().map(sort_value).collect())
        }
        _ => v.clone()
    }
}

/// Compute manifest hash for a run report
pub fn compute_manifest_hash<T: Serialize>(manifest: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(manifest)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// job_hash = sha256(canonical_layout + output stems + engine_version)
pub fn compute_job_hash(
    layout: &Layout,
    combinations: &[Combination],
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical_layout = canonical_json(layout)?;
    let stems: Vec<_> = combinations.iter().map(|c| c.stem()).collect();
    let combined = format!("{}:{}:{}", canonical_layout, stems.join(","), engine_version);
    Ok(sha256_hex(combined.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
