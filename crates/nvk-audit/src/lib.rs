use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for deterministic event ids ("NVK_AUDIT_EVENTS" as bytes).
const EVENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x4e56_4b5f_4155_4449_545f_4556_454e_5453);

/// Append-only publication trail. Writes JSON Lines (one event per line).
/// Optional hash chain: each event then carries hash_prev + hash_self, and
/// `verify_hash_chain` can prove the file was never edited in place.
pub struct AuditWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    /// Sequence counter feeding `event_id` derivation. Counts every append
    /// since the start of the chain, not since this process started.
    seq: u64,
}

impl AuditWriter {
    /// Start a fresh chain at `path`, creating parent dirs as needed. Does
    /// not inspect an existing file; use `resume_from` for that.
    pub fn new(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        Ok(Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    /// Reopen an existing log and continue its chain: last hash and the
    /// sequence counter are restored from the file. A missing file starts
    /// a fresh chain at the same path.
    pub fn resume_from(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let mut writer = Self::new(path.as_ref(), hash_chain)?;
        let content = match fs::read_to_string(path.as_ref()) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(writer),
            Err(e) => {
                return Err(e).with_context(|| format!("read audit log {:?}", path.as_ref()))
            }
        };

        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let ev: AuditEvent = serde_json::from_str(trimmed)
                .with_context(|| format!("parse audit event at line {}", i + 1))?;
            writer.seq += 1;
            writer.last_hash = ev.hash_self;
        }
        Ok(writer)
    }

    pub fn last_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    /// Number of events appended so far, resumed ones included.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Append one event. The id is derived from chain position and payload,
    /// never from an RNG, so replaying the same run writes the same ids.
    pub fn append(
        &mut self,
        run_id: Uuid,
        topic: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<AuditEvent> {
        let ts_utc = Utc::now();
        let event_id = derive_event_id(self.last_hash.as_deref(), &payload, self.seq)?;
        self.seq += 1;

        let mut ev = AuditEvent {
            event_id,
            run_id,
            ts_utc,
            topic: topic.to_string(),
            event_type: event_type.to_string(),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();

            let self_hash = compute_event_hash(&ev)?;
            ev.hash_self = Some(self_hash.clone());
            self.last_hash = Some(self_hash);
        }

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
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Deterministic event id: UUIDv5 over chain tail, sequence number and the
/// canonical payload. Any edit to an already-written payload changes the id
/// every later derivation would have produced.
fn derive_event_id(last_hash: Option<&str>, payload: &Value, seq: u64) -> Result<Uuid> {
    let canonical = canonical_json_line(payload)?;
    let mut material = Vec::with_capacity(canonical.len() + 80);
    material.extend_from_slice(last_hash.unwrap_or("").as_bytes());
    material.push(0);
    material.extend_from_slice(&seq.to_le_bytes());
    material.push(0);
    material.extend_from_slice(canonical.as_bytes());
    Ok(Uuid::new_v5(&EVENT_ID_NAMESPACE, &material))
}

/// Write a single line to file (with trailing newline).
fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open audit log {:?}", path))?;
    f.write_all(line.as_bytes())
        .context("write audit line failed")?;
    f.write_all(b"\n").context("write newline failed")?;
    Ok(())
}

/// Canonicalize by sorting keys recursively and emitting compact JSON.
/// One event == one JSON line.
fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    let sorted = sort_keys(&raw);
    serde_json::to_string(&sorted).context("json stringify failed")
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

/// Chain hash over the canonical JSON of the event WITHOUT hash_self (the
/// field cannot contain its own digest).
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut clone = ev.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Verify a log file: chain linkage, per-event hashes, id derivation.
pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log {:?}", path.as_ref()))?;
    verify_hash_chain_str(&content)
}

/// Same checks as [`verify_hash_chain`] over in-memory JSONL content.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut line_count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let ev: AuditEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit event at line {}", i + 1))?;

        // 1. hash_prev must match the previous event's hash_self.
        if ev.hash_prev != prev_hash {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "hash_prev mismatch: expected {:?}, got {:?}",
                    prev_hash, ev.hash_prev
                ),
            });
        }

        // 2. hash_self must be correct for this event's content.
        if let Some(ref claimed_hash) = ev.hash_self {
            let recomputed = compute_event_hash(&ev)?;
            if *claimed_hash != recomputed {
                return Ok(VerifyResult::Broken {
                    line: i + 1,
                    reason: format!(
                        "hash_self mismatch: claimed {}, recomputed {}",
                        claimed_hash, recomputed
                    ),
                });
            }
        }

        // 3. event_id must match its derivation at this chain position.
        // Catches the forger who rewrites a payload and re-hashes the tail:
        // the id they cannot recompute was fixed by the original payload.
        let expected_id = derive_event_id(prev_hash.as_deref(), &ev.payload, line_count as u64)?;
        if ev.event_id != expected_id {
            return Ok(VerifyResult::Broken {
                line: i + 1,
                reason: format!(
                    "event_id mismatch: claimed {}, derived {}",
                    ev.event_id, expected_id
                ),
            });
        }

        line_count += 1;
        prev_hash = ev.hash_self.clone();
    }

    Ok(VerifyResult::Valid { lines: line_count })
}

/// Result of log verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// The entire chain is valid.
    Valid { lines: usize },
    /// The chain is broken at the given line.
    Broken { line: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_line_sorts_keys_recursively() {
        let v = json!({"z": 1, "a": {"d": [{"y": 2, "b": 3}], "c": 4}});
        let line = canonical_json_line(&v).unwrap();
        assert_eq!(line, r#"{"a":{"c":4,"d":[{"b":3,"y":2}]},"z":1}"#);
    }

    #[test]
    fn event_id_is_deterministic_and_position_sensitive() {
        let payload = json!({"fund_id": "pool-a", "epoch": 3});
        let a = derive_event_id(Some("abc"), &payload, 7).unwrap();
        let b = derive_event_id(Some("abc"), &payload, 7).unwrap();
        assert_eq!(a, b);

        assert_ne!(a, derive_event_id(Some("abc"), &payload, 8).unwrap());
        assert_ne!(a, derive_event_id(Some("abd"), &payload, 7).unwrap());
        assert_ne!(
            a,
            derive_event_id(Some("abc"), &json!({"fund_id": "pool-b", "epoch": 3}), 7).unwrap()
        );
        assert_ne!(a, derive_event_id(None, &payload, 7).unwrap());
    }

    #[test]
    fn key_order_does_not_change_the_id() {
        let a = derive_event_id(None, &json!({"x": 1, "y": 2}), 0).unwrap();
        let b = derive_event_id(None, &json!({"y": 2, "x": 1}), 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hash_excludes_hash_self() {
        let mut ev = AuditEvent {
            event_id: Uuid::nil(),
            run_id: Uuid::nil(),
            ts_utc: Utc::now(),
            topic: "nav.pool-a".to_string(),
            event_type: "nav_computed".to_string(),
            payload: json!({"epoch": 1}),
            hash_prev: None,
            hash_self: None,
        };
        let h1 = compute_event_hash(&ev).unwrap();
        ev.hash_self = Some(h1.clone());
        let h2 = compute_event_hash(&ev).unwrap();
        assert_eq!(h1, h2);

        ev.hash_prev = Some("something".to_string());
        assert_ne!(compute_event_hash(&ev).unwrap(), h1);
    }

    #[test]
    fn empty_content_is_a_valid_empty_chain() {
        assert_eq!(
            verify_hash_chain_str("").unwrap(),
            VerifyResult::Valid { lines: 0 }
        );
        assert_eq!(
            verify_hash_chain_str("\n  \n").unwrap(),
            VerifyResult::Valid { lines: 0 }
        );
    }
}
