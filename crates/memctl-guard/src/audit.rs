//! Structured JSONL audit journal.
//!
//! One object per call, stable keys:
//! `{v, ts, rid, tool, sid, db, outcome, d?, ms}`.
//!
//! Privacy rules (v1 contract): never log raw content beyond a
//! 120-char preview; include a SHA-256 hash for correlation; database
//! paths are root-relative when a root is set. Every write here is
//! fire-and-forget — a broken log target must never abort a tool call.

use std::io::Write;

use parking_lot::Mutex;
use serde_json::{json, Value};

use memctl_core::ids::sha256_hex;

/// Audit record schema version.
pub const AUDIT_SCHEMA_VERSION: u32 = 1;
/// Maximum preview length, in characters.
pub const PREVIEW_MAX_CHARS: usize = 120;

/// JSONL audit logger. `None` output means the standard diagnostic
/// stream.
pub struct AuditLogger {
    output: Mutex<Option<Box<dyn Write + Send>>>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::to_stderr()
    }
}

impl AuditLogger {
    /// Log to the diagnostic stream.
    pub fn to_stderr() -> Self {
        Self { output: Mutex::new(None) }
    }

    /// Log to a caller-supplied sink (file, pipe).
    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self { output: Mutex::new(Some(writer)) }
    }

    /// Fresh request id, unique per call.
    pub fn new_rid(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Append one audit record. Never raises; failures are swallowed.
    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &self,
        tool: &str,
        rid: &str,
        session_id: &str,
        db_path: &str,
        outcome: &str,
        detail: Option<Value>,
        latency_ms: f64,
    ) {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let mut record = json!({
            "v": AUDIT_SCHEMA_VERSION,
            "ts": ts,
            "rid": rid,
            "tool": tool,
            "sid": session_id,
            "db": db_path,
            "outcome": outcome,
        });
        if let Some(d) = detail {
            record["d"] = d;
        }
        record["ms"] = json!((latency_ms * 10.0).round() / 10.0);

        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(_) => return,
        };
        let mut output = self.output.lock();
        match output.as_mut() {
            Some(writer) => {
                let _ = writeln!(writer, "{line}");
                let _ = writer.flush();
            }
            None => {
                let _ = writeln!(std::io::stderr(), "{line}");
            }
        }
    }
}

/// Safe audit detail for content-carrying operations: total bytes, a
/// correlation hash, a flattened 120-char preview, and the policy
/// outcome when one applies. Content beyond the preview never reaches
/// the journal.
pub fn make_content_detail(content: &str, policy: Option<Value>) -> Value {
    let mut preview: String = content
        .chars()
        .take(PREVIEW_MAX_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .filter(|c| *c != '\r')
        .collect();
    if content.chars().count() > PREVIEW_MAX_CHARS {
        preview = format!("{}\u{2026}", preview.trim_end());
    }

    let mut detail = json!({
        "bytes": content.len(),
        "hash": sha256_hex(content),
        "preview": preview,
    });
    if let Some(p) = policy {
        detail["policy"] = p;
    }
    detail
}
