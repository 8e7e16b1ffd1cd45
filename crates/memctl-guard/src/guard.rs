//! Path validation and resource caps.
//!
//! First line of defense for externally-triggered operations: path
//! traversal and symlink escape, single-write size, per-session write
//! volume over a sliding minute, import batch size, and a soft
//! database size ceiling.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::warn;

use memctl_core::{MemctlError, MemctlResult};

/// Guard limits. The defaults match the documented caps.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Containment root for database paths. `None` disables the
    /// containment check (trusted local CLI use).
    pub db_root: Option<PathBuf>,
    pub max_write_bytes: usize,
    pub max_write_bytes_per_minute: usize,
    pub max_import_items: usize,
    /// Soft ceiling: exceeding it warns, never blocks.
    pub max_db_size_mb: Option<u64>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            db_root: None,
            max_write_bytes: 65_536,
            max_write_bytes_per_minute: 524_288,
            max_import_items: 500,
            max_db_size_mb: None,
        }
    }
}

struct WriteWindow {
    window_start: Instant,
    bytes: usize,
}

/// Path validation and resource guardrails. One instance is shared
/// across all tool calls.
pub struct PathGuard {
    config: GuardConfig,
    db_root: Option<PathBuf>,
    write_windows: Mutex<HashMap<String, WriteWindow>>,
}

impl PathGuard {
    pub fn new(config: GuardConfig) -> Self {
        let db_root = config
            .db_root
            .as_ref()
            .map(|root| fs::canonicalize(root).unwrap_or_else(|_| root.clone()));
        Self { config, db_root, write_windows: Mutex::new(HashMap::new()) }
    }

    pub fn db_root(&self) -> Option<&Path> {
        self.db_root.as_deref()
    }

    /// Resolve and validate a requested database path.
    ///
    /// 1. Reject any `..` segment before resolving (clear failure mode).
    /// 2. Resolve, following symlinks where the path exists.
    /// 3. The result must lie under `db_root` when a root is set.
    pub fn validate_db_path(&self, requested: &str) -> MemctlResult<PathBuf> {
        let raw = Path::new(requested);
        if raw.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            return Err(MemctlError::Guard(format!(
                "path traversal rejected: '..' in path {requested:?}"
            )));
        }

        let joined = match (&self.db_root, raw.is_absolute()) {
            (Some(root), false) => root.join(raw),
            _ => raw.to_path_buf(),
        };
        let resolved = resolve_lenient(&joined)?;

        if let Some(root) = &self.db_root {
            if !resolved.starts_with(root) {
                return Err(MemctlError::Guard(format!(
                    "path outside db-root: {} is not under {}",
                    resolved.display(),
                    root.display()
                )));
            }
        }
        Ok(resolved)
    }

    /// Root-relative path string for audit records. Never leaks an
    /// absolute path when a root is configured.
    pub fn relative_db_path(&self, resolved: &Path) -> String {
        if let Some(root) = &self.db_root {
            if let Ok(rel) = resolved.strip_prefix(root) {
                return rel.to_string_lossy().to_string();
            }
        }
        resolved.to_string_lossy().to_string()
    }

    /// Reject a single write larger than the cap.
    pub fn check_write_size(&self, content: &str) -> MemctlResult<()> {
        let size = content.len();
        if size > self.config.max_write_bytes {
            return Err(MemctlError::Guard(format!(
                "write size {size} bytes exceeds limit of {} bytes",
                self.config.max_write_bytes
            )));
        }
        Ok(())
    }

    /// Track cumulative write bytes per session over a sliding
    /// 60-second window.
    pub fn check_write_budget(&self, session_id: &str, content_bytes: usize) -> MemctlResult<()> {
        let mut windows = self.write_windows.lock();
        let now = Instant::now();

        match windows.get_mut(session_id) {
            Some(window) if now.duration_since(window.window_start).as_secs() < 60 => {
                let new_total = window.bytes + content_bytes;
                if new_total > self.config.max_write_bytes_per_minute {
                    return Err(MemctlError::Guard(format!(
                        "write budget exceeded: {new_total} bytes in current minute \
                         (limit: {} bytes/min)",
                        self.config.max_write_bytes_per_minute
                    )));
                }
                window.bytes = new_total;
            }
            _ => {
                windows.insert(
                    session_id.to_string(),
                    WriteWindow { window_start: now, bytes: content_bytes },
                );
            }
        }
        Ok(())
    }

    /// Reject an import batch beyond the cap.
    pub fn check_import_batch(&self, count: usize) -> MemctlResult<()> {
        if count > self.config.max_import_items {
            return Err(MemctlError::Guard(format!(
                "import batch of {count} items exceeds limit of {}",
                self.config.max_import_items
            )));
        }
        Ok(())
    }

    /// Warn (non-fatal) when the database file exceeds the soft size
    /// ceiling.
    pub fn check_db_size(&self, db_path: &Path) {
        let Some(limit_mb) = self.config.max_db_size_mb else { return };
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_mb = metadata.len() / (1024 * 1024);
            if size_mb > limit_mb {
                warn!(
                    db = %db_path.display(),
                    size_mb,
                    limit_mb,
                    "database exceeds soft size ceiling"
                );
            }
        }
    }
}

/// Canonicalize where the path exists; otherwise canonicalize the
/// nearest existing ancestor and re-append the remainder. Keeps
/// symlink escapes detectable for not-yet-created database files.
fn resolve_lenient(path: &Path) -> MemctlResult<PathBuf> {
    if let Ok(resolved) = fs::canonicalize(path) {
        return Ok(resolved);
    }
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }
    let mut resolved = if existing.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        fs::canonicalize(&existing).unwrap_or(existing)
    };
    for part in tail.into_iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}
