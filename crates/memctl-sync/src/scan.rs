//! Mount scanning: a deterministic, stat-only walk.
//!
//! Hashes are never computed at scan time — the 3-tier delta defers
//! them until size or mtime disagrees with the stored entry.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};
use tracing::warn;

use memctl_core::MemctlResult;

use crate::extensions::{ext_of, is_ingestable};

/// Metadata for a single scanned file. `sha256` stays `None` until
/// the delta decides hashing is necessary.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub ext: String,
    pub size_bytes: i64,
    pub mtime_epoch: i64,
    pub sha256: Option<String>,
}

/// Result of scanning a mount folder.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<FileInfo>,
    pub total_size: i64,
}

/// True when a relative path matches any ignore glob — patterns are
/// tried against the full relative path and the basename, so simple
/// patterns like `*.log` work at any depth.
pub fn is_ignored(rel_path: &str, patterns: &[glob::Pattern]) -> bool {
    let basename = Path::new(rel_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    patterns.iter().any(|p| p.matches(rel_path) || p.matches(&basename))
}

/// Compile ignore globs, dropping (and logging) malformed patterns.
pub fn compile_ignores(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %p, "ignoring malformed glob pattern: {e}");
                None
            }
        })
        .collect()
}

/// Walk a mount's directory tree collecting ingestable regular files.
/// Entries come back sorted by relative path for deterministic output.
pub fn scan_mount(mount_path: &Path, ignore_patterns: &[String]) -> MemctlResult<ScanResult> {
    let patterns = compile_ignores(ignore_patterns);
    let mut result = ScanResult::default();
    walk(mount_path, mount_path, &patterns, &mut result)?;
    result.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(result)
}

fn walk(
    root: &Path,
    dir: &Path,
    patterns: &[glob::Pattern],
    result: &mut ScanResult,
) -> MemctlResult<()> {
    let mut entries: Vec<_> = match fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(Result::ok).collect(),
        Err(e) => {
            warn!(dir = %dir.display(), "cannot read directory, skipping: {e}");
            return Ok(());
        }
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };
        let rel_path = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string_lossy().to_string());

        if file_type.is_dir() {
            if !is_ignored(&rel_path, patterns) {
                walk(root, &path, patterns, result)?;
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        if is_ignored(&rel_path, patterns) {
            continue;
        }

        let ext = ext_of(&path);
        if !is_ingestable(&ext) {
            continue;
        }

        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), "cannot stat, skipping: {e}");
                continue;
            }
        };
        let mtime_epoch = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        result.total_size += metadata.len() as i64;
        result.files.push(FileInfo {
            abs_path: path,
            rel_path,
            ext,
            size_bytes: metadata.len() as i64,
            mtime_epoch,
            sha256: None,
        });
    }
    Ok(())
}

/// Streamed SHA-256 hex digest of a file (64 KiB blocks).
pub fn file_sha256(path: &Path) -> MemctlResult<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_matches_rel_path_and_basename() {
        let patterns = compile_ignores(&["*.log".to_string(), "build/*".to_string()]);
        assert!(is_ignored("deep/nested/trace.log", &patterns));
        assert!(is_ignored("build/out.md", &patterns));
        assert!(!is_ignored("docs/readme.md", &patterns));
    }

    #[test]
    fn malformed_patterns_are_dropped() {
        let patterns = compile_ignores(&["[".to_string(), "*.tmp".to_string()]);
        assert_eq!(patterns.len(), 1);
    }
}
