//! Delta synchronisation of mounted folders into the store.
//!
//! The 3-tier rule per scanned file:
//!   1. no corpus-hash entry → new → hash and ingest;
//!   2. size AND mtime unchanged → fast skip, nothing touched;
//!   3. otherwise hash → same sha256 → metadata-only refresh;
//!      different sha256 → re-ingest (new chunks become new items; the
//!      old generation stays in place, observable via corpus history).
//!
//! Syncing an unchanged corpus touches nothing but `last_sync_at`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use memctl_core::{CorpusFile, MemctlError, MemctlResult, Mount};
use memctl_storage::MemoryStore;

use crate::ingest::{ingest_file, IngestOptions};
use crate::scan::{file_sha256, scan_mount, FileInfo};

/// Counters from syncing one mount.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SyncResult {
    pub mount_path: String,
    pub files_scanned: usize,
    pub files_new: usize,
    pub files_changed: usize,
    pub files_unchanged: usize,
    pub chunks_created: usize,
}

/// Sync knobs.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Delta mode (default). `false` re-processes every file.
    pub delta: bool,
    /// Override the mount's stored ignore patterns.
    pub ignore_patterns: Option<Vec<String>>,
    pub lang_hint: Option<String>,
    pub max_tokens: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { delta: true, ignore_patterns: None, lang_hint: None, max_tokens: 1800 }
    }
}

/// Sync one folder into the store, auto-registering the mount when
/// missing.
pub fn sync_mount(
    store: &MemoryStore,
    mount_path: &Path,
    opts: &SyncOptions,
) -> MemctlResult<SyncResult> {
    let canonical = fs::canonicalize(mount_path)
        .map_err(|e| MemctlError::NotFound(format!("mount path {}: {e}", mount_path.display())))?;
    let canonical_str = canonical.to_string_lossy().to_string();
    let mut result = SyncResult { mount_path: canonical_str.clone(), ..Default::default() };

    let mount = match store.read_mount(&canonical_str)? {
        Some(mount) => mount,
        None => {
            let ignore = opts.ignore_patterns.clone().unwrap_or_default();
            let mount_id = store.write_mount(
                &canonical_str,
                None,
                &ignore,
                opts.lang_hint.as_deref(),
            )?;
            store
                .read_mount(&mount_id)?
                .ok_or_else(|| MemctlError::Storage("mount vanished after registration".into()))?
        }
    };

    let patterns = opts
        .ignore_patterns
        .clone()
        .unwrap_or_else(|| mount.ignore_patterns.clone());
    let lang_hint = opts.lang_hint.clone().or_else(|| mount.lang_hint.clone());

    let scan = scan_mount(&canonical, &patterns)?;
    result.files_scanned = scan.files.len();
    info!(mount = %canonical_str, files = scan.files.len(), "scanned");

    for mut fi in scan.files {
        let abs_str = fi.abs_path.to_string_lossy().to_string();

        if opts.delta {
            if let Some(existing) = store.read_corpus_hash(&abs_str)? {
                // Tier 2: size + mtime unchanged → fast skip, no hashing.
                if existing.size_bytes == Some(fi.size_bytes)
                    && existing.mtime_epoch == Some(fi.mtime_epoch)
                {
                    result.files_unchanged += 1;
                    continue;
                }
                // Tier 3: stat changed → hash decides.
                let sha = file_sha256(&fi.abs_path)?;
                fi.sha256 = Some(sha.clone());
                if existing.sha256 == sha {
                    // Content identical: refresh metadata only.
                    store.write_corpus_hash(&CorpusFile {
                        file_path: abs_str.clone(),
                        sha256: sha,
                        chunk_count: existing.chunk_count,
                        item_ids: existing.item_ids.clone(),
                        ingested_at: String::new(),
                        mount_id: Some(mount.mount_id.clone()),
                        rel_path: Some(fi.rel_path.clone()),
                        ext: Some(fi.ext.clone()),
                        size_bytes: Some(fi.size_bytes),
                        mtime_epoch: Some(fi.mtime_epoch),
                        lang_hint: lang_hint.clone(),
                    })?;
                    result.files_unchanged += 1;
                    continue;
                }
                result.files_changed += 1;
            } else {
                // Tier 1: never seen.
                result.files_new += 1;
            }
        } else if store.read_corpus_hash(&abs_str)?.is_none() {
            result.files_new += 1;
        } else {
            result.files_changed += 1;
        }

        let ingest_opts = IngestOptions {
            max_tokens: opts.max_tokens,
            ..Default::default()
        };
        let ingested = ingest_file(store, &fi.abs_path, &ingest_opts)?;

        if ingested.chunks_created > 0 || ingested.files_processed > 0 {
            let sha = match fi.sha256 {
                Some(ref s) => s.clone(),
                None => file_sha256(&fi.abs_path)?,
            };
            store.write_corpus_hash(&CorpusFile {
                file_path: abs_str,
                sha256: sha,
                chunk_count: ingested.chunks_created as i64,
                item_ids: ingested.item_ids.clone(),
                ingested_at: String::new(),
                mount_id: Some(mount.mount_id.clone()),
                rel_path: Some(fi.rel_path.clone()),
                ext: Some(fi.ext.clone()),
                size_bytes: Some(fi.size_bytes),
                mtime_epoch: Some(fi.mtime_epoch),
                lang_hint: lang_hint.clone(),
            })?;
            result.chunks_created += ingested.chunks_created;
        }
    }

    store.update_mount_sync_time(&mount.mount_id)?;
    info!(
        mount = %canonical_str,
        new = result.files_new,
        changed = result.files_changed,
        unchanged = result.files_unchanged,
        chunks = result.chunks_created,
        "sync done"
    );
    Ok(result)
}

/// Sync every registered mount whose path still exists on disk.
pub fn sync_all(store: &MemoryStore, opts: &SyncOptions) -> MemctlResult<Vec<SyncResult>> {
    let mut results = Vec::new();
    for mount in store.list_mounts()? {
        let path = Path::new(&mount.path);
        if !path.is_dir() {
            warn!(mount = %mount.path, "mount path missing, skipping");
            continue;
        }
        let mount_opts = SyncOptions {
            ignore_patterns: Some(mount.ignore_patterns.clone()),
            lang_hint: mount.lang_hint.clone(),
            ..opts.clone()
        };
        results.push(sync_mount(store, path, &mount_opts)?);
    }
    Ok(results)
}

/// Stat-only staleness probe: compare the (path, size, mtime) triples
/// on disk against the stored corpus set. Equality means fresh. A
/// same-size same-mtime content change is invisible here — that is the
/// delta's documented fast path.
pub fn is_stale(
    store: &MemoryStore,
    mount: &Mount,
    ignore_override: Option<&[String]>,
) -> MemctlResult<bool> {
    if mount.last_sync_at.is_none() {
        return Ok(true);
    }

    let patterns: Vec<String> = ignore_override
        .map(|p| p.to_vec())
        .unwrap_or_else(|| mount.ignore_patterns.clone());
    let scan = scan_mount(Path::new(&mount.path), &patterns)?;

    let disk: HashSet<(String, i64, i64)> = scan
        .files
        .iter()
        .map(|fi: &FileInfo| {
            (fi.abs_path.to_string_lossy().to_string(), fi.size_bytes, fi.mtime_epoch)
        })
        .collect();

    let stored: HashSet<(String, i64, i64)> = store
        .list_corpus_files(Some(&mount.mount_id))?
        .into_iter()
        .filter_map(|cf| match (cf.size_bytes, cf.mtime_epoch) {
            (Some(size), Some(mtime)) => Some((cf.file_path, size, mtime)),
            _ => None,
        })
        .collect();

    Ok(disk != stored)
}
