//! `inspect_path` — automount, staleness-gated autosync, inspect, and
//! optional ephemeral cleanup, announcing every implicit step through
//! a caller-supplied log function.

use std::fs;
use std::path::Path;

use serde::Serialize;

use memctl_core::{MemctlError, MemctlResult};
use memctl_storage::MemoryStore;
use memctl_sync::{is_stale, sync_mount, SyncOptions};

use crate::stats::{inspect_stats, InspectStats};

/// When to sync before inspecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Sync only when the staleness probe says the store lags disk.
    Auto,
    Always,
    Never,
}

impl SyncMode {
    pub fn parse(s: &str) -> MemctlResult<Self> {
        match s {
            "auto" => Ok(SyncMode::Auto),
            "always" => Ok(SyncMode::Always),
            "never" => Ok(SyncMode::Never),
            other => Err(MemctlError::Validation(format!(
                "invalid sync_mode: {other:?} (expected auto|always|never)"
            ))),
        }
    }
}

/// Whether the implicit mount outlives the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    Persist,
    Ephemeral,
}

impl MountMode {
    pub fn parse(s: &str) -> MemctlResult<Self> {
        match s {
            "persist" => Ok(MountMode::Persist),
            "ephemeral" => Ok(MountMode::Ephemeral),
            other => Err(MemctlError::Validation(format!(
                "invalid mount_mode: {other:?} (expected persist|ephemeral)"
            ))),
        }
    }
}

/// Result of one `inspect_path` orchestration.
#[derive(Debug, Clone, Serialize)]
pub struct InspectResult {
    #[serde(flatten)]
    pub stats: InspectStats,
    pub mount_id: String,
    pub mount_label: String,
    pub was_mounted: bool,
    pub was_synced: bool,
    pub sync_skipped: bool,
    pub was_ephemeral: bool,
    pub sync_files_new: usize,
    pub sync_files_changed: usize,
    pub sync_files_unchanged: usize,
    pub sync_chunks_created: usize,
}

/// Make `memctl inspect <path>` work without manual mount and sync
/// steps. Every implicit action goes through `log`.
pub fn inspect_path(
    store: &MemoryStore,
    path: &Path,
    sync_mode: SyncMode,
    mount_mode: MountMode,
    ignore_patterns: Option<&[String]>,
    log: &mut dyn FnMut(&str),
) -> MemctlResult<InspectResult> {
    let canonical = fs::canonicalize(path)
        .map_err(|_| MemctlError::NotFound(format!("path does not exist: {}", path.display())))?;
    if !canonical.is_dir() {
        return Err(MemctlError::Validation(format!(
            "path is not a directory: {}",
            canonical.display()
        )));
    }
    let canonical_str = canonical.to_string_lossy().to_string();

    // Step 1: ensure the path is mounted.
    let mut was_mounted = false;
    let mount = match store.read_mount(&canonical_str)? {
        Some(mount) => mount,
        None => {
            let ignore = ignore_patterns.map(|p| p.to_vec()).unwrap_or_default();
            let mount_id = store.write_mount(&canonical_str, None, &ignore, None)?;
            was_mounted = true;
            log(&format!("[inspect] Mounted: {canonical_str}"));
            store
                .read_mount(&mount_id)?
                .ok_or_else(|| MemctlError::Storage("mount vanished after registration".into()))?
        }
    };

    let effective_patterns: Vec<String> = ignore_patterns
        .map(|p| p.to_vec())
        .unwrap_or_else(|| mount.ignore_patterns.clone());

    // Step 2: staleness check and sync decision.
    let mut sync_skipped = false;
    let do_sync = match sync_mode {
        SyncMode::Always => {
            log(&format!("[inspect] sync=always, syncing {canonical_str}"));
            true
        }
        SyncMode::Never => {
            sync_skipped = true;
            log("[inspect] sync=never, skipping sync");
            false
        }
        SyncMode::Auto => {
            if is_stale(store, &mount, Some(&effective_patterns))? {
                log(&format!("[inspect] Store is stale, syncing {canonical_str}"));
                true
            } else {
                sync_skipped = true;
                log("[inspect] Store is up-to-date, skipping sync");
                false
            }
        }
    };

    // Step 3: sync if needed.
    let mut was_synced = false;
    let mut sync_counts = (0usize, 0usize, 0usize, 0usize);
    if do_sync {
        let sr = sync_mount(
            store,
            &canonical,
            &SyncOptions {
                ignore_patterns: Some(effective_patterns.clone()),
                ..Default::default()
            },
        )?;
        was_synced = true;
        sync_counts = (sr.files_new, sr.files_changed, sr.files_unchanged, sr.chunks_created);
        log(&format!(
            "[inspect] Synced: {} new, {} changed, {} unchanged, {} chunks",
            sr.files_new, sr.files_changed, sr.files_unchanged, sr.chunks_created
        ));
    }

    // Step 4: inspect.
    let stats = inspect_stats(store, Some(&mount.mount_id))?;
    let mount_label = mount.name.clone().unwrap_or_else(|| canonical_str.clone());

    // Step 5: ephemeral cleanup.
    if mount_mode == MountMode::Ephemeral {
        store.remove_mount(&mount.mount_id)?;
        log("[inspect] Ephemeral: mount removed");
    }

    Ok(InspectResult {
        stats,
        mount_id: mount.mount_id,
        mount_label,
        was_mounted,
        was_synced,
        sync_skipped,
        was_ephemeral: mount_mode == MountMode::Ephemeral,
        sync_files_new: sync_counts.0,
        sync_files_changed: sync_counts.1,
        sync_files_unchanged: sync_counts.2,
        sync_chunks_created: sync_counts.3,
    })
}
