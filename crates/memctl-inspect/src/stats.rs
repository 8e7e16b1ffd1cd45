//! Structural statistics over corpus metadata.
//!
//! Computed from `corpus_hashes` rows only — never from item content.
//! Deterministic: identical database content produces identical stats
//! and observations. Absolute filesystem paths never leave this
//! module; every path is mount-relative (or a basename for files
//! ingested without a mount).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use memctl_core::{CorpusFile, MemctlResult};
use memctl_storage::MemoryStore;

/// Observation thresholds, frozen in code for reproducibility.
pub const DOMINANCE_FRAC: f64 = 0.40;
pub const LOW_DENSITY_THRESHOLD: f64 = 0.10;
pub const EXT_CONCENTRATION_FRAC: f64 = 0.75;
pub const SPARSE_THRESHOLD: i64 = 1;

/// Per-folder aggregate.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FolderStats {
    pub file_count: i64,
    pub chunk_count: i64,
    pub size: i64,
}

/// One of the five largest files.
#[derive(Debug, Clone, Serialize)]
pub struct LargestFile {
    pub path: String,
    pub size_bytes: i64,
    pub chunk_count: i64,
}

/// Deterministic structural summary of a corpus.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InspectStats {
    pub total_files: i64,
    pub total_chunks: i64,
    pub total_size: i64,
    pub per_folder: BTreeMap<String, FolderStats>,
    pub per_extension: BTreeMap<String, i64>,
    pub top_largest: Vec<LargestFile>,
    pub observations: Vec<String>,
}

/// Portable relative path for a corpus entry: `rel_path` when sync set
/// it, else the basename (push-ingested files have no mount context).
fn safe_rel_path(file: &CorpusFile) -> String {
    if let Some(rel) = &file.rel_path {
        if !rel.is_empty() {
            return rel.clone();
        }
    }
    Path::new(&file.file_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.file_path.clone())
}

/// File size with a stat() fallback for rows ingested before sizes
/// were recorded.
fn safe_size(file: &CorpusFile) -> i64 {
    if let Some(size) = file.size_bytes {
        if size > 0 {
            return size;
        }
    }
    std::fs::metadata(&file.file_path).map(|m| m.len() as i64).unwrap_or(0)
}

/// Compute structural statistics for a mount (or the entire store).
pub fn inspect_stats(store: &MemoryStore, mount_id: Option<&str>) -> MemctlResult<InspectStats> {
    let files = store.list_corpus_files(mount_id)?;
    if files.is_empty() {
        return Ok(InspectStats::default());
    }

    let resolved: Vec<(String, i64, &CorpusFile)> = files
        .iter()
        .map(|f| (safe_rel_path(f), safe_size(f), f))
        .collect();

    let total_files = resolved.len() as i64;
    let total_chunks: i64 = resolved.iter().map(|(_, _, f)| f.chunk_count).sum();
    let total_size: i64 = resolved.iter().map(|(_, size, _)| size).sum();

    let mut per_folder: BTreeMap<String, FolderStats> = BTreeMap::new();
    for (rel, size, file) in &resolved {
        let folder = Path::new(rel)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let entry = per_folder.entry(folder).or_default();
        entry.file_count += 1;
        entry.chunk_count += file.chunk_count;
        entry.size += size;
    }

    let mut per_extension: BTreeMap<String, i64> = BTreeMap::new();
    for (_, _, file) in &resolved {
        let ext = file
            .ext
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| {
                Path::new(&file.file_path)
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                    .unwrap_or_default()
            });
        if !ext.is_empty() {
            *per_extension.entry(ext).or_insert(0) += 1;
        }
    }

    let mut by_size: Vec<&(String, i64, &CorpusFile)> = resolved.iter().collect();
    by_size.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let top_largest = by_size
        .iter()
        .take(5)
        .map(|(rel, size, file)| LargestFile {
            path: rel.clone(),
            size_bytes: *size,
            chunk_count: file.chunk_count,
        })
        .collect();

    let observations = compute_observations(&per_folder, &per_extension, total_chunks, total_files);

    Ok(InspectStats {
        total_files,
        total_chunks,
        total_size,
        per_folder,
        per_extension,
        top_largest,
        observations,
    })
}

/// Apply the frozen observation rules.
fn compute_observations(
    per_folder: &BTreeMap<String, FolderStats>,
    per_extension: &BTreeMap<String, i64>,
    total_chunks: i64,
    total_files: i64,
) -> Vec<String> {
    let mut obs = Vec::new();
    if total_chunks == 0 || total_files == 0 {
        return obs;
    }

    // Dominance: any folder holding >= 40% of all chunks.
    for (folder, stats) in per_folder {
        let frac = stats.chunk_count as f64 / total_chunks as f64;
        if frac >= DOMINANCE_FRAC {
            obs.push(format!("{folder}/ dominates content ({}% of chunks)", (frac * 100.0) as i64));
        }
    }

    // Low density: bottom decile of chunks-per-file, folders with >= 3
    // files only. Needs at least 3 folders to be meaningful.
    if per_folder.len() >= 3 {
        let mut densities: Vec<(&String, f64, i64)> = per_folder
            .iter()
            .filter(|(_, s)| s.file_count > 0)
            .map(|(folder, s)| (folder, s.chunk_count as f64 / s.file_count as f64, s.file_count))
            .collect();
        densities.sort_by(|a, b| {
            a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(b.0))
        });
        let cutoff = ((densities.len() as f64 * LOW_DENSITY_THRESHOLD) as usize).max(1);
        for (folder, density, file_count) in densities.into_iter().take(cutoff) {
            if file_count >= 3 {
                obs.push(format!(
                    "{folder}/ has low chunk density ({density:.1} chunks/file, {file_count} files)"
                ));
            }
        }
    }

    // Extension concentration: one extension >= 75% of all files.
    let mut exts: Vec<(&String, &i64)> = per_extension.iter().collect();
    exts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (ext, count) in exts {
        let frac = *count as f64 / total_files as f64;
        if frac >= EXT_CONCENTRATION_FRAC {
            obs.push(format!("{ext} files dominate ({}% of all files)", (frac * 100.0) as i64));
        }
    }

    // Sparse: folders with <= 1 chunk across >= 3 files.
    for (folder, stats) in per_folder {
        if stats.chunk_count <= SPARSE_THRESHOLD && stats.file_count >= 3 {
            obs.push(format!(
                "{folder}/ is sparse ({} chunks across {} files)",
                stats.chunk_count, stats.file_count
            ));
        }
    }

    obs
}
