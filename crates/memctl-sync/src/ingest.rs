//! File-to-memory chunking pipeline.
//!
//! Splits a file (or raw text) into paragraph-bounded chunks and
//! writes them as memory items with `doc` provenance. Idempotent:
//! re-ingesting an unchanged file is a no-op via `corpus_hashes`.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use memctl_core::{
    CorpusFile, MemctlResult, MemoryItem, MemoryProvenance, MemoryTier, MemoryType, SourceKind,
};
use memctl_storage::MemoryStore;

use crate::chunk::{chunk_header, chunk_paragraphs, chunk_title, infer_tags_from_path, infer_title};
use crate::extensions::ext_of;
use crate::scan::file_sha256;

/// Ingestion knobs. The defaults suit folder sync.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub scope: String,
    pub corpus_id: Option<String>,
    /// Max tokens per chunk (chars / 4 estimate).
    pub max_tokens: usize,
    /// Extra tags attached to every chunk.
    pub tags: Vec<String>,
    /// Infer title and language/folder tags from the path.
    pub auto_format: bool,
    pub injectable: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            scope: "project".to_string(),
            corpus_id: None,
            max_tokens: 1800,
            tags: Vec::new(),
            auto_format: true,
            injectable: true,
        }
    }
}

/// Summary of an ingest operation.
#[derive(Debug, Clone, Default)]
pub struct IngestResult {
    pub files_processed: usize,
    /// Already in `corpus_hashes` with the same sha256.
    pub files_skipped: usize,
    pub chunks_created: usize,
    pub item_ids: Vec<String>,
}

/// Ingest a single file. Unchanged content (same stored sha256) is
/// skipped without touching any row.
pub fn ingest_file(
    store: &MemoryStore,
    path: &Path,
    opts: &IngestOptions,
) -> MemctlResult<IngestResult> {
    let abs_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let abs_str = abs_path.to_string_lossy().to_string();

    let bytes = fs::read(&abs_path)?;
    let text = String::from_utf8_lossy(&bytes).to_string();
    let sha256 = file_sha256(&abs_path)?;

    if let Some(existing) = store.read_corpus_hash(&abs_str)? {
        if existing.sha256 == sha256 {
            debug!(path = %abs_str, "unchanged, skipping ingest");
            return Ok(IngestResult { files_skipped: 1, ..Default::default() });
        }
    }

    let stem = abs_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| abs_str.clone());
    let mut tags = opts.tags.clone();
    let mut title_base = stem.clone();
    if opts.auto_format {
        for tag in infer_tags_from_path(&abs_path) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        title_base = infer_title(&text, &stem);
    }

    let size_bytes = bytes.len() as i64;
    let result = ingest_text(
        store,
        &text,
        &abs_str,
        &sha256,
        &title_base,
        &tags,
        opts,
    )?;
    if result.chunks_created == 0 {
        warn!(path = %abs_str, "no content to ingest");
        return Ok(IngestResult { files_processed: 1, ..Default::default() });
    }

    store.write_corpus_hash(&CorpusFile {
        file_path: abs_str.clone(),
        sha256,
        chunk_count: result.chunks_created as i64,
        item_ids: result.item_ids.clone(),
        ingested_at: String::new(),
        mount_id: None,
        rel_path: None,
        ext: Some(ext_of(&abs_path)).filter(|e| !e.is_empty()),
        size_bytes: Some(size_bytes),
        mtime_epoch: None,
        lang_hint: None,
    })?;

    info!(path = %abs_str, chunks = result.chunks_created, "ingested");
    Ok(result)
}

/// Ingest raw text under a synthetic source id (stdin, tool output).
/// Dedup works the same way, keyed on the synthetic path.
pub fn ingest_stdin_text(
    store: &MemoryStore,
    text: &str,
    opts: &IngestOptions,
) -> MemctlResult<IngestResult> {
    if text.trim().is_empty() {
        return Ok(IngestResult::default());
    }
    let sha256 = memctl_core::ids::sha256_hex(text);
    if let Some(existing) = store.read_corpus_hash("<stdin>")? {
        if existing.sha256 == sha256 {
            debug!("stdin unchanged, skipping");
            return Ok(IngestResult { files_skipped: 1, ..Default::default() });
        }
    }

    let result = ingest_text(store, text, "<stdin>", &sha256, "stdin", &opts.tags, opts)?;
    if result.chunks_created > 0 {
        store.write_corpus_hash(&CorpusFile {
            file_path: "<stdin>".to_string(),
            sha256,
            chunk_count: result.chunks_created as i64,
            item_ids: result.item_ids.clone(),
            ingested_at: String::new(),
            mount_id: None,
            rel_path: None,
            ext: None,
            size_bytes: Some(text.len() as i64),
            mtime_epoch: None,
            lang_hint: None,
        })?;
    }
    Ok(result)
}

/// Shared chunk-and-write path.
fn ingest_text(
    store: &MemoryStore,
    text: &str,
    source_id: &str,
    sha256: &str,
    title_base: &str,
    tags: &[String],
    opts: &IngestOptions,
) -> MemctlResult<IngestResult> {
    let chunks = chunk_paragraphs(text, opts.max_tokens);
    if chunks.is_empty() {
        return Ok(IngestResult { files_processed: 1, ..Default::default() });
    }

    let total = chunks.len();
    let mut item_ids = Vec::with_capacity(total);
    for (i, chunk) in chunks.iter().enumerate() {
        let header = chunk_header(source_id, i, chunk);
        let mut item = MemoryItem {
            tier: MemoryTier::Stm,
            item_type: MemoryType::Note,
            title: chunk_title(title_base, i, total),
            content: format!("{header}\n{}", chunk.text),
            tags: tags.to_vec(),
            provenance: MemoryProvenance {
                source_kind: SourceKind::Doc,
                source_id: source_id.to_string(),
                chunk_ids: vec![format!("{source_id}:{i}")],
                content_hashes: vec![format!("sha256:{sha256}")],
                ..Default::default()
            },
            scope: opts.scope.clone(),
            corpus_id: opts.corpus_id.clone(),
            injectable: opts.injectable,
            ..Default::default()
        };
        store.write_item(&mut item, "ingest")?;
        item_ids.push(item.id);
    }

    Ok(IngestResult {
        files_processed: 1,
        files_skipped: 0,
        chunks_created: total,
        item_ids,
    })
}
