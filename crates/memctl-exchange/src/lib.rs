//! # memctl-exchange
//!
//! JSONL backup, migration, and sharing. Export writes one serialized
//! item per line and nothing else — progress belongs on the
//! diagnostic stream, so piped output stays parseable. Import routes
//! every line through the policy engine and deduplicates by content
//! hash; policy is never bypassed.

use std::io::{BufRead, Write};

use tracing::{info, warn};

use memctl_core::{content_hash, generate_id, MemctlResult, MemoryItem, MemoryTier, MemoryType};
use memctl_policy::{apply_verdict, MemoryPolicy, PolicyAction};
use memctl_storage::{ItemFilter, MemoryStore};

/// Export filters.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub tier: Option<MemoryTier>,
    pub item_type: Option<MemoryType>,
    pub scope: Option<String>,
    /// Archived items are excluded by default; opt in to carry them.
    pub include_archived: bool,
}

/// Write matching items as JSONL. Returns the number exported.
pub fn export_items(
    store: &MemoryStore,
    opts: &ExportOptions,
    output: &mut dyn Write,
) -> MemctlResult<usize> {
    let filter = ItemFilter {
        tier: opts.tier,
        item_type: opts.item_type,
        scope: opts.scope.clone(),
        corpus_id: None,
        include_archived: opts.include_archived,
        limit: usize::MAX / 2,
    };
    let items = store.list_items(&filter)?;
    let mut count = 0;
    for item in &items {
        let line = serde_json::to_string(item)?;
        writeln!(output, "{line}")?;
        count += 1;
    }
    info!(count, "exported");
    Ok(count)
}

/// Import knobs.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Keep incoming ids; colliding ids are dedup-skipped. When
    /// false, every imported item gets a fresh id.
    pub preserve_ids: bool,
    /// Count without writing.
    pub dry_run: bool,
}

/// Counts from an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportResult {
    pub total_lines: usize,
    pub imported: usize,
    pub skipped_dedup: usize,
    pub skipped_policy: usize,
    pub errors: usize,
}

/// Import JSONL items from a reader.
///
/// Per line: parse (malformed → error count, continue); id handling
/// per `preserve_ids`; content-hash dedup against everything already
/// in the store; policy verdict — reject drops, quarantine applies its
/// forced fields, accept writes as-is.
pub fn import_items(
    store: &MemoryStore,
    reader: &mut dyn BufRead,
    opts: &ImportOptions,
) -> MemctlResult<ImportResult> {
    let policy = MemoryPolicy::default();
    let mut result = ImportResult::default();

    let existing = store.list_items(&ItemFilter {
        include_archived: true,
        limit: usize::MAX / 2,
        ..Default::default()
    })?;
    let mut existing_hashes: std::collections::HashSet<String> =
        existing.iter().map(|it| it.content_hash()).collect();
    let mut existing_ids: std::collections::HashSet<String> =
        existing.into_iter().map(|it| it.id).collect();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        result.total_lines += 1;

        let mut item: MemoryItem = match serde_json::from_str(line) {
            Ok(item) => item,
            Err(e) => {
                warn!(line = result.total_lines, "malformed JSON: {e}");
                result.errors += 1;
                continue;
            }
        };

        if !opts.preserve_ids {
            item.id = generate_id("MEM");
        } else if existing_ids.contains(&item.id) {
            result.skipped_dedup += 1;
            continue;
        }

        let hash = content_hash(&item.content);
        if existing_hashes.contains(&hash) {
            result.skipped_dedup += 1;
            continue;
        }

        let verdict = policy.evaluate_item(&item);
        match verdict.action {
            PolicyAction::Reject => {
                result.skipped_policy += 1;
                continue;
            }
            PolicyAction::Quarantine => {
                apply_verdict(&mut item, &verdict);
            }
            PolicyAction::Accept => {}
        }

        if !opts.dry_run {
            store.write_item(&mut item, "import")?;
            existing_hashes.insert(hash);
            existing_ids.insert(item.id.clone());
        }
        result.imported += 1;
    }

    info!(
        imported = result.imported,
        dedup = result.skipped_dedup,
        policy = result.skipped_policy,
        errors = result.errors,
        dry_run = opts.dry_run,
        "import finished"
    );
    Ok(result)
}
