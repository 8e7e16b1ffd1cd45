//! Recall feeding the loop's context merge.
//!
//! Non-injectable items are always excluded here — this is a
//! context-injection pathway. With a mount scope, the allowed-id set
//! is materialized from the mount's corpus-hash entries first.

use std::collections::HashSet;

use memctl_core::{MemctlResult, MemoryItem};
use memctl_storage::{ItemFilter, MemoryStore};

/// Full-text recall, filtered to injectable items and (optionally) to
/// the items belonging to one mount.
pub fn recall_items(
    store: &MemoryStore,
    query: &str,
    limit: usize,
    mount_id: Option<&str>,
) -> MemctlResult<Vec<MemoryItem>> {
    let allowed_ids: Option<HashSet<String>> = match mount_id {
        Some(id) => {
            let mut ids = HashSet::new();
            for cf in store.list_corpus_files(Some(id))? {
                ids.extend(cf.item_ids);
            }
            Some(ids)
        }
        None => None,
    };

    let (items, _meta) =
        store.search_fulltext(query, &ItemFilter { limit, ..Default::default() })?;
    Ok(items
        .into_iter()
        .filter(|item| item.injectable)
        .filter(|item| allowed_ids.as_ref().map(|ids| ids.contains(&item.id)).unwrap_or(true))
        .collect())
}
