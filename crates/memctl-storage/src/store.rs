//! `MemoryStore` — the single owner of the database connection.
//!
//! One write connection guarded by a mutex (serialized writers,
//! race-free revision numbers); WAL mode gives concurrent readers a
//! consistent snapshot. Every multi-row mutation runs in a single
//! transaction, and the (item upsert, revision append, event append)
//! triple is atomic. No code outside this crate touches the FTS index
//! directly — the triggers own it.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::json;
use tracing::{debug, info, warn};

use memctl_core::config::StoreConfig;
use memctl_core::{
    now_iso, MemctlError, MemctlResult, MemoryItem, MemoryLink, SearchMeta,
};

use crate::queries::revision_ops::Revision;
use crate::queries::{
    corpus_ops, event_ops, item_ops, link_ops, meta_ops, mount_ops, revision_ops,
};
use crate::schema;
use crate::search;

pub use crate::queries::item_ops::ItemFilter;

/// Summary statistics for the store.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub total_items: i64,
    pub by_tier: std::collections::BTreeMap<String, i64>,
    pub by_type: std::collections::BTreeMap<String, i64>,
    pub events_count: i64,
    pub embeddings_count: i64,
    pub fts5_available: bool,
    pub fts_tokenizer: Option<String>,
}

/// Row counts cleared (or about to be cleared) by [`MemoryStore::reset`].
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ResetCounts {
    pub items: i64,
    pub revisions: i64,
    pub events: i64,
    pub links: i64,
    pub corpus_hashes: i64,
    pub mounts: i64,
}

struct StoreInner {
    conn: Connection,
    fts_available: bool,
    fts_tokenizer: String,
}

/// SQLite-backed persistent store for memory items.
///
/// All mutations create audit events automatically; writes also append
/// a full-snapshot revision.
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    db_path: String,
}

impl MemoryStore {
    /// Open (or create) a store at `config.db_path`.
    pub fn open(config: &StoreConfig) -> MemctlResult<Self> {
        let conn = if config.db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(Path::new(&config.db_path))?
        };
        Self::initialize(conn, config)
    }

    /// Open a file-backed store with default settings.
    pub fn open_path(db_path: &str) -> MemctlResult<Self> {
        Self::open(&StoreConfig { db_path: db_path.to_string(), ..Default::default() })
    }

    /// Open an in-memory store (tests, dry runs).
    pub fn open_in_memory() -> MemctlResult<Self> {
        Self::open(&StoreConfig { db_path: ":memory:".to_string(), ..Default::default() })
    }

    fn initialize(conn: Connection, config: &StoreConfig) -> MemctlResult<Self> {
        if config.wal_mode && config.db_path != ":memory:" {
            let _mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        }
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // INSERT OR REPLACE must fire the FTS delete trigger.
        conn.pragma_update(None, "recursive_triggers", "ON")?;

        schema::apply_column_migrations(&conn)?;
        conn.execute_batch(schema::SCHEMA_SQL)?;

        meta_ops::set_meta_if_absent(&conn, "schema_version", &schema::SCHEMA_VERSION.to_string())?;
        meta_ops::set_meta_if_absent(&conn, "created_by", "memctl")?;
        meta_ops::set_meta_if_absent(&conn, "created_at", &now_iso())?;

        let tokenizer = config.fts_tokenizer.clone();
        let mut inner = StoreInner { conn, fts_available: false, fts_tokenizer: tokenizer };
        Self::init_fts5(&mut inner)?;

        info!(
            db = %config.db_path,
            fts5 = inner.fts_available,
            tokenizer = %inner.fts_tokenizer,
            "memory store opened"
        );
        Ok(Self { inner: Mutex::new(inner), db_path: config.db_path.clone() })
    }

    /// Create the FTS5 virtual table and sync triggers. A build
    /// without the FTS5 module degrades to LIKE-only search.
    fn init_fts5(inner: &mut StoreInner) -> MemctlResult<()> {
        if let Some(existing) = schema::existing_fts_tokenizer(&inner.conn)? {
            if existing != inner.fts_tokenizer.trim() {
                warn!(
                    existing = %existing,
                    configured = %inner.fts_tokenizer,
                    "FTS tokenizer mismatch; run `memctl reindex` to rebuild the index \
                     with the configured tokenizer"
                );
            }
        }
        let ddl = schema::fts5_schema_sql(&inner.fts_tokenizer)?;
        match inner.conn.execute_batch(&ddl) {
            Ok(()) => {
                inner.fts_available = true;
                meta_ops::set_meta_if_absent(
                    &inner.conn,
                    "fts_tokenizer",
                    &inner.fts_tokenizer,
                )?;
                debug!(tokenizer = %inner.fts_tokenizer, "FTS5 index initialized");
            }
            Err(e) => {
                inner.fts_available = false;
                info!("FTS5 not available, falling back to LIKE search: {e}");
            }
        }
        Ok(())
    }

    /// Path this store was opened on (`:memory:` for in-memory).
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn fts_available(&self) -> bool {
        self.inner.lock().fts_available
    }

    pub fn fts_tokenizer(&self) -> String {
        self.inner.lock().fts_tokenizer.clone()
    }

    // ─── Write path ─────────────────────────────────────────────────────────

    /// Insert or replace an item. Upsert + revision + write event are
    /// one transaction; failure leaves the prior state intact. Sets
    /// `updated_at` on the passed item.
    pub fn write_item(&self, item: &mut MemoryItem, reason: &str) -> MemctlResult<()> {
        let mut inner = self.inner.lock();
        let tx = inner.conn.transaction()?;
        item.updated_at = now_iso();
        item_ops::upsert_item(&tx, item)?;
        let rev_num = revision_ops::next_revision_num(&tx, &item.id)?;
        revision_ops::insert_revision(&tx, item, rev_num, reason)?;
        event_ops::insert_event(
            &tx,
            "write",
            Some(&item.id),
            &json!({ "reason": reason }),
            &item.content_hash(),
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Read a single item. A hit bumps `usage_count`/`last_used_at`
    /// and appends a read event; a miss has no side effects.
    pub fn read_item(&self, item_id: &str) -> MemctlResult<Option<MemoryItem>> {
        let mut inner = self.inner.lock();
        let item = match item_ops::get_item(&inner.conn, item_id)? {
            Some(item) => item,
            None => return Ok(None),
        };
        let tx = inner.conn.transaction()?;
        item_ops::touch_usage(&tx, item_id, &now_iso())?;
        event_ops::insert_event(&tx, "read", Some(item_id), &json!({}), "")?;
        tx.commit()?;
        Ok(Some(item))
    }

    /// Read several items; missing IDs are skipped.
    pub fn read_items(&self, item_ids: &[String]) -> MemctlResult<Vec<MemoryItem>> {
        let mut items = Vec::new();
        for id in item_ids {
            if let Some(item) = self.read_item(id)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Apply a field-level JSON patch. `id` and `created_at` are
    /// immutable and silently skipped. Returns the updated item, or
    /// `None` when the id does not exist.
    pub fn update_item(
        &self,
        item_id: &str,
        patch: &serde_json::Value,
    ) -> MemctlResult<Option<MemoryItem>> {
        let existing = {
            let inner = self.inner.lock();
            item_ops::get_item(&inner.conn, item_id)?
        };
        let existing = match existing {
            Some(item) => item,
            None => return Ok(None),
        };

        let mut value = serde_json::to_value(&existing)?;
        if let (Some(obj), Some(patch_obj)) = (value.as_object_mut(), patch.as_object()) {
            for (key, val) in patch_obj {
                if key == "id" || key == "created_at" {
                    continue;
                }
                obj.insert(key.clone(), val.clone());
            }
        }
        let mut updated: MemoryItem = serde_json::from_value(value)
            .map_err(|e| MemctlError::Validation(format!("invalid patch: {e}")))?;
        updated.id = existing.id.clone();
        updated.created_at = existing.created_at.clone();

        self.write_item(&mut updated, "update")?;
        Ok(Some(updated))
    }

    /// Soft delete: set `archived`, never remove rows.
    pub fn delete_item(&self, item_id: &str) -> MemctlResult<bool> {
        Ok(self.update_item(item_id, &json!({ "archived": true }))?.is_some())
    }

    /// Mark `old_id` superseded by `new_id` and archive it.
    pub fn supersede_item(&self, old_id: &str, new_id: &str) -> MemctlResult<bool> {
        Ok(self
            .update_item(old_id, &json!({ "superseded_by": new_id, "archived": true }))?
            .is_some())
    }

    // ─── Query path ─────────────────────────────────────────────────────────

    /// Full-text search through the cascade (§ search module). Returns
    /// the ordered results and the advisory resolution metadata.
    pub fn search_fulltext(
        &self,
        query: &str,
        filter: &ItemFilter,
    ) -> MemctlResult<(Vec<MemoryItem>, SearchMeta)> {
        let inner = self.inner.lock();
        search::search_fulltext(
            &inner.conn,
            inner.fts_available,
            &inner.fts_tokenizer,
            query,
            filter,
        )
    }

    /// Items whose tag set overlaps `tags` (case-folded, any match),
    /// newest update first.
    pub fn search_by_tags(
        &self,
        tags: &[String],
        filter: &ItemFilter,
    ) -> MemctlResult<Vec<MemoryItem>> {
        let rows = {
            let inner = self.inner.lock();
            item_ops::list_items(&inner.conn, filter)?
        };
        let wanted: std::collections::HashSet<String> =
            tags.iter().map(|t| t.to_lowercase()).collect();
        Ok(rows
            .into_iter()
            .filter(|item| item.tags.iter().any(|t| wanted.contains(&t.to_lowercase())))
            .collect())
    }

    pub fn list_items(&self, filter: &ItemFilter) -> MemctlResult<Vec<MemoryItem>> {
        let inner = self.inner.lock();
        item_ops::list_items(&inner.conn, filter)
    }

    pub fn count_items(&self, filter: &ItemFilter) -> MemctlResult<i64> {
        let inner = self.inner.lock();
        item_ops::count_items(&inner.conn, filter)
    }

    // ─── Links, events, revisions ───────────────────────────────────────────

    /// Create a link; appends a `link` event in the same transaction.
    pub fn write_link(&self, link: &MemoryLink) -> MemctlResult<()> {
        let mut inner = self.inner.lock();
        let tx = inner.conn.transaction()?;
        link_ops::insert_link(&tx, link)?;
        event_ops::insert_event(
            &tx,
            "link",
            Some(&link.src_id),
            &json!({ "dst_id": link.dst_id, "rel": link.rel }),
            "",
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn read_links(&self, item_id: &str) -> MemctlResult<Vec<MemoryLink>> {
        let inner = self.inner.lock();
        link_ops::links_for(&inner.conn, item_id)
    }

    pub fn read_events(
        &self,
        item_id: Option<&str>,
        action: Option<&str>,
        limit: usize,
    ) -> MemctlResult<Vec<memctl_core::MemoryEvent>> {
        let inner = self.inner.lock();
        event_ops::list_events(&inner.conn, item_id, action, limit)
    }

    pub fn read_revisions(&self, item_id: &str) -> MemctlResult<Vec<Revision>> {
        let inner = self.inner.lock();
        revision_ops::list_revisions(&inner.conn, item_id)
    }

    /// Append a bare audit event outside a write (consolidate,
    /// orchestration steps).
    pub fn log_event(
        &self,
        action: &str,
        item_id: Option<&str>,
        details: serde_json::Value,
    ) -> MemctlResult<()> {
        let inner = self.inner.lock();
        event_ops::insert_event(&inner.conn, action, item_id, &details, "")
    }

    // ─── Stats & reset ──────────────────────────────────────────────────────

    pub fn stats(&self) -> MemctlResult<StoreStats> {
        let inner = self.inner.lock();
        let conn = &inner.conn;
        let total_items: i64 =
            conn.query_row("SELECT COUNT(*) FROM memory_items WHERE archived=0", [], |r| {
                r.get(0)
            })?;

        let mut by_tier = std::collections::BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT tier, COUNT(*) FROM memory_items WHERE archived=0 GROUP BY tier",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            by_tier.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)?);
        }

        let mut by_type = std::collections::BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT type, COUNT(*) FROM memory_items WHERE archived=0 GROUP BY type",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            by_type.insert(row.get::<_, String>(0)?, row.get::<_, i64>(1)?);
        }

        let events_count = event_ops::count_events(conn)?;
        let embeddings_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM memory_embeddings", [], |r| r.get(0))?;

        Ok(StoreStats {
            total_items,
            by_tier,
            by_type,
            events_count,
            embeddings_count,
            fts5_available: inner.fts_available,
            fts_tokenizer: if inner.fts_available {
                Some(inner.fts_tokenizer.clone())
            } else {
                None
            },
        })
    }

    /// Clear items, revisions, events, links, and corpus hashes —
    /// mounts too unless preserved. `schema_meta` always survives.
    /// Logs a `reset` event carrying the cleared counts.
    pub fn reset(&self, preserve_mounts: bool, dry_run: bool) -> MemctlResult<ResetCounts> {
        let mut inner = self.inner.lock();
        let count =
            |conn: &Connection, table: &str| -> MemctlResult<i64> {
                Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
            };
        let counts = ResetCounts {
            items: count(&inner.conn, "memory_items")?,
            revisions: count(&inner.conn, "memory_revisions")?,
            events: count(&inner.conn, "memory_events")?,
            links: count(&inner.conn, "memory_links")?,
            corpus_hashes: count(&inner.conn, "corpus_hashes")?,
            mounts: if preserve_mounts { 0 } else { count(&inner.conn, "memory_mounts")? },
        };
        if dry_run {
            return Ok(counts);
        }

        let tx = inner.conn.transaction()?;
        tx.execute("DELETE FROM memory_items", [])?;
        tx.execute("DELETE FROM memory_revisions", [])?;
        tx.execute("DELETE FROM memory_events", [])?;
        tx.execute("DELETE FROM memory_links", [])?;
        tx.execute("DELETE FROM corpus_hashes", [])?;
        if !preserve_mounts {
            tx.execute("DELETE FROM memory_mounts", [])?;
        }
        event_ops::insert_event(
            &tx,
            "reset",
            None,
            &serde_json::to_value(counts)?,
            "",
        )?;
        tx.commit()?;
        info!(?counts, "store reset");
        Ok(counts)
    }

    // ─── FTS lifecycle ──────────────────────────────────────────────────────

    /// Rebuild the FTS5 index. With a differing `tokenizer` the index
    /// is dropped and recreated; otherwise an in-place `'rebuild'`.
    /// Records tokenizer identity in `schema_meta`, appends a
    /// `reindex` event, and returns the indexed item count (-1 when
    /// FTS5 is unavailable).
    pub fn rebuild_fts(&self, tokenizer: Option<&str>) -> MemctlResult<i64> {
        let mut inner = self.inner.lock();

        if let Some(requested) = tokenizer {
            let requested = schema::validate_fts_tokenizer(requested)?;
            if requested != inner.fts_tokenizer {
                info!(
                    from = %inner.fts_tokenizer,
                    to = %requested,
                    "FTS tokenizer change"
                );
                inner.conn.execute("DROP TABLE IF EXISTS memory_items_fts", [])?;
                for suffix in ["ai", "bd", "bu", "au"] {
                    inner
                        .conn
                        .execute(&format!("DROP TRIGGER IF EXISTS memory_items_fts_{suffix}"), [])?;
                }
                inner.fts_tokenizer = requested;
                Self::init_fts5(&mut inner)?;
                if !inner.fts_available {
                    return Ok(-1);
                }
            }
        }

        if !inner.fts_available {
            warn!("rebuild_fts called but FTS5 is not available");
            return Ok(-1);
        }

        inner
            .conn
            .execute("INSERT INTO memory_items_fts(memory_items_fts) VALUES ('rebuild')", [])?;
        let count: i64 =
            inner.conn.query_row("SELECT COUNT(*) FROM memory_items", [], |r| r.get(0))?;

        meta_ops::set_meta(&inner.conn, "fts_tokenizer", &inner.fts_tokenizer)?;
        meta_ops::set_meta(&inner.conn, "fts_indexed_at", &now_iso())?;
        let reindex_count = meta_ops::get_meta(&inner.conn, "fts_reindex_count")?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
            + 1;
        meta_ops::set_meta(&inner.conn, "fts_reindex_count", &reindex_count.to_string())?;
        event_ops::insert_event(
            &inner.conn,
            "reindex",
            None,
            &json!({ "tokenizer": inner.fts_tokenizer, "items": count }),
            "",
        )?;

        info!(items = count, tokenizer = %inner.fts_tokenizer, "FTS5 index rebuilt");
        Ok(count)
    }

    /// Raw `schema_meta` read (forward-compat probes, stats).
    pub fn schema_meta(&self, key: &str) -> MemctlResult<Option<String>> {
        let inner = self.inner.lock();
        meta_ops::get_meta(&inner.conn, key)
    }

    // ─── Corpus-hash registry ───────────────────────────────────────────────

    pub fn write_corpus_hash(&self, entry: &memctl_core::CorpusFile) -> MemctlResult<()> {
        let inner = self.inner.lock();
        corpus_ops::upsert_corpus_hash(&inner.conn, entry)
    }

    pub fn read_corpus_hash(
        &self,
        file_path: &str,
    ) -> MemctlResult<Option<memctl_core::CorpusFile>> {
        let inner = self.inner.lock();
        corpus_ops::get_corpus_hash(&inner.conn, file_path)
    }

    pub fn list_corpus_files(
        &self,
        mount_id: Option<&str>,
    ) -> MemctlResult<Vec<memctl_core::CorpusFile>> {
        let inner = self.inner.lock();
        corpus_ops::list_corpus_files(&inner.conn, mount_id)
    }

    // ─── Mount registry ─────────────────────────────────────────────────────

    /// Register a mount (idempotent on path). Logs `mount_register`
    /// only when the mount is new.
    pub fn write_mount(
        &self,
        path: &str,
        name: Option<&str>,
        ignore_patterns: &[String],
        lang_hint: Option<&str>,
    ) -> MemctlResult<String> {
        let mut inner = self.inner.lock();
        let tx = inner.conn.transaction()?;
        let (mount_id, created) =
            mount_ops::insert_mount(&tx, path, name, ignore_patterns, lang_hint)?;
        if created {
            event_ops::insert_event(
                &tx,
                "mount_register",
                None,
                &json!({ "mount_id": mount_id, "path": path }),
                "",
            )?;
        }
        tx.commit()?;
        Ok(mount_id)
    }

    pub fn read_mount(&self, id_or_path: &str) -> MemctlResult<Option<memctl_core::Mount>> {
        let inner = self.inner.lock();
        mount_ops::get_mount(&inner.conn, id_or_path)
    }

    pub fn list_mounts(&self) -> MemctlResult<Vec<memctl_core::Mount>> {
        let inner = self.inner.lock();
        mount_ops::list_mounts(&inner.conn)
    }

    /// Remove a mount by ID or name. Items and corpus hashes survive —
    /// mount removal is never destructive to content.
    pub fn remove_mount(&self, id_or_name: &str) -> MemctlResult<bool> {
        let mut inner = self.inner.lock();
        let tx = inner.conn.transaction()?;
        let removed = mount_ops::remove_mount(&tx, id_or_name)?;
        if let Some(mount_id) = &removed {
            event_ops::insert_event(
                &tx,
                "mount_remove",
                None,
                &json!({ "mount_id": mount_id }),
                "",
            )?;
        }
        tx.commit()?;
        Ok(removed.is_some())
    }

    pub fn update_mount_sync_time(&self, mount_id: &str) -> MemctlResult<()> {
        let inner = self.inner.lock();
        mount_ops::update_sync_time(&inner.conn, mount_id)
    }
}
