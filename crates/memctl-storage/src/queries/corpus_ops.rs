//! Corpus-hash registry: one row per ingested file, keyed by absolute
//! path. Drives the 3-tier sync delta and the inspect summary.

use rusqlite::{params, Connection, Row};

use memctl_core::{now_iso, CorpusFile, MemctlResult};

/// Record or refresh the hash entry for an ingested file.
pub fn upsert_corpus_hash(conn: &Connection, entry: &CorpusFile) -> MemctlResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO corpus_hashes
           (file_path, sha256, chunk_count, item_ids, ingested_at,
            mount_id, rel_path, ext, size_bytes, mtime_epoch, lang_hint)
           VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
        params![
            entry.file_path,
            entry.sha256,
            entry.chunk_count,
            serde_json::to_string(&entry.item_ids)?,
            if entry.ingested_at.is_empty() { now_iso() } else { entry.ingested_at.clone() },
            entry.mount_id,
            entry.rel_path,
            entry.ext,
            entry.size_bytes,
            entry.mtime_epoch,
            entry.lang_hint,
        ],
    )?;
    Ok(())
}

/// Stored entry for a file, or `None` when it was never ingested.
pub fn get_corpus_hash(conn: &Connection, file_path: &str) -> MemctlResult<Option<CorpusFile>> {
    let mut stmt = conn.prepare(
        "SELECT file_path, sha256, chunk_count, item_ids, ingested_at,
                mount_id, rel_path, ext, size_bytes, mtime_epoch, lang_hint
         FROM corpus_hashes WHERE file_path=?1",
    )?;
    let mut rows = stmt.query(params![file_path])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_corpus_file(row)?)),
        None => Ok(None),
    }
}

/// All corpus files, optionally scoped to a mount, ordered by path
/// (deterministic for inspect).
pub fn list_corpus_files(
    conn: &Connection,
    mount_id: Option<&str>,
) -> MemctlResult<Vec<CorpusFile>> {
    let sql = match mount_id {
        Some(_) => {
            "SELECT file_path, sha256, chunk_count, item_ids, ingested_at,
                    mount_id, rel_path, ext, size_bytes, mtime_epoch, lang_hint
             FROM corpus_hashes WHERE mount_id=?1 ORDER BY file_path"
        }
        None => {
            "SELECT file_path, sha256, chunk_count, item_ids, ingested_at,
                    mount_id, rel_path, ext, size_bytes, mtime_epoch, lang_hint
             FROM corpus_hashes ORDER BY file_path"
        }
    };
    let mut stmt = conn.prepare(sql)?;
    let mut rows = match mount_id {
        Some(id) => stmt.query(params![id])?,
        None => stmt.query([])?,
    };
    let mut files = Vec::new();
    while let Some(row) = rows.next()? {
        files.push(row_to_corpus_file(row)?);
    }
    Ok(files)
}

fn row_to_corpus_file(row: &Row<'_>) -> MemctlResult<CorpusFile> {
    let item_ids_json: String = row.get(3)?;
    Ok(CorpusFile {
        file_path: row.get(0)?,
        sha256: row.get(1)?,
        chunk_count: row.get(2)?,
        item_ids: serde_json::from_str(&item_ids_json).unwrap_or_default(),
        ingested_at: row.get(4)?,
        mount_id: row.get(5)?,
        rel_path: row.get(6)?,
        ext: row.get(7)?,
        size_bytes: row.get(8)?,
        mtime_epoch: row.get(9)?,
        lang_hint: row.get(10)?,
    })
}
