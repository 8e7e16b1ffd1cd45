//! Append-only revision history.

use rusqlite::{params, Connection};
use serde_json::Value;

use memctl_core::{generate_id, now_iso, MemctlResult, MemoryItem};

/// One entry of an item's revision history.
#[derive(Debug, Clone)]
pub struct Revision {
    pub revision_id: String,
    pub item_id: String,
    pub revision_num: i64,
    pub snapshot: Value,
    pub changed_at: String,
    pub reason: String,
}

/// Next revision number for an item: `max + 1`, starting at 1.
/// Race-free because the caller holds the store's write lock.
pub fn next_revision_num(conn: &Connection, item_id: &str) -> MemctlResult<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(revision_num) FROM memory_revisions WHERE item_id=?1",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

/// Append a full-snapshot revision for an item.
pub fn insert_revision(
    conn: &Connection,
    item: &MemoryItem,
    revision_num: i64,
    reason: &str,
) -> MemctlResult<()> {
    conn.execute(
        "INSERT INTO memory_revisions
           (revision_id, item_id, revision_num, snapshot, changed_at, reason)
           VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            generate_id("REV"),
            item.id,
            revision_num,
            item.to_json()?,
            now_iso(),
            reason,
        ],
    )?;
    Ok(())
}

/// Full revision history for an item, ordered by revision number.
pub fn list_revisions(conn: &Connection, item_id: &str) -> MemctlResult<Vec<Revision>> {
    let mut stmt = conn.prepare(
        "SELECT revision_id, item_id, revision_num, snapshot, changed_at, reason
         FROM memory_revisions WHERE item_id=?1 ORDER BY revision_num",
    )?;
    let mut rows = stmt.query(params![item_id])?;
    let mut revisions = Vec::new();
    while let Some(row) = rows.next()? {
        let snapshot_json: String = row.get(3)?;
        revisions.push(Revision {
            revision_id: row.get(0)?,
            item_id: row.get(1)?,
            revision_num: row.get(2)?,
            snapshot: serde_json::from_str(&snapshot_json)?,
            changed_at: row.get(4)?,
            reason: row.get(5)?,
        });
    }
    Ok(revisions)
}
