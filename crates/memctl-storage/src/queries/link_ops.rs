//! Typed inter-item links.

use rusqlite::{params, Connection};

use memctl_core::{MemctlResult, MemoryLink};

/// Upsert a link row (src, dst, rel) — re-linking refreshes created_at.
pub fn insert_link(conn: &Connection, link: &MemoryLink) -> MemctlResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO memory_links (src_id, dst_id, rel, created_at)
         VALUES (?1,?2,?3,?4)",
        params![link.src_id, link.dst_id, link.rel, link.created_at],
    )?;
    Ok(())
}

/// All links touching an item, in either direction.
pub fn links_for(conn: &Connection, item_id: &str) -> MemctlResult<Vec<MemoryLink>> {
    let mut stmt = conn.prepare(
        "SELECT src_id, dst_id, rel, created_at FROM memory_links
         WHERE src_id=?1 OR dst_id=?1",
    )?;
    let mut rows = stmt.query(params![item_id])?;
    let mut links = Vec::new();
    while let Some(row) = rows.next()? {
        links.push(MemoryLink {
            src_id: row.get(0)?,
            dst_id: row.get(1)?,
            rel: row.get(2)?,
            created_at: row.get(3)?,
        });
    }
    Ok(links)
}
