//! Folder mount registry. Registration is metadata-only; content sync
//! happens in the sync crate. Removing a mount never deletes items.

use rusqlite::{params, Connection, OptionalExtension, Row};

use memctl_core::{generate_id, now_iso, MemctlResult, Mount};

/// Register a mount. Idempotent on canonical path: an existing path
/// returns its mount_id unchanged.
pub fn insert_mount(
    conn: &Connection,
    path: &str,
    name: Option<&str>,
    ignore_patterns: &[String],
    lang_hint: Option<&str>,
) -> MemctlResult<(String, bool)> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT mount_id FROM memory_mounts WHERE path=?1",
            params![path],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(mount_id) = existing {
        return Ok((mount_id, false));
    }

    let mount_id = generate_id("MNT");
    conn.execute(
        "INSERT INTO memory_mounts
           (mount_id, path, name, ignore_json, lang_hint, created_at)
           VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            mount_id,
            path,
            name,
            serde_json::to_string(ignore_patterns)?,
            lang_hint,
            now_iso(),
        ],
    )?;
    Ok((mount_id, true))
}

/// Look up a mount by ID or canonical path.
pub fn get_mount(conn: &Connection, id_or_path: &str) -> MemctlResult<Option<Mount>> {
    let mut stmt = conn.prepare(
        "SELECT mount_id, path, name, ignore_json, lang_hint, created_at, last_sync_at
         FROM memory_mounts WHERE mount_id=?1 OR path=?1",
    )?;
    let mut rows = stmt.query(params![id_or_path])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_mount(row)?)),
        None => Ok(None),
    }
}

/// All mounts in registration order.
pub fn list_mounts(conn: &Connection) -> MemctlResult<Vec<Mount>> {
    let mut stmt = conn.prepare(
        "SELECT mount_id, path, name, ignore_json, lang_hint, created_at, last_sync_at
         FROM memory_mounts ORDER BY created_at",
    )?;
    let mut rows = stmt.query([])?;
    let mut mounts = Vec::new();
    while let Some(row) = rows.next()? {
        mounts.push(row_to_mount(row)?);
    }
    Ok(mounts)
}

/// Remove a mount by ID or name. Returns the removed mount_id, if any.
pub fn remove_mount(conn: &Connection, id_or_name: &str) -> MemctlResult<Option<String>> {
    let mount_id: Option<String> = conn
        .query_row(
            "SELECT mount_id FROM memory_mounts WHERE mount_id=?1 OR name=?1",
            params![id_or_name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = &mount_id {
        conn.execute("DELETE FROM memory_mounts WHERE mount_id=?1", params![id])?;
    }
    Ok(mount_id)
}

/// Stamp `last_sync_at` with the current time.
pub fn update_sync_time(conn: &Connection, mount_id: &str) -> MemctlResult<()> {
    conn.execute(
        "UPDATE memory_mounts SET last_sync_at=?1 WHERE mount_id=?2",
        params![now_iso(), mount_id],
    )?;
    Ok(())
}

fn row_to_mount(row: &Row<'_>) -> MemctlResult<Mount> {
    let ignore_json: String = row.get(3)?;
    Ok(Mount {
        mount_id: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        ignore_patterns: serde_json::from_str(&ignore_json).unwrap_or_default(),
        lang_hint: row.get(4)?,
        created_at: row.get(5)?,
        last_sync_at: row.get(6)?,
    })
}
