//! `schema_meta` key-value access.

use rusqlite::{params, Connection, OptionalExtension};

use memctl_core::MemctlResult;

/// Read a meta value.
pub fn get_meta(conn: &Connection, key: &str) -> MemctlResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key=?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

/// Set a meta value, overwriting any existing one.
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> MemctlResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1,?2)",
        params![key, value],
    )?;
    Ok(())
}

/// Set a meta value only if the key is absent (creation identity).
pub fn set_meta_if_absent(conn: &Connection, key: &str, value: &str) -> MemctlResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES (?1,?2)",
        params![key, value],
    )?;
    Ok(())
}
