//! Append-only audit events.

use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use memctl_core::{generate_id, now_iso, MemctlResult, MemoryEvent};

/// Append an audit event. Called inside the mutating transaction so
/// the canonical row and its event cannot disagree.
pub fn insert_event(
    conn: &Connection,
    action: &str,
    item_id: Option<&str>,
    details: &serde_json::Value,
    content_hash: &str,
) -> MemctlResult<()> {
    conn.execute(
        "INSERT INTO memory_events
           (id, action, item_id, details_json, content_hash, timestamp)
           VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            generate_id("EVT"),
            action,
            item_id,
            details.to_string(),
            content_hash,
            now_iso(),
        ],
    )?;
    Ok(())
}

/// Query events, newest first, optionally filtered by item or action.
pub fn list_events(
    conn: &Connection,
    item_id: Option<&str>,
    action: Option<&str>,
    limit: usize,
) -> MemctlResult<Vec<MemoryEvent>> {
    let mut conds: Vec<&str> = Vec::new();
    let mut vals: Vec<String> = Vec::new();
    if let Some(id) = item_id {
        conds.push("item_id=?");
        vals.push(id.to_string());
    }
    if let Some(a) = action {
        conds.push("action=?");
        vals.push(a.to_string());
    }
    let where_clause = if conds.is_empty() { "1=1".to_string() } else { conds.join(" AND ") };
    let sql = format!(
        "SELECT id, action, item_id, details_json, content_hash, timestamp
         FROM memory_events WHERE {where_clause} ORDER BY timestamp DESC LIMIT ?"
    );

    let limit = limit as i64;
    let mut sql_params: Vec<&dyn ToSql> = vals.iter().map(|v| v as &dyn ToSql).collect();
    sql_params.push(&limit);

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(&sql_params[..])?;
    let mut events = Vec::new();
    while let Some(row) = rows.next()? {
        let details_json: String = row.get(3)?;
        events.push(MemoryEvent {
            id: row.get(0)?,
            action: row.get(1)?,
            item_id: row.get(2)?,
            details: serde_json::from_str(&details_json)
                .unwrap_or(serde_json::Value::Object(Default::default())),
            content_hash: row.get(4)?,
            timestamp: row.get(5)?,
        });
    }
    Ok(events)
}

/// Count all events (store stats).
pub fn count_events(conn: &Connection) -> MemctlResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM memory_events", [], |row| row.get(0))?)
}
