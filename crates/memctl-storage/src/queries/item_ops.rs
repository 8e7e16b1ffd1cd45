//! Insert, get, list, count for canonical memory items.

use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};

use memctl_core::{
    MemctlError, MemctlResult, MemoryItem, MemoryProvenance, MemoryTier, MemoryType,
    ValidationState,
};

/// Column list shared by every SELECT over `memory_items`, in the
/// order [`row_to_item`] expects.
pub const ITEM_COLUMNS: &str = "id, tier, type, title, content, tags, entities, \
     links_json, provenance_json, confidence, validation, scope, expires_at, \
     usage_count, last_used_at, created_at, updated_at, rule_id, superseded_by, \
     archived, content_hash, corpus_id, injectable";

/// Common filters over item queries.
#[derive(Debug, Clone)]
pub struct ItemFilter {
    pub tier: Option<MemoryTier>,
    pub item_type: Option<MemoryType>,
    pub scope: Option<String>,
    pub corpus_id: Option<String>,
    /// Archived items are excluded by default.
    pub include_archived: bool,
    pub limit: usize,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            tier: None,
            item_type: None,
            scope: None,
            corpus_id: None,
            include_archived: false,
            limit: 100,
        }
    }
}

impl ItemFilter {
    /// WHERE conditions and owned parameter values for this filter.
    pub fn conditions(&self) -> (Vec<String>, Vec<String>) {
        let mut conds = Vec::new();
        let mut vals = Vec::new();
        if !self.include_archived {
            conds.push("archived=0".to_string());
        }
        if let Some(tier) = self.tier {
            conds.push("tier=?".to_string());
            vals.push(tier.as_str().to_string());
        }
        if let Some(item_type) = self.item_type {
            conds.push("type=?".to_string());
            vals.push(item_type.as_str().to_string());
        }
        if let Some(scope) = &self.scope {
            conds.push("scope=?".to_string());
            vals.push(scope.clone());
        }
        if let Some(corpus_id) = &self.corpus_id {
            conds.push("corpus_id=?".to_string());
            vals.push(corpus_id.clone());
        }
        (conds, vals)
    }
}

/// Upsert the canonical row. `content_hash` is derived here.
pub fn upsert_item(conn: &Connection, item: &MemoryItem) -> MemctlResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO memory_items
           (id, tier, type, title, content, tags, entities,
            links_json, provenance_json, confidence, validation,
            scope, expires_at, usage_count, last_used_at,
            created_at, updated_at, rule_id, superseded_by, archived,
            content_hash, corpus_id, injectable)
           VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)",
        params![
            item.id,
            item.tier.as_str(),
            item.item_type.as_str(),
            item.title,
            item.content,
            serde_json::to_string(&item.tags)?,
            serde_json::to_string(&item.entities)?,
            serde_json::to_string(&item.links)?,
            serde_json::to_string(&item.provenance)?,
            item.confidence,
            item.validation.as_str(),
            item.scope,
            item.expires_at,
            item.usage_count,
            item.last_used_at,
            item.created_at,
            item.updated_at,
            item.rule_id,
            item.superseded_by,
            item.archived as i64,
            item.content_hash(),
            item.corpus_id,
            item.injectable as i64,
        ],
    )?;
    Ok(())
}

/// Fetch a single item. No side effects; usage touching is the
/// store's responsibility.
pub fn get_item(conn: &Connection, item_id: &str) -> MemctlResult<Option<MemoryItem>> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM memory_items WHERE id=?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![item_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_item(row)?)),
        None => Ok(None),
    }
}

/// Bump usage tracking on a read hit. Leaves `updated_at` alone.
pub fn touch_usage(conn: &Connection, item_id: &str, now_iso: &str) -> MemctlResult<()> {
    conn.execute(
        "UPDATE memory_items SET usage_count=usage_count+1, last_used_at=?1 WHERE id=?2",
        params![now_iso, item_id],
    )?;
    Ok(())
}

/// List items under a filter, newest update first.
pub fn list_items(conn: &Connection, filter: &ItemFilter) -> MemctlResult<Vec<MemoryItem>> {
    let (conds, vals) = filter.conditions();
    let where_clause = if conds.is_empty() { "1=1".to_string() } else { conds.join(" AND ") };
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM memory_items WHERE {where_clause} \
         ORDER BY updated_at DESC LIMIT ?"
    );

    let limit = filter.limit as i64;
    let mut sql_params: Vec<&dyn ToSql> = vals.iter().map(|v| v as &dyn ToSql).collect();
    sql_params.push(&limit);

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(&sql_params[..])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(row_to_item(row)?);
    }
    Ok(items)
}

/// Count items under a filter (limit is ignored).
pub fn count_items(conn: &Connection, filter: &ItemFilter) -> MemctlResult<i64> {
    let (conds, vals) = filter.conditions();
    let where_clause = if conds.is_empty() { "1=1".to_string() } else { conds.join(" AND ") };
    let sql = format!("SELECT COUNT(*) FROM memory_items WHERE {where_clause}");
    let sql_params: Vec<&dyn ToSql> = vals.iter().map(|v| v as &dyn ToSql).collect();
    let count = conn.query_row(&sql, &sql_params[..], |row| row.get(0))?;
    Ok(count)
}

/// Parse a row (in [`ITEM_COLUMNS`] order) into a `MemoryItem`.
pub fn row_to_item(row: &Row<'_>) -> MemctlResult<MemoryItem> {
    let tier_str: String = row.get(1)?;
    let type_str: String = row.get(2)?;
    let validation_str: String = row.get(10)?;
    let tags_json: String = row.get(5)?;
    let entities_json: String = row.get(6)?;
    let links_json: String = row.get(7)?;
    let provenance_json: String = row.get(8)?;

    let provenance: MemoryProvenance = serde_json::from_str(&provenance_json)
        .map_err(|e| MemctlError::Storage(format!("parse provenance: {e}")))?;

    Ok(MemoryItem {
        id: row.get(0)?,
        tier: MemoryTier::parse(&tier_str)?,
        item_type: MemoryType::coerce(&type_str),
        title: row.get(3)?,
        content: row.get(4)?,
        tags: serde_json::from_str(&tags_json)
            .map_err(|e| MemctlError::Storage(format!("parse tags: {e}")))?,
        entities: serde_json::from_str(&entities_json)
            .map_err(|e| MemctlError::Storage(format!("parse entities: {e}")))?,
        links: serde_json::from_str(&links_json)
            .map_err(|e| MemctlError::Storage(format!("parse links: {e}")))?,
        provenance,
        confidence: row.get(9)?,
        validation: ValidationState::parse(&validation_str)?,
        scope: row.get(11)?,
        expires_at: row.get(12)?,
        usage_count: row.get(13)?,
        last_used_at: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        rule_id: row.get(17)?,
        superseded_by: row.get(18)?,
        archived: row.get::<_, i64>(19)? != 0,
        corpus_id: row.get(21)?,
        injectable: row.get::<_, i64>(22).unwrap_or(1) != 0,
    })
}
