//! Schema DDL, tokenizer validation, and the FTS5 virtual table.
//!
//! The schema is frozen once a database is created: new columns arrive
//! only through idempotent `ALTER TABLE ... ADD COLUMN` at open time,
//! and `schema_meta` records a monotone version so stricter downstream
//! consumers can open the file read-only and know what they hold.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;

use memctl_core::{MemctlError, MemctlResult};

/// Monotone schema version recorded in `schema_meta`.
pub const SCHEMA_VERSION: u32 = 2;

/// Base DDL. Every table a downstream consumer must be able to see,
/// including the reserved embedding and palace tables.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS memory_items (
    id              TEXT PRIMARY KEY,
    tier            TEXT NOT NULL CHECK(tier IN ('stm','mtm','ltm')),
    type            TEXT NOT NULL,
    title           TEXT NOT NULL DEFAULT '',
    content         TEXT NOT NULL DEFAULT '',
    tags            TEXT NOT NULL DEFAULT '[]',
    entities        TEXT NOT NULL DEFAULT '[]',
    links_json      TEXT NOT NULL DEFAULT '[]',
    provenance_json TEXT NOT NULL DEFAULT '{}',
    confidence      REAL NOT NULL DEFAULT 0.5,
    validation      TEXT NOT NULL DEFAULT 'unverified',
    scope           TEXT NOT NULL DEFAULT 'project',
    expires_at      TEXT,
    usage_count     INTEGER NOT NULL DEFAULT 0,
    last_used_at    TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    rule_id         TEXT,
    superseded_by   TEXT,
    archived        INTEGER NOT NULL DEFAULT 0,
    content_hash    TEXT NOT NULL DEFAULT '',
    corpus_id       TEXT,
    injectable      INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS memory_revisions (
    revision_id  TEXT PRIMARY KEY,
    item_id      TEXT NOT NULL,
    revision_num INTEGER NOT NULL,
    snapshot     TEXT NOT NULL,
    changed_at   TEXT NOT NULL,
    reason       TEXT NOT NULL DEFAULT 'update'
);

-- Reserved for a richer downstream consumer; never written here.
CREATE TABLE IF NOT EXISTS memory_embeddings (
    item_id    TEXT PRIMARY KEY,
    model_name TEXT NOT NULL,
    dimension  INTEGER NOT NULL,
    vector     BLOB NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memory_links (
    src_id     TEXT NOT NULL,
    dst_id     TEXT NOT NULL,
    rel        TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (src_id, dst_id, rel)
);

-- Reserved for a richer downstream consumer; never written here.
CREATE TABLE IF NOT EXISTS memory_palace_locations (
    item_id     TEXT PRIMARY KEY,
    domain      TEXT NOT NULL DEFAULT 'default',
    room        TEXT NOT NULL DEFAULT '',
    shelf       TEXT NOT NULL DEFAULT '',
    card        TEXT NOT NULL DEFAULT '',
    assigned_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memory_events (
    id            TEXT PRIMARY KEY,
    action        TEXT NOT NULL,
    item_id       TEXT,
    details_json  TEXT NOT NULL DEFAULT '{}',
    content_hash  TEXT NOT NULL DEFAULT '',
    timestamp     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS corpus_hashes (
    file_path   TEXT PRIMARY KEY,
    sha256      TEXT NOT NULL,
    chunk_count INTEGER NOT NULL DEFAULT 0,
    item_ids    TEXT NOT NULL DEFAULT '[]',
    ingested_at TEXT NOT NULL,
    mount_id    TEXT,
    rel_path    TEXT,
    ext         TEXT,
    size_bytes  INTEGER,
    mtime_epoch INTEGER,
    lang_hint   TEXT
);

CREATE TABLE IF NOT EXISTS memory_mounts (
    mount_id     TEXT PRIMARY KEY,
    path         TEXT NOT NULL UNIQUE,
    name         TEXT,
    ignore_json  TEXT NOT NULL DEFAULT '[]',
    lang_hint    TEXT,
    created_at   TEXT NOT NULL,
    last_sync_at TEXT
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_tier ON memory_items(tier);
CREATE INDEX IF NOT EXISTS idx_items_type ON memory_items(type);
CREATE INDEX IF NOT EXISTS idx_items_scope ON memory_items(scope);
CREATE INDEX IF NOT EXISTS idx_items_archived ON memory_items(archived);
CREATE INDEX IF NOT EXISTS idx_items_corpus ON memory_items(corpus_id);
CREATE INDEX IF NOT EXISTS idx_revisions_item ON memory_revisions(item_id);
CREATE INDEX IF NOT EXISTS idx_events_action ON memory_events(action);
CREATE INDEX IF NOT EXISTS idx_events_item ON memory_events(item_id);
CREATE INDEX IF NOT EXISTS idx_corpus_mount ON corpus_hashes(mount_id);
";

/// Columns added after the initial schema. Applied with idempotent
/// `ALTER TABLE ... ADD COLUMN` so older databases open cleanly.
const COLUMN_MIGRATIONS: &[(&str, &str)] = &[
    ("memory_items", "corpus_id TEXT"),
    ("memory_items", "injectable INTEGER NOT NULL DEFAULT 1"),
    ("corpus_hashes", "mount_id TEXT"),
    ("corpus_hashes", "rel_path TEXT"),
    ("corpus_hashes", "ext TEXT"),
    ("corpus_hashes", "size_bytes INTEGER"),
    ("corpus_hashes", "mtime_epoch INTEGER"),
    ("corpus_hashes", "lang_hint TEXT"),
];

/// Add late columns to a pre-existing database. A duplicate-column
/// error means the column is already there; anything else propagates.
pub fn apply_column_migrations(conn: &Connection) -> MemctlResult<()> {
    for (table, column) in COLUMN_MIGRATIONS {
        let sql = format!("ALTER TABLE {table} ADD COLUMN {column}");
        match conn.execute(&sql, []) {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(_, Some(msg)))
                if msg.contains("duplicate column") || msg.contains("no such table") => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

// ─── FTS5 tokenizer lifecycle ────────────────────────────────────────────────

/// Well-known presets for the `--fts-tokenizer` flag.
pub const FTS_TOKENIZER_PRESETS: &[(&str, &str)] = &[
    ("fr", "unicode61 remove_diacritics 2"),
    ("en", "porter unicode61 remove_diacritics 2"),
    ("raw", "unicode61"),
];

/// Resolve a preset name to its tokenizer string; unknown names pass
/// through unchanged (raw tokenizer strings are validated later).
pub fn resolve_tokenizer_preset(value: &str) -> String {
    FTS_TOKENIZER_PRESETS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, tok)| tok.to_string())
        .unwrap_or_else(|| value.to_string())
}

static FTS_TOKENIZER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_ .\-]+$").unwrap());

/// Validate an FTS5 tokenizer string against the conservative
/// whitelist. Quotes, semicolons, and parentheses are rejected — the
/// string is spliced into DDL.
pub fn validate_fts_tokenizer(tokenizer: &str) -> MemctlResult<String> {
    let tokenizer = tokenizer.trim();
    if tokenizer.is_empty() {
        return Err(MemctlError::Validation(
            "FTS5 tokenizer string cannot be empty".to_string(),
        ));
    }
    if !FTS_TOKENIZER_RE.is_match(tokenizer) {
        return Err(MemctlError::Validation(format!(
            "unsafe FTS5 tokenizer string: {tokenizer:?} (only [a-zA-Z0-9_ .-] allowed)"
        )));
    }
    Ok(tokenizer.to_string())
}

/// FTS5 DDL with a validated tokenizer spliced in.
///
/// External-content mode: the index mirrors `memory_items` without
/// duplicating data. The triggers keep it in sync; the DELETE trigger
/// is BEFORE DELETE so the old rowid is still reachable. With
/// `recursive_triggers` on, `INSERT OR REPLACE` fires delete+insert and
/// both paths stay consistent.
pub fn fts5_schema_sql(tokenizer: &str) -> MemctlResult<String> {
    let safe = validate_fts_tokenizer(tokenizer)?;
    Ok(format!(
        "
CREATE VIRTUAL TABLE IF NOT EXISTS memory_items_fts USING fts5(
    title, content, tags, entities,
    content='memory_items',
    content_rowid='rowid',
    tokenize='{safe}'
);

CREATE TRIGGER IF NOT EXISTS memory_items_fts_ai
AFTER INSERT ON memory_items BEGIN
    INSERT INTO memory_items_fts(rowid, title, content, tags, entities)
    VALUES (new.rowid, new.title, new.content, new.tags, new.entities);
END;

CREATE TRIGGER IF NOT EXISTS memory_items_fts_bd
BEFORE DELETE ON memory_items BEGIN
    INSERT INTO memory_items_fts(memory_items_fts, rowid, title, content, tags, entities)
    VALUES ('delete', old.rowid, old.title, old.content, old.tags, old.entities);
END;

CREATE TRIGGER IF NOT EXISTS memory_items_fts_bu
BEFORE UPDATE ON memory_items BEGIN
    INSERT INTO memory_items_fts(memory_items_fts, rowid, title, content, tags, entities)
    VALUES ('delete', old.rowid, old.title, old.content, old.tags, old.entities);
END;

CREATE TRIGGER IF NOT EXISTS memory_items_fts_au
AFTER UPDATE ON memory_items BEGIN
    INSERT INTO memory_items_fts(rowid, title, content, tags, entities)
    VALUES (new.rowid, new.title, new.content, new.tags, new.entities);
END;
"
    ))
}

static TOKENIZE_CLAUSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"tokenize='([^']*)'").unwrap());

/// Extract the tokenizer of an existing FTS table from its
/// `CREATE VIRTUAL TABLE` SQL. `None` when the table doesn't exist;
/// an absent tokenize clause means the SQLite default (`unicode61`).
pub fn existing_fts_tokenizer(conn: &Connection) -> MemctlResult<Option<String>> {
    let sql: Option<String> = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type='table' AND name='memory_items_fts'",
            [],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    Ok(sql.map(|s| {
        TOKENIZE_CLAUSE_RE
            .captures(&s)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_else(|| "unicode61".to_string())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_resolve_and_validate() {
        assert_eq!(resolve_tokenizer_preset("fr"), "unicode61 remove_diacritics 2");
        assert_eq!(resolve_tokenizer_preset("en"), "porter unicode61 remove_diacritics 2");
        assert_eq!(resolve_tokenizer_preset("raw"), "unicode61");
        assert_eq!(resolve_tokenizer_preset("unicode61"), "unicode61");
        for (_, tok) in FTS_TOKENIZER_PRESETS {
            assert!(validate_fts_tokenizer(tok).is_ok());
        }
    }

    #[test]
    fn tokenizer_validation_rejects_injection() {
        assert!(validate_fts_tokenizer("").is_err());
        assert!(validate_fts_tokenizer("   ").is_err());
        assert!(validate_fts_tokenizer("unicode61'); DROP TABLE memory_items; --").is_err());
        assert!(validate_fts_tokenizer("porter; attach").is_err());
    }

    #[test]
    fn tokenizer_validation_trims() {
        assert_eq!(validate_fts_tokenizer("  porter  ").unwrap(), "porter");
    }
}
