//! Full-text search cascade: AND → REDUCED_AND → PREFIX_AND →
//! OR_FALLBACK → LIKE, stopping at the first strategy with results.
//!
//! The cascade is never allowed to surface an FTS parser error: every
//! full-text step that fails counts as zero rows and the cascade
//! advances. Only the LIKE fallback can propagate a genuine database
//! failure.

use rusqlite::types::ToSql;
use rusqlite::Connection;
use tracing::{debug, warn};

use memctl_core::{MemctlResult, MemoryItem, SearchMeta, SearchStrategy};
use memctl_query::{normalize_query, reduced_subsets};

use crate::queries::item_ops::{self, ItemFilter, ITEM_COLUMNS};

/// Minimum term length for prefix expansion in PREFIX_AND.
pub const PREFIX_MIN_LEN: usize = 5;

/// True when the tokenizer string carries the porter stemmer — prefix
/// expansion is redundant under stemming and is skipped entirely.
pub fn is_porter_tokenizer(tokenizer: &str) -> bool {
    tokenizer.split_whitespace().any(|t| t.eq_ignore_ascii_case("porter"))
}

/// Quote a user term for the FTS5 query language: wrap in double
/// quotes with internal quote-doubling.
fn quote_term(term: &str) -> String {
    format!("\"{}\"", term.replace('"', "\"\""))
}

/// Resolve a query through the cascade. Returns the ordered result
/// list plus advisory [`SearchMeta`].
pub fn search_fulltext(
    conn: &Connection,
    fts_available: bool,
    tokenizer: &str,
    query: &str,
    filter: &ItemFilter,
) -> MemctlResult<(Vec<MemoryItem>, SearchMeta)> {
    let normalized = normalize_query(query);
    let terms: Vec<String> = normalized.split_whitespace().map(str::to_string).collect();

    if terms.is_empty() {
        let items = item_ops::list_items(conn, filter)?;
        let meta = SearchMeta { total_candidates: items.len(), ..Default::default() };
        return Ok((items, meta));
    }

    if fts_available {
        // Step 1: AND — every term must match.
        let and_expr = terms.iter().map(|t| quote_term(t)).collect::<Vec<_>>().join(" AND ");
        let rows = fts_rows_or_empty(conn, &and_expr, filter);
        if !rows.is_empty() {
            let meta = SearchMeta {
                strategy: SearchStrategy::And,
                original_terms: terms.clone(),
                effective_terms: terms.clone(),
                dropped_terms: Vec::new(),
                total_candidates: rows.len(),
                morphological_hint: None,
            };
            return Ok((rows, meta));
        }

        // Step 2: REDUCED_AND — retry with successively smaller term
        // subsets, dropping the shortest terms first.
        for subset in reduced_subsets(&terms) {
            let expr = subset.iter().map(|t| quote_term(t)).collect::<Vec<_>>().join(" AND ");
            let rows = fts_rows_or_empty(conn, &expr, filter);
            if !rows.is_empty() {
                let dropped: Vec<String> =
                    terms.iter().filter(|t| !subset.contains(t)).cloned().collect();
                debug!(
                    strategy = "REDUCED_AND",
                    dropped = dropped.join(","),
                    "cascade matched after term reduction"
                );
                let meta = SearchMeta {
                    strategy: SearchStrategy::ReducedAnd,
                    original_terms: terms.clone(),
                    effective_terms: subset,
                    dropped_terms: dropped,
                    total_candidates: rows.len(),
                    morphological_hint: None,
                };
                return Ok((rows, meta));
            }
        }

        // Step 3: PREFIX_AND — expand long terms to prefix matches.
        // Skipped under a stemming tokenizer, which already normalizes
        // inflected forms.
        if !is_porter_tokenizer(tokenizer) {
            let mut expanded_count = 0usize;
            let expr: Vec<String> = terms
                .iter()
                .map(|t| {
                    if t.chars().count() >= PREFIX_MIN_LEN {
                        expanded_count += 1;
                        format!("{}*", quote_term(t))
                    } else {
                        quote_term(t)
                    }
                })
                .collect();
            if expanded_count > 0 {
                let rows = fts_rows_or_empty(conn, &expr.join(" AND "), filter);
                if !rows.is_empty() {
                    let hint = if terms.len() >= 2 {
                        Some(format!(
                            "morphological miss: {expanded_count} term(s) matched by prefix \
                             only. A stemming tokenizer would match inflected forms directly. \
                             Try: memctl reindex --tokenizer en"
                        ))
                    } else {
                        None
                    };
                    let meta = SearchMeta {
                        strategy: SearchStrategy::PrefixAnd,
                        original_terms: terms.clone(),
                        effective_terms: terms.clone(),
                        dropped_terms: Vec::new(),
                        total_candidates: rows.len(),
                        morphological_hint: hint,
                    };
                    return Ok((rows, meta));
                }
            }
        }

        // Step 4: OR_FALLBACK — any term, re-ranked by coverage.
        let or_expr = terms.iter().map(|t| quote_term(t)).collect::<Vec<_>>().join(" OR ");
        let rows = fts_rows_or_empty(conn, &or_expr, filter);
        if !rows.is_empty() {
            let ranked = rank_by_coverage(rows, &terms);
            let meta = SearchMeta {
                strategy: SearchStrategy::OrFallback,
                original_terms: terms.clone(),
                effective_terms: terms.clone(),
                dropped_terms: Vec::new(),
                total_candidates: ranked.len(),
                morphological_hint: None,
            };
            return Ok((ranked, meta));
        }
    }

    // Step 5: LIKE — substring match, AND across terms.
    let rows = like_search(conn, &terms, filter)?;
    let meta = SearchMeta {
        strategy: SearchStrategy::Like,
        original_terms: terms.clone(),
        effective_terms: terms,
        dropped_terms: Vec::new(),
        total_candidates: rows.len(),
        morphological_hint: None,
    };
    Ok((rows, meta))
}

/// Run one FTS5 MATCH step; any error counts as zero rows.
fn fts_rows_or_empty(conn: &Connection, match_expr: &str, filter: &ItemFilter) -> Vec<MemoryItem> {
    match fts_match(conn, match_expr, filter) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("FTS5 step failed, treating as empty: {e}");
            Vec::new()
        }
    }
}

fn fts_match(
    conn: &Connection,
    match_expr: &str,
    filter: &ItemFilter,
) -> MemctlResult<Vec<MemoryItem>> {
    let (conds, vals) = filter.conditions();
    let mut conditions: Vec<String> = conds.into_iter().map(|c| format!("i.{c}")).collect();
    conditions.push("fts MATCH ?".to_string());
    let where_clause = conditions.join(" AND ");

    let columns = ITEM_COLUMNS
        .split(", ")
        .map(|c| format!("i.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {columns} FROM memory_items i \
         JOIN memory_items_fts fts ON i.rowid = fts.rowid \
         WHERE {where_clause} ORDER BY fts.rank LIMIT ?"
    );

    let match_owned = match_expr.to_string();
    let limit = filter.limit as i64;
    let mut sql_params: Vec<&dyn ToSql> = vals.iter().map(|v| v as &dyn ToSql).collect();
    sql_params.push(&match_owned);
    sql_params.push(&limit);

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(&sql_params[..])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(item_ops::row_to_item(row)?);
    }
    Ok(items)
}

/// LIKE fallback: each term must appear in title, content, or tags.
/// Ordered by `updated_at` descending.
fn like_search(
    conn: &Connection,
    terms: &[String],
    filter: &ItemFilter,
) -> MemctlResult<Vec<MemoryItem>> {
    let (mut conds, mut vals) = filter.conditions();
    for term in terms {
        conds.push("(title LIKE ? OR content LIKE ? OR tags LIKE ?)".to_string());
        let like = format!("%{term}%");
        vals.push(like.clone());
        vals.push(like.clone());
        vals.push(like);
    }
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
        items.push(item_ops::row_to_item(row)?);
    }
    Ok(items)
}

/// Re-rank OR-fallback results by query-term coverage: the number of
/// distinct terms occurring (case-insensitive substring) in
/// title ∪ content, descending. The sort is stable, so ties keep the
/// underlying full-text rank order.
pub fn rank_by_coverage(items: Vec<MemoryItem>, terms: &[String]) -> Vec<MemoryItem> {
    let lowered_terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
    let mut scored: Vec<(usize, MemoryItem)> = items
        .into_iter()
        .map(|item| {
            let haystack = format!("{} {}", item.title, item.content).to_lowercase();
            let score = lowered_terms.iter().filter(|t| haystack.contains(t.as_str())).count();
            (score, item)
        })
        .collect();
    scored.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
    scored.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, content: &str) -> MemoryItem {
        MemoryItem { title: title.into(), content: content.into(), ..Default::default() }
    }

    fn titles(items: &[MemoryItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    fn terms(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn higher_coverage_ranks_first() {
        let ranked = rank_by_coverage(
            vec![item("A", "alpha"), item("B", "alpha beta gamma")],
            &terms(&["alpha", "beta", "gamma"]),
        );
        assert_eq!(titles(&ranked), vec!["B", "A"]);
    }

    #[test]
    fn equal_coverage_preserves_input_order() {
        let ranked = rank_by_coverage(
            vec![item("First", "alpha content"), item("Second", "alpha other"), item("Third", "alpha text")],
            &terms(&["alpha"]),
        );
        assert_eq!(titles(&ranked), vec!["First", "Second", "Third"]);
    }

    #[test]
    fn zero_coverage_sinks() {
        let ranked = rank_by_coverage(
            vec![item("Miss", "nothing relevant"), item("Hit", "alpha is here")],
            &terms(&["alpha", "beta"]),
        );
        assert_eq!(titles(&ranked), vec!["Hit", "Miss"]);
    }

    #[test]
    fn title_contributes_to_coverage() {
        let ranked = rank_by_coverage(
            vec![item("other", "nothing here"), item("alpha", "nothing here")],
            &terms(&["alpha"]),
        );
        assert_eq!(titles(&ranked), vec!["alpha", "other"]);
    }

    #[test]
    fn coverage_matching_is_case_insensitive() {
        let ranked = rank_by_coverage(
            vec![item("Lower", "controller service"), item("Upper", "CONTROLLER SERVICE ENDPOINT")],
            &terms(&["controller", "service", "endpoint"]),
        );
        assert_eq!(titles(&ranked), vec!["Upper", "Lower"]);
    }

    #[test]
    fn empty_terms_keep_order() {
        let ranked = rank_by_coverage(vec![item("A", "x"), item("B", "y")], &[]);
        assert_eq!(titles(&ranked), vec!["A", "B"]);
    }

    #[test]
    fn porter_detection() {
        assert!(is_porter_tokenizer("porter unicode61 remove_diacritics 2"));
        assert!(!is_porter_tokenizer("unicode61 remove_diacritics 2"));
        assert!(!is_porter_tokenizer("unicode61"));
    }

    #[test]
    fn quote_doubling() {
        assert_eq!(quote_term("plain"), "\"plain\"");
        assert_eq!(quote_term("O\"Brien"), "\"O\"\"Brien\"");
    }
}
