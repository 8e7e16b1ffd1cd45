//! FTS cascade: AND → REDUCED_AND → PREFIX_AND → OR_FALLBACK → LIKE,
//! strategy metadata, porter skip, morphological hint, coverage
//! re-ranking, and term escaping.

use memctl_core::config::StoreConfig;
use memctl_core::{MemoryItem, SearchStrategy};
use memctl_storage::{resolve_tokenizer_preset, ItemFilter, MemoryStore};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn store_with_tokenizer(preset: &str) -> MemoryStore {
    let store = MemoryStore::open(&StoreConfig {
        db_path: ":memory:".to_string(),
        wal_mode: false,
        fts_tokenizer: resolve_tokenizer_preset(preset),
    })
    .unwrap();
    let corpus = [
        ("item_0", "The monitoring system handles notifications for alerting"),
        ("item_1", "Configuration of endpoints requires configured settings"),
        ("item_2", "Performance testing requires methodical approaches"),
        ("item_3", "Authentication and authorization middleware pipeline"),
        ("item_4", "Scheduled processing of accumulated data batches"),
    ];
    for (id, content) in corpus {
        let mut item = MemoryItem {
            id: id.to_string(),
            title: content.chars().take(30).collect(),
            content: content.to_string(),
            tags: vec!["test".into()],
            ..Default::default()
        };
        store.write_item(&mut item, "test").unwrap();
    }
    store
}

fn search(store: &MemoryStore, query: &str) -> (Vec<MemoryItem>, memctl_core::SearchMeta) {
    store.search_fulltext(query, &ItemFilter::default()).unwrap()
}

// ─── AND ─────────────────────────────────────────────────────────────────────

#[test]
fn exact_terms_resolve_via_and() {
    let store = store_with_tokenizer("fr");
    let (results, meta) = search(&store, "monitoring notifications");
    assert_eq!(meta.strategy, SearchStrategy::And);
    assert!(results.iter().any(|r| r.id == "item_0"));
    assert!(meta.dropped_terms.is_empty());
    assert!(meta.morphological_hint.is_none());
}

#[test]
fn and_single_term() {
    let store = store_with_tokenizer("fr");
    let (results, meta) = search(&store, "middleware");
    assert_eq!(meta.strategy, SearchStrategy::And);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "item_3");
}

// ─── REDUCED_AND ─────────────────────────────────────────────────────────────

#[test]
fn unmatched_term_is_dropped_by_reduction() {
    let store = store_with_tokenizer("fr");
    let (results, meta) = search(&store, "monitoring zzzzz");
    assert_eq!(meta.strategy, SearchStrategy::ReducedAnd);
    assert!(results.iter().any(|r| r.id == "item_0"));
    assert_eq!(meta.dropped_terms, vec!["zzzzz"]);
    assert_eq!(meta.effective_terms, vec!["monitoring"]);
    assert!(meta.morphological_hint.is_none());
}

#[test]
fn reduction_drops_shortest_terms_first() {
    let store = store_with_tokenizer("fr");
    // "middleware" (10) survives; "batches" (7) is dropped first even
    // though it appears in item_4 — the joint AND finds nothing.
    let (results, meta) = search(&store, "middleware batches");
    assert_eq!(meta.strategy, SearchStrategy::ReducedAnd);
    assert_eq!(meta.dropped_terms, vec!["batches"]);
    assert!(results.iter().any(|r| r.id == "item_3"));
}

// ─── PREFIX_AND ──────────────────────────────────────────────────────────────

#[test]
fn prefix_fires_when_and_and_reduced_fail() {
    let store = store_with_tokenizer("fr");
    let (results, meta) = search(&store, "monitor notif");
    assert_eq!(meta.strategy, SearchStrategy::PrefixAnd);
    assert!(results.iter().any(|r| r.id == "item_0"));
    assert_eq!(meta.original_terms, vec!["monitor", "notif"]);
    assert!(meta.dropped_terms.is_empty());
}

#[test]
fn prefix_win_populates_morphological_hint() {
    let store = store_with_tokenizer("fr");
    let (_, meta) = search(&store, "monitor notif");
    let hint = meta.morphological_hint.expect("hint expected for prefix win");
    assert!(hint.contains("memctl reindex --tokenizer en"));
}

#[test]
fn no_hint_on_clean_and() {
    let store = store_with_tokenizer("fr");
    let (_, meta) = search(&store, "monitoring system");
    assert_eq!(meta.strategy, SearchStrategy::And);
    assert!(meta.morphological_hint.is_none());
}

#[test]
fn no_hint_on_single_term_miss() {
    let store = store_with_tokenizer("fr");
    let (_, meta) = search(&store, "xyznonexistent");
    assert!(meta.morphological_hint.is_none());
}

#[test]
fn porter_tokenizer_never_uses_prefix_and() {
    let store = store_with_tokenizer("en");
    let (results, meta) = search(&store, "monitor notif");
    // Porter stems inflected forms, so AND or REDUCED_AND resolves it.
    assert!(matches!(meta.strategy, SearchStrategy::And | SearchStrategy::ReducedAnd));
    assert!(meta.morphological_hint.is_none());
    assert!(results.iter().any(|r| r.id == "item_0"));
}

// ─── OR_FALLBACK ─────────────────────────────────────────────────────────────

#[test]
fn or_fallback_ranks_by_term_coverage() {
    let store = MemoryStore::open_in_memory().unwrap();
    let mut both = MemoryItem {
        title: "Infra".into(),
        content: "alphaterm gammaterm combined setup".into(),
        ..Default::default()
    };
    let mut one = MemoryItem {
        title: "Partial".into(),
        content: "alphaterm only here".into(),
        ..Default::default()
    };
    store.write_item(&mut one, "test").unwrap();
    store.write_item(&mut both, "test").unwrap();

    // The longest term matches nothing, so every AND-family step
    // fails and the disjunction wins.
    let (results, meta) = search(&store, "alphaterm gammaterm notpresentlongword");
    assert_eq!(meta.strategy, SearchStrategy::OrFallback);
    assert_eq!(results[0].title, "Infra");
    assert_eq!(results[1].title, "Partial");
}

// ─── LIKE ────────────────────────────────────────────────────────────────────

#[test]
fn substring_only_match_falls_through_to_like() {
    let store = store_with_tokenizer("fr");
    // "onitor" is an infix of "monitoring": invisible to every token
    // strategy, visible to LIKE.
    let (results, meta) = search(&store, "onitor");
    assert_eq!(meta.strategy, SearchStrategy::Like);
    assert!(results.iter().any(|r| r.id == "item_0"));
}

#[test]
fn miss_everywhere_returns_empty_like() {
    let store = store_with_tokenizer("fr");
    let (results, meta) = search(&store, "qqqqqq wwwwww");
    assert_eq!(meta.strategy, SearchStrategy::Like);
    assert!(results.is_empty());
}

// ─── Escaping & stop words ───────────────────────────────────────────────────

#[test]
fn quotes_in_query_never_raise() {
    let store = store_with_tokenizer("fr");
    let mut item = MemoryItem {
        title: "People".into(),
        content: "user input from O'Brien".into(),
        ..Default::default()
    };
    store.write_item(&mut item, "test").unwrap();
    // Apostrophes, quotes, FTS operators: must not error at any step.
    for q in ["O'Brien", "\"quoted\"", "a AND b OR (c)", "col:on*"] {
        let result = store.search_fulltext(q, &ItemFilter::default());
        assert!(result.is_ok(), "query {q:?} must not raise");
    }
}

#[test]
fn all_stop_word_query_behaves_like_normal_query() {
    let store = store_with_tokenizer("fr");
    let (results, _) = search(&store, "the");
    // "the" survives via the fall-back-to-original rule and matches
    // items containing the token.
    assert!(!results.is_empty());
}

#[test]
fn stop_words_are_stripped_before_matching() {
    let store = store_with_tokenizer("fr");
    let (results, meta) = search(&store, "how is the monitoring for notifications");
    assert_eq!(meta.strategy, SearchStrategy::And);
    assert_eq!(meta.original_terms, vec!["monitoring", "notifications"]);
    assert!(results.iter().any(|r| r.id == "item_0"));
}

// ─── Determinism & archived exclusion ────────────────────────────────────────

#[test]
fn search_is_deterministic() {
    let store = store_with_tokenizer("fr");
    let (a, meta_a) = search(&store, "configuration settings");
    let (b, meta_b) = search(&store, "configuration settings");
    let ids_a: Vec<&str> = a.iter().map(|i| i.id.as_str()).collect();
    let ids_b: Vec<&str> = b.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids_a, ids_b);
    assert_eq!(meta_a.strategy, meta_b.strategy);
}

#[test]
fn archived_items_are_invisible_to_search() {
    let store = store_with_tokenizer("fr");
    store.delete_item("item_0").unwrap();
    let (results, _) = search(&store, "monitoring notifications");
    assert!(!results.iter().any(|r| r.id == "item_0"));
}

#[test]
fn fts_index_follows_updates() {
    let store = store_with_tokenizer("fr");
    store
        .update_item("item_2", &serde_json::json!({ "content": "entirely rewritten quantum notes" }))
        .unwrap();
    let (results, meta) = search(&store, "quantum");
    assert_eq!(meta.strategy, SearchStrategy::And);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "item_2");
    // The old content is no longer indexed.
    let (old, _) = search(&store, "methodical");
    assert!(old.is_empty());
}
