//! Consolidation pipeline against a live store: merge, supersede,
//! promote, idempotence.

use memctl_core::config::ConsolidateConfig;
use memctl_core::{MemoryItem, MemoryTier, MemoryType};
use memctl_consolidate::consolidate;
use memctl_storage::{ItemFilter, MemoryStore};

fn stm_note(title: &str, content: &str, tags: &[&str]) -> MemoryItem {
    MemoryItem {
        title: title.to_string(),
        content: content.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..Default::default()
    }
}

fn seeded() -> MemoryStore {
    let store = MemoryStore::open_in_memory().unwrap();
    for mut item in [
        stm_note("JWT basics", "JWT tokens expire and rotate", &["auth", "jwt"]),
        stm_note("JWT detail", "JWT tokens expire hourly and rotate on refresh", &["auth", "jwt"]),
        stm_note("Unrelated", "database vacuuming schedule", &["database"]),
    ] {
        store.write_item(&mut item, "test").unwrap();
    }
    store
}

#[test]
fn consolidation_merges_clusters_and_archives_originals() {
    let store = seeded();
    let report = consolidate(&store, &ConsolidateConfig::default(), "project", false).unwrap();

    assert_eq!(report.items_processed, 3);
    assert_eq!(report.clusters_found, 1);
    assert_eq!(report.items_merged, 2);
    assert_eq!(report.merge_chains.len(), 1);

    let merged_id = report.merge_chains[0].merged_id.clone().unwrap();
    let merged = store.read_item(&merged_id).unwrap().unwrap();
    // Longest content wins; merged item lands in MTM or was promoted.
    assert!(merged.content.contains("hourly"));
    assert_eq!(merged.provenance.source_id, "memctl-consolidate");

    // Originals are archived and point forward.
    for source_id in &report.merge_chains[0].source_ids {
        let original = store.read_item(source_id).unwrap().unwrap();
        assert!(original.archived);
        assert_eq!(original.superseded_by.as_deref(), Some(merged_id.as_str()));
    }

    // Supersedes links exist from the merged item.
    let links = store.read_links(&merged_id).unwrap();
    assert_eq!(links.iter().filter(|l| l.rel == "supersedes").count(), 2);

    // The unrelated item is untouched.
    let remaining = store.list_items(&ItemFilter::default()).unwrap();
    assert!(remaining.iter().any(|i| i.title == "Unrelated"));
}

#[test]
fn consolidation_is_idempotent() {
    let store = seeded();
    let first = consolidate(&store, &ConsolidateConfig::default(), "project", false).unwrap();
    assert_eq!(first.items_merged, 2);

    // Archived originals are out of scope on the second pass; the
    // merged item is MTM, not STM.
    let second = consolidate(&store, &ConsolidateConfig::default(), "project", false).unwrap();
    assert_eq!(second.items_merged, 0);
    assert_eq!(second.clusters_found, 0);
}

#[test]
fn dry_run_reports_clusters_without_writing() {
    let store = seeded();
    let before = store.count_items(&ItemFilter::default()).unwrap();
    let report = consolidate(&store, &ConsolidateConfig::default(), "project", true).unwrap();

    assert_eq!(report.clusters_found, 1);
    assert!(report.merge_chains[0].merged_id.is_none());
    assert_eq!(store.count_items(&ItemFilter::default()).unwrap(), before);
}

#[test]
fn high_usage_mtm_items_promote_to_ltm() {
    let store = seeded();
    let mut hot = MemoryItem {
        title: "Hot MTM".into(),
        content: "frequently used fact".into(),
        tier: MemoryTier::Mtm,
        usage_count: 10,
        ..Default::default()
    };
    hot.provenance.source_id = "doc-1".into();
    store.write_item(&mut hot, "test").unwrap();

    let report = consolidate(&store, &ConsolidateConfig::default(), "project", false).unwrap();
    assert!(report.items_promoted >= 1);
    let promoted = store.read_item(&hot.id).unwrap().unwrap();
    assert_eq!(promoted.tier, MemoryTier::Ltm);
}

#[test]
fn decision_type_auto_promotes() {
    let store = seeded();
    let mut decision = MemoryItem {
        title: "Use WAL".into(),
        content: "we decided on WAL mode".into(),
        tier: MemoryTier::Mtm,
        item_type: MemoryType::Decision,
        ..Default::default()
    };
    decision.provenance.source_id = "meeting-notes".into();
    store.write_item(&mut decision, "test").unwrap();

    consolidate(&store, &ConsolidateConfig::default(), "project", false).unwrap();
    let promoted = store.read_item(&decision.id).unwrap().unwrap();
    assert_eq!(promoted.tier, MemoryTier::Ltm);
}

#[test]
fn consolidate_events_are_logged() {
    let store = seeded();
    consolidate(&store, &ConsolidateConfig::default(), "project", false).unwrap();
    let events = store.read_events(None, Some("consolidate"), 10).unwrap();
    assert_eq!(events.len(), 1);
}
