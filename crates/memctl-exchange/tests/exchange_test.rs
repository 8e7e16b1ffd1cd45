//! Export/import round-trip: stdout purity, dedup, policy routing,
//! dry runs.

use std::io::Cursor;

use memctl_core::{MemoryItem, MemoryTier};
use memctl_exchange::{export_items, import_items, ExportOptions, ImportOptions, ImportResult};
use memctl_storage::{ItemFilter, MemoryStore};

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::open_in_memory().unwrap();
    for (title, content) in [
        ("Deploy cadence", "Releases ship every Tuesday"),
        ("Cache policy", "Redis entries expire after an hour"),
        ("Schema rule", "Migrations are forward-only"),
    ] {
        let mut item = MemoryItem {
            title: title.to_string(),
            content: content.to_string(),
            tags: vec!["ops".into()],
            ..Default::default()
        };
        store.write_item(&mut item, "test").unwrap();
    }
    store
}

#[test]
fn export_emits_only_json_lines() {
    let store = seeded_store();
    let mut out: Vec<u8> = Vec::new();
    let count = export_items(&store, &ExportOptions::default(), &mut out).unwrap();
    assert_eq!(count, 3);

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 3);
    for line in text.lines() {
        let value: serde_json::Value = serde_json::from_str(line).expect("pure JSONL");
        assert!(value["id"].as_str().unwrap().starts_with("MEM-"));
    }
}

#[test]
fn export_excludes_archived_unless_opted_in() {
    let store = seeded_store();
    let ids: Vec<String> =
        store.list_items(&ItemFilter::default()).unwrap().iter().map(|i| i.id.clone()).collect();
    store.delete_item(&ids[0]).unwrap();

    let mut out: Vec<u8> = Vec::new();
    let count = export_items(&store, &ExportOptions::default(), &mut out).unwrap();
    assert_eq!(count, 2);

    let mut out: Vec<u8> = Vec::new();
    let count = export_items(
        &store,
        &ExportOptions { include_archived: true, ..Default::default() },
        &mut out,
    )
    .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn export_filters_by_tier() {
    let store = seeded_store();
    let mut ltm = MemoryItem {
        title: "LTM".into(),
        content: "long term content".into(),
        tier: MemoryTier::Ltm,
        ..Default::default()
    };
    ltm.provenance.source_id = "doc".into();
    store.write_item(&mut ltm, "test").unwrap();

    let mut out: Vec<u8> = Vec::new();
    let count = export_items(
        &store,
        &ExportOptions { tier: Some(MemoryTier::Ltm), ..Default::default() },
        &mut out,
    )
    .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn round_trip_restores_items_and_hashes() {
    let source = seeded_store();
    let mut exported: Vec<u8> = Vec::new();
    export_items(&source, &ExportOptions::default(), &mut exported).unwrap();

    let target = MemoryStore::open_in_memory().unwrap();
    let result = import_items(
        &target,
        &mut Cursor::new(exported),
        &ImportOptions::default(),
    )
    .unwrap();

    assert_eq!(
        result,
        ImportResult { total_lines: 3, imported: 3, ..Default::default() }
    );

    let source_hashes: std::collections::BTreeSet<String> = source
        .list_items(&ItemFilter::default())
        .unwrap()
        .iter()
        .map(|i| i.content_hash())
        .collect();
    let target_hashes: std::collections::BTreeSet<String> = target
        .list_items(&ItemFilter::default())
        .unwrap()
        .iter()
        .map(|i| i.content_hash())
        .collect();
    assert_eq!(source_hashes, target_hashes);
}

#[test]
fn import_mints_fresh_ids_by_default() {
    let source = seeded_store();
    let mut exported: Vec<u8> = Vec::new();
    export_items(&source, &ExportOptions::default(), &mut exported).unwrap();

    let target = MemoryStore::open_in_memory().unwrap();
    import_items(&target, &mut Cursor::new(exported.clone()), &ImportOptions::default()).unwrap();

    let source_ids: std::collections::BTreeSet<String> =
        source.list_items(&ItemFilter::default()).unwrap().iter().map(|i| i.id.clone()).collect();
    let target_ids: std::collections::BTreeSet<String> =
        target.list_items(&ItemFilter::default()).unwrap().iter().map(|i| i.id.clone()).collect();
    assert!(source_ids.is_disjoint(&target_ids));
}

#[test]
fn preserve_ids_skips_colliding_ids() {
    let store = seeded_store();
    let mut exported: Vec<u8> = Vec::new();
    export_items(&store, &ExportOptions::default(), &mut exported).unwrap();

    // Importing into the same store with preserved ids: all ids (and
    // hashes) collide.
    let result = import_items(
        &store,
        &mut Cursor::new(exported),
        &ImportOptions { preserve_ids: true, ..Default::default() },
    )
    .unwrap();
    assert_eq!(result.imported, 0);
    assert_eq!(result.skipped_dedup, 3);
}

#[test]
fn content_hash_dedup_catches_renamed_duplicates() {
    let store = seeded_store();
    // Same content as an existing item, different id and title.
    let duplicate = serde_json::json!({
        "id": "MEM-fresh999999",
        "type": "note",
        "title": "Another name",
        "content": "Releases ship every Tuesday"
    });
    let result = import_items(
        &store,
        &mut Cursor::new(format!("{duplicate}\n")),
        &ImportOptions::default(),
    )
    .unwrap();
    assert_eq!(result.skipped_dedup, 1);
    assert_eq!(result.imported, 0);
}

#[test]
fn malformed_lines_count_as_errors_and_continue() {
    let target = MemoryStore::open_in_memory().unwrap();
    let payload = "not json at all\n{\"title\":\"ok\",\"content\":\"valid item body\"}\n";
    let result =
        import_items(&target, &mut Cursor::new(payload), &ImportOptions::default()).unwrap();
    assert_eq!(result.errors, 1);
    assert_eq!(result.imported, 1);
}

#[test]
fn policy_rejects_secrets_on_import() {
    let target = MemoryStore::open_in_memory().unwrap();
    let payload = serde_json::json!({
        "title": "Creds",
        "content": "password = supersecret123"
    });
    let result = import_items(
        &target,
        &mut Cursor::new(format!("{payload}\n")),
        &ImportOptions::default(),
    )
    .unwrap();
    assert_eq!(result.skipped_policy, 1);
    assert_eq!(target.count_items(&ItemFilter::default()).unwrap(), 0);
}

#[test]
fn policy_quarantines_pii_as_non_injectable() {
    let target = MemoryStore::open_in_memory().unwrap();
    let payload = serde_json::json!({
        "title": "Contact",
        "content": "Reach me at john@example.com"
    });
    import_items(&target, &mut Cursor::new(format!("{payload}\n")), &ImportOptions::default())
        .unwrap();

    let items = target.list_items(&ItemFilter::default()).unwrap();
    assert_eq!(items.len(), 1);
    assert!(!items[0].injectable);
    assert_eq!(items[0].tier, MemoryTier::Stm);
    assert!(items[0].expires_at.is_some());
}

#[test]
fn dry_run_counts_without_writing() {
    let source = seeded_store();
    let mut exported: Vec<u8> = Vec::new();
    export_items(&source, &ExportOptions::default(), &mut exported).unwrap();

    let target = MemoryStore::open_in_memory().unwrap();
    let result = import_items(
        &target,
        &mut Cursor::new(exported),
        &ImportOptions { dry_run: true, ..Default::default() },
    )
    .unwrap();
    assert_eq!(result.imported, 3);
    assert_eq!(target.count_items(&ItemFilter::default()).unwrap(), 0);
}

#[test]
fn clean_round_trip_has_zero_policy_rejections() {
    let source = seeded_store();
    let mut exported: Vec<u8> = Vec::new();
    export_items(&source, &ExportOptions::default(), &mut exported).unwrap();

    let target = MemoryStore::open_in_memory().unwrap();
    let result =
        import_items(&target, &mut Cursor::new(exported), &ImportOptions::default()).unwrap();
    assert_eq!(result.skipped_policy, 0);
    assert_eq!(result.errors, 0);
}
