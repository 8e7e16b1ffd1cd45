//! # memctl-consolidate
//!
//! Deterministic STM → MTM → LTM promotion. Clusters short-term items
//! by type and tag overlap, merges each cluster without an LLM, links
//! originals to the merged item with `supersedes`, and promotes by
//! usage and type. Idempotent: archived originals are skipped on the
//! next run.
//!
//! Merge contract:
//! - winner: longest content; ties by earliest created_at, then
//!   lexicographic id;
//! - tags and entities: union, case-folded dedup, first spelling wins;
//! - confidence: max of the cluster; usage: sum;
//! - the merged item starts at MTM with tool provenance listing the
//!   source ids.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::info;

use memctl_core::config::ConsolidateConfig;
use memctl_core::{
    MemctlResult, MemoryItem, MemoryLink, MemoryProvenance, MemoryTier, SourceKind,
};
use memctl_storage::{ItemFilter, MemoryStore};

/// One merge performed (or planned, for dry runs).
#[derive(Debug, Clone, Serialize)]
pub struct MergeChain {
    pub merged_id: Option<String>,
    pub source_ids: Vec<String>,
    pub source_titles: Vec<String>,
}

/// Summary of a consolidation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsolidateReport {
    pub items_processed: usize,
    pub clusters_found: usize,
    pub items_merged: usize,
    pub items_promoted: usize,
    pub merge_chains: Vec<MergeChain>,
}

fn tag_jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Greedy clustering: same type AND tag Jaccard at or above
/// `1 - distance_threshold`. Only clusters of two or more matter.
fn coarse_cluster(items: &[MemoryItem], distance_threshold: f64) -> Vec<Vec<&MemoryItem>> {
    let similarity_threshold = 1.0 - distance_threshold;

    let mut by_type: BTreeMap<&str, Vec<&MemoryItem>> = BTreeMap::new();
    for item in items {
        by_type.entry(item.item_type.as_str()).or_default().push(item);
    }

    let mut clusters = Vec::new();
    for type_items in by_type.values() {
        let mut assigned: HashSet<&str> = HashSet::new();
        for (i, item_a) in type_items.iter().enumerate() {
            if assigned.contains(item_a.id.as_str()) {
                continue;
            }
            let tags_a: HashSet<String> = item_a.tags.iter().map(|t| t.to_lowercase()).collect();
            let mut cluster = vec![*item_a];
            assigned.insert(item_a.id.as_str());
            for item_b in type_items.iter().skip(i + 1) {
                if assigned.contains(item_b.id.as_str()) {
                    continue;
                }
                let tags_b: HashSet<String> =
                    item_b.tags.iter().map(|t| t.to_lowercase()).collect();
                if tag_jaccard(&tags_a, &tags_b) >= similarity_threshold {
                    cluster.push(*item_b);
                    assigned.insert(item_b.id.as_str());
                }
            }
            if cluster.len() >= 2 {
                clusters.push(cluster);
            }
        }
    }
    clusters
}

/// Deterministic merge of one cluster.
fn deterministic_merge(cluster: &[&MemoryItem]) -> MemoryItem {
    let mut sorted: Vec<&&MemoryItem> = cluster.iter().collect();
    sorted.sort_by(|a, b| {
        b.content
            .len()
            .cmp(&a.content.len())
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    let winner = sorted[0];

    let mut tags: Vec<String> = Vec::new();
    let mut seen_tags: HashSet<String> = HashSet::new();
    let mut entities: Vec<String> = Vec::new();
    let mut seen_entities: HashSet<String> = HashSet::new();
    let mut max_confidence: f64 = 0.0;
    let mut total_usage: i64 = 0;

    for item in cluster {
        for tag in &item.tags {
            if seen_tags.insert(tag.to_lowercase()) {
                tags.push(tag.clone());
            }
        }
        for entity in &item.entities {
            if seen_entities.insert(entity.to_lowercase()) {
                entities.push(entity.clone());
            }
        }
        max_confidence = max_confidence.max(item.confidence);
        total_usage += item.usage_count;
    }

    MemoryItem {
        tier: MemoryTier::Mtm,
        item_type: winner.item_type,
        title: winner.title.clone(),
        content: winner.content.clone(),
        tags,
        entities,
        provenance: MemoryProvenance {
            source_kind: SourceKind::Tool,
            source_id: "memctl-consolidate".to_string(),
            chunk_ids: cluster.iter().map(|it| it.id.clone()).collect(),
            content_hashes: Vec::new(),
            ..Default::default()
        },
        confidence: max_confidence,
        validation: winner.validation,
        scope: winner.scope.clone(),
        usage_count: total_usage,
        corpus_id: winner.corpus_id.clone(),
        injectable: winner.injectable,
        ..Default::default()
    }
}

/// Run the consolidation pipeline over one scope.
pub fn consolidate(
    store: &MemoryStore,
    config: &ConsolidateConfig,
    scope: &str,
    dry_run: bool,
) -> MemctlResult<ConsolidateReport> {
    let mut report = ConsolidateReport::default();

    let items = store.list_items(&ItemFilter {
        tier: Some(MemoryTier::Stm),
        scope: Some(scope.to_string()),
        limit: 5000,
        ..Default::default()
    })?;
    report.items_processed = items.len();
    if items.len() < 2 {
        info!(count = items.len(), "too few STM items, skipping consolidation");
        return Ok(report);
    }

    let clusters = coarse_cluster(&items, config.cluster_distance_threshold);
    report.clusters_found = clusters.len();
    if clusters.is_empty() {
        return Ok(report);
    }

    if dry_run {
        for cluster in &clusters {
            report.merge_chains.push(MergeChain {
                merged_id: None,
                source_ids: cluster.iter().map(|it| it.id.clone()).collect(),
                source_titles: cluster.iter().map(|it| it.title.clone()).collect(),
            });
        }
        return Ok(report);
    }

    for cluster in &clusters {
        let mut merged = deterministic_merge(cluster);
        store.write_item(&mut merged, "consolidate")?;
        store.log_event(
            "consolidate",
            Some(&merged.id),
            serde_json::json!({
                "source_ids": cluster.iter().map(|it| it.id.as_str()).collect::<Vec<_>>(),
            }),
        )?;

        for original in cluster {
            store.write_link(&MemoryLink::new(&merged.id, &original.id, "supersedes"))?;
            store.update_item(
                &original.id,
                &serde_json::json!({ "archived": true, "superseded_by": merged.id }),
            )?;
        }

        report.items_merged += cluster.len();
        report.merge_chains.push(MergeChain {
            merged_id: Some(merged.id.clone()),
            source_ids: cluster.iter().map(|it| it.id.clone()).collect(),
            source_titles: cluster.iter().map(|it| it.title.clone()).collect(),
        });
    }

    // Promotion: high-usage or auto-promoted types move MTM → LTM.
    let mtm_items = store.list_items(&ItemFilter {
        tier: Some(MemoryTier::Mtm),
        scope: Some(scope.to_string()),
        limit: 5000,
        ..Default::default()
    })?;
    for item in mtm_items {
        let promote = item.usage_count >= config.usage_count_for_ltm
            || config.auto_promote_types.contains(&item.item_type);
        if promote {
            store.update_item(&item.id, &serde_json::json!({ "tier": "ltm" }))?;
            report.items_promoted += 1;
        }
    }

    info!(
        clusters = report.clusters_found,
        merged = report.items_merged,
        promoted = report.items_promoted,
        "consolidation complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, title: &str, content: &str, tags: &[&str]) -> MemoryItem {
        MemoryItem {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn clustering_requires_same_type_and_tag_overlap() {
        let items = vec![
            item("MEM-a", "a", "x", &["auth", "jwt"]),
            item("MEM-b", "b", "y", &["auth", "jwt"]),
            item("MEM-c", "c", "z", &["database"]),
        ];
        let clusters = coarse_cluster(&items, 0.3);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }

    #[test]
    fn merge_winner_is_longest_content() {
        let a = item("MEM-a", "short", "tiny", &["t"]);
        let b = item("MEM-b", "long", "much longer content here", &["t", "extra"]);
        let merged = deterministic_merge(&[&a, &b]);
        assert_eq!(merged.title, "long");
        assert_eq!(merged.tier, MemoryTier::Mtm);
        assert_eq!(merged.tags, vec!["t", "extra"]);
        assert_eq!(merged.provenance.source_id, "memctl-consolidate");
        assert_eq!(merged.provenance.chunk_ids, vec!["MEM-a", "MEM-b"]);
    }

    #[test]
    fn merge_is_deterministic_on_ties() {
        let mut a = item("MEM-aaa", "A", "same length!", &[]);
        let mut b = item("MEM-bbb", "B", "same length!", &[]);
        a.created_at = "2026-01-01T00:00:00Z".into();
        b.created_at = "2026-01-01T00:00:00Z".into();
        let merged_ab = deterministic_merge(&[&a, &b]);
        let merged_ba = deterministic_merge(&[&b, &a]);
        // Lexicographically smaller id wins both ways.
        assert_eq!(merged_ab.title, "A");
        assert_eq!(merged_ba.title, "A");
    }

    #[test]
    fn confidence_is_max_and_usage_is_sum() {
        let mut a = item("MEM-a", "a", "content a", &["t"]);
        let mut b = item("MEM-b", "b", "content bb", &["t"]);
        a.confidence = 0.4;
        a.usage_count = 2;
        b.confidence = 0.9;
        b.usage_count = 3;
        let merged = deterministic_merge(&[&a, &b]);
        assert_eq!(merged.confidence, 0.9);
        assert_eq!(merged.usage_count, 5);
    }
}
