//! Search-resolution metadata attached to every full-text query.

use serde::{Deserialize, Serialize};

/// The full-text cascade step that produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SearchStrategy {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "REDUCED_AND")]
    ReducedAnd,
    #[serde(rename = "PREFIX_AND")]
    PrefixAnd,
    #[serde(rename = "OR_FALLBACK")]
    OrFallback,
    #[serde(rename = "LIKE")]
    Like,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::And => "AND",
            SearchStrategy::ReducedAnd => "REDUCED_AND",
            SearchStrategy::PrefixAnd => "PREFIX_AND",
            SearchStrategy::OrFallback => "OR_FALLBACK",
            SearchStrategy::Like => "LIKE",
        }
    }
}

/// Advisory metadata about how a search query was resolved.
///
/// Tracks the cascade AND → REDUCED_AND → PREFIX_AND → OR_FALLBACK →
/// LIKE. Callers that don't need this can ignore it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMeta {
    pub strategy: SearchStrategy,
    pub original_terms: Vec<String>,
    pub effective_terms: Vec<String>,
    pub dropped_terms: Vec<String>,
    pub total_candidates: usize,
    /// Populated only when PREFIX_AND won under a non-stemming
    /// tokenizer; suggests rebuilding the index with a stemmer.
    pub morphological_hint: Option<String>,
}
