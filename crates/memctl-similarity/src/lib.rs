//! Text similarity for fixed-point detection in the recall-answer loop.
//!
//! Two complementary measures over normalized text:
//! - **Token Jaccard**: set overlap of word tokens (order-insensitive).
//! - **Sequence ratio**: character-level LCS similarity (order-sensitive).
//!
//! Combined via a weighted mean to detect convergence of successive
//! answers and near-duplicate refinement queries. No external state,
//! fully deterministic.

use std::collections::HashSet;

/// ASCII punctuation stripped during normalization.
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Normalize text for similarity comparison: lowercase, strip ASCII
/// punctuation, collapse whitespace runs, trim. Empty or
/// whitespace-only input normalizes to the empty string.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered.chars().filter(|c| !PUNCTUATION.contains(*c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalized text into word tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Token-level Jaccard similarity: `|A ∩ B| / |A ∪ B|`.
///
/// Inputs are normalized internally. Both empty → 1.0 (vacuous
/// similarity); exactly one empty → 0.0.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let norm_a = normalize(a);
    let norm_b = normalize(b);
    let tokens_a: HashSet<&str> = tokenize(&norm_a).into_iter().collect();
    let tokens_b: HashSet<&str> = tokenize(&norm_b).into_iter().collect();

    if tokens_a.is_empty() && tokens_b.is_empty() {
        return 1.0;
    }
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    intersection as f64 / union as f64
}

/// Character-level similarity via longest common subsequence:
/// `2 * lcs(a, b) / (|a| + |b|)`, symmetric, in [0, 1].
///
/// Inputs are normalized internally. Both empty → 1.0; one empty → 0.0.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let norm_a = normalize(a);
    let norm_b = normalize(b);

    if norm_a.is_empty() && norm_b.is_empty() {
        return 1.0;
    }
    if norm_a.is_empty() || norm_b.is_empty() {
        return 0.0;
    }

    let chars_a: Vec<char> = norm_a.chars().collect();
    let chars_b: Vec<char> = norm_b.chars().collect();
    let lcs = lcs_len(&chars_a, &chars_b);
    (2.0 * lcs as f64) / (chars_a.len() + chars_b.len()) as f64
}

/// LCS length with two rolling rows: O(n*m) time, O(min) space.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];

    for &cl in long {
        for (j, &cs) in short.iter().enumerate() {
            curr[j + 1] = if cl == cs {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}

/// Default weight of the Jaccard component.
pub const DEFAULT_JACCARD_WEIGHT: f64 = 0.4;
/// Default weight of the sequence component. Favouring the
/// order-sensitive measure better separates paraphrase from genuine
/// content change.
pub const DEFAULT_SEQUENCE_WEIGHT: f64 = 0.6;

/// Combined similarity: weighted mean of Jaccard and sequence ratio
/// with the default 0.4 / 0.6 weights.
pub fn similarity(a: &str, b: &str) -> f64 {
    similarity_weighted(a, b, DEFAULT_JACCARD_WEIGHT, DEFAULT_SEQUENCE_WEIGHT)
}

/// Combined similarity with explicit non-negative weights. Weights are
/// renormalized by their sum; a zero sum yields 0.0.
pub fn similarity_weighted(a: &str, b: &str, jaccard_weight: f64, sequence_weight: f64) -> f64 {
    let total = jaccard_weight + sequence_weight;
    if total <= 0.0 || jaccard_weight < 0.0 || sequence_weight < 0.0 {
        return 0.0;
    }
    let j = jaccard(a, b);
    let s = sequence_ratio(a, b);
    (jaccard_weight * j + sequence_weight * s) / total
}

/// Default fixed-point threshold for answer convergence.
pub const DEFAULT_FIXED_POINT_THRESHOLD: f64 = 0.92;
/// Default near-duplicate threshold for query-cycle detection.
pub const DEFAULT_QUERY_CYCLE_THRESHOLD: f64 = 0.90;

/// True when two texts are similar enough to declare convergence.
pub fn is_fixed_point(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) >= threshold
}

/// Detect whether a refined query repeats or nearly repeats history.
///
/// A query is a cycle when it is empty after normalization, exactly
/// equals any normalized historical query, or its combined similarity
/// to the most recent history entry reaches `threshold`.
pub fn is_query_cycle(query: &str, history: &[String], threshold: f64) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let norm_query = normalize(query);
    if norm_query.is_empty() {
        return true;
    }

    for prev in history {
        if normalize(prev) == norm_query {
            return true;
        }
    }

    if let Some(last) = history.last() {
        if similarity(query, last) >= threshold {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_case_punctuation_whitespace() {
        assert_eq!(normalize("  Hello,   World! "), "hello world");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("...!!!"), "");
    }

    #[test]
    fn jaccard_identical_is_one() {
        assert_eq!(jaccard("the auth flow", "the auth flow"), 1.0);
    }

    #[test]
    fn jaccard_empty_conventions() {
        assert_eq!(jaccard("", ""), 1.0);
        assert_eq!(jaccard("something", ""), 0.0);
    }

    #[test]
    fn jaccard_partial_overlap() {
        // {a, b} vs {b, c}: 1 / 3
        let j = jaccard("a b", "b c");
        assert!((j - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn sequence_ratio_bounds() {
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
        assert_eq!(sequence_ratio("abc", "abc"), 1.0);
        let r = sequence_ratio("abcd", "abxd");
        assert!(r > 0.5 && r < 1.0);
    }

    #[test]
    fn sequence_ratio_is_symmetric() {
        let a = "token refresh happens hourly";
        let b = "refresh tokens rotate every hour";
        assert!((sequence_ratio(a, b) - sequence_ratio(b, a)).abs() < 1e-12);
    }

    #[test]
    fn combined_similarity_in_unit_interval() {
        let s = similarity("alpha beta gamma", "alpha beta delta");
        assert!(s > 0.0 && s < 1.0);
        assert_eq!(similarity("same text", "same text"), 1.0);
    }

    #[test]
    fn fixed_point_detects_identical_answers() {
        assert!(is_fixed_point("the answer is 42", "the answer is 42", 0.92));
        assert!(!is_fixed_point("completely different", "nothing alike here", 0.92));
    }

    #[test]
    fn paraphrase_scores_below_exact_repeat() {
        let exact = similarity("use JWT with hourly rotation", "use JWT with hourly rotation");
        let para = similarity("use JWT with hourly rotation", "rotate JWTs every hour");
        assert!(exact > para);
    }

    #[test]
    fn query_cycle_on_empty() {
        assert!(is_query_cycle("", &[], 0.90));
        assert!(is_query_cycle("   ", &[], 0.90));
        assert!(is_query_cycle("?!", &[], 0.90));
    }

    #[test]
    fn query_cycle_on_exact_history_match() {
        let history = vec!["auth flow".to_string(), "token refresh".to_string()];
        assert!(is_query_cycle("Auth Flow!", &history, 0.90));
    }

    #[test]
    fn query_cycle_on_near_duplicate_of_most_recent() {
        let history = vec!["token refresh flow".to_string()];
        assert!(is_query_cycle("token refresh flows", &history, 0.90));
    }

    #[test]
    fn fresh_query_is_not_a_cycle() {
        let history = vec!["auth flow".to_string()];
        assert!(!is_query_cycle("database migration ordering", &history, 0.90));
    }

    #[test]
    fn exact_match_checks_all_history_not_just_last() {
        let history = vec!["first query".to_string(), "second query".to_string()];
        assert!(is_query_cycle("first query", &history, 0.90));
    }
}
