//! Query normalization and intent classification.
//!
//! Two deterministic capabilities feeding the store and the loop:
//! 1. [`normalize_query`] strips FR/EN stop words from full-text
//!    queries while preserving code identifiers.
//! 2. [`classify_mode`] labels user intent as exploration or
//!    modification; [`suggest_budget`] sizes the injection budget to
//!    the question length.
//!
//! [`reduced_subsets`] provides the REDUCED_AND drop order used by the
//! search cascade.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

// ─── Stop words ──────────────────────────────────────────────────────────────

pub static FR_STOP_WORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "du", "de", "en", "dans",
    "pour", "avec", "sur", "par", "qui", "que", "est", "sont", "au",
    "aux", "ce", "cette", "ces", "se", "sa", "son", "ses", "ne", "pas",
    "ou", "et", "mais", "donc", "car", "ni", "si", "comme",
    "il", "elle", "on", "nous", "vous", "ils", "elles", "je", "tu",
    "mon", "ton", "notre", "votre", "leur", "leurs",
    "y", "dont", "o\u{f9}",
];

pub static EN_STOP_WORDS: &[&str] = &[
    "the", "a", "an", "in", "on", "at", "to", "for", "of", "with",
    "by", "from", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "could",
    "should", "may", "might", "can", "shall",
    "it", "its", "this", "that", "these", "those",
    "i", "me", "my", "we", "our", "you", "your", "he", "him", "his",
    "she", "her", "they", "them", "their",
    "not", "no", "nor", "so", "but", "or", "and", "if", "then",
    "about", "up", "out", "into", "over", "after", "before",
];

/// Question words: stripped from full-text queries, used by the
/// intent classifier.
pub static QUESTION_WORDS: &[&str] = &[
    "how", "what", "where", "when", "why", "which", "who", "whom",
    "comment", "quoi", "quel", "quelle", "quels", "quelles", "pourquoi",
];

static ALL_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    FR_STOP_WORDS
        .iter()
        .chain(EN_STOP_WORDS)
        .chain(QUESTION_WORDS)
        .copied()
        .collect()
});

// ─── Identifier detection ────────────────────────────────────────────────────

static CAMEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z][A-Z]").unwrap());
static SNAKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-zA-Z]_[a-zA-Z]").unwrap());
static UPPER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]{2,}$").unwrap());

/// True if a word looks like a code identifier: CamelCase, snake_case,
/// an UPPER_CASE constant, or a dotted path.
pub fn is_identifier(word: &str) -> bool {
    if CAMEL_RE.is_match(word) || SNAKE_RE.is_match(word) || UPPER_RE.is_match(word) {
        return true;
    }
    word.contains('.') && !word.ends_with('.')
}

// ─── Query normalization ─────────────────────────────────────────────────────

/// Strip stop words from a full-text query for better recall.
///
/// Identifiers survive regardless of stop-word status. The result is
/// never empty: a query made entirely of stop words falls back to the
/// original input so the store never sees an empty match expression.
pub fn normalize_query(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return text.to_string();
    }

    let kept: Vec<&str> = words
        .iter()
        .filter(|w| is_identifier(w) || !ALL_STOP_WORDS.contains(w.to_lowercase().as_str()))
        .copied()
        .collect();

    if kept.is_empty() {
        text.to_string()
    } else {
        kept.join(" ")
    }
}

// ─── Mode classification ─────────────────────────────────────────────────────

static MODIFICATION_VERBS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "add", "replace", "refactor", "fix", "create", "delete", "update",
        "modify", "remove", "rename", "implement", "migrate", "upgrade",
        "configure", "install", "uninstall", "change", "move", "copy",
        "write", "rewrite", "patch", "merge", "split", "convert",
        "enable", "disable", "set", "reset",
        // French
        "ajouter", "remplacer", "corriger", "cr\u{e9}er", "supprimer", "modifier",
        "renommer", "impl\u{e9}menter", "migrer", "configurer", "installer",
        "changer", "d\u{e9}placer", "copier", "\u{e9}crire", "r\u{e9}\u{e9}crire", "activer",
        "d\u{e9}sactiver",
    ]
    .into_iter()
    .collect()
});

static EXPLORATION_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // English
        "how", "where", "what", "which", "who", "whom",
        "explain", "describe", "show", "list", "find", "search",
        "understand", "trace", "check", "compare", "analyze", "review",
        "structure", "dependency", "module", "layer", "flow", "pattern",
        "architecture", "overview", "summary", "diagram",
        // French
        "comment", "o\u{f9}", "quel", "quelle", "quels", "quelles", "qui",
        "expliquer", "d\u{e9}crire", "montrer", "lister", "trouver", "chercher",
        "comprendre", "tracer", "v\u{e9}rifier", "comparer", "analyser",
    ]
    .into_iter()
    .collect()
});

/// User intent over a corpus question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Exploration,
    Modification,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Exploration => "exploration",
            Mode::Modification => "modification",
        }
    }
}

/// Classify intent. Modification verbs take priority — modification
/// queries often contain exploration words too ("explain how to add X").
/// In their absence, exploration words confirm exploration; the default
/// is exploration.
pub fn classify_mode(text: &str) -> Mode {
    let strip = |w: &str| -> String {
        w.trim_matches(|c: char| ".,;:!?\"'()[]{}".contains(c)).to_string()
    };

    for w in text.to_lowercase().split_whitespace() {
        if MODIFICATION_VERBS.contains(strip(w).as_str()) {
            return Mode::Modification;
        }
    }
    for w in text.to_lowercase().split_whitespace() {
        if EXPLORATION_WORDS.contains(strip(w).as_str()) {
            return Mode::Exploration;
        }
    }
    Mode::Exploration
}

/// Suggest an injection budget proportional to question length.
/// Short questions get smaller budgets so the retrieved material does
/// not drown the intent.
pub fn suggest_budget(question_length: usize) -> usize {
    if question_length < 80 {
        600
    } else if question_length < 200 {
        800
    } else if question_length < 400 {
        1200
    } else {
        1500
    }
}

// ─── REDUCED_AND drop order ──────────────────────────────────────────────────

/// The order in which terms are dropped during REDUCED_AND: shortest
/// terms first (keep rare/specific terms longest), stable by original
/// position on length ties.
pub fn drop_order(terms: &[String]) -> Vec<String> {
    let mut indexed: Vec<(usize, &String)> = terms.iter().enumerate().collect();
    indexed.sort_by_key(|(pos, t)| (t.chars().count(), *pos));
    indexed.into_iter().map(|(_, t)| t.clone()).collect()
}

/// Successively smaller term subsets for the REDUCED_AND retry ladder,
/// from `n - 1` terms down to a single term. Each subset preserves the
/// original term order; terms leave in [`drop_order`].
pub fn reduced_subsets(terms: &[String]) -> Vec<Vec<String>> {
    if terms.len() < 2 {
        return Vec::new();
    }
    let order = drop_order(terms);
    let mut dropped: HashSet<&str> = HashSet::new();
    let mut subsets = Vec::new();

    for victim in order.iter().take(terms.len() - 1) {
        dropped.insert(victim.as_str());
        let subset: Vec<String> = terms
            .iter()
            .filter(|t| !dropped.contains(t.as_str()))
            .cloned()
            .collect();
        subsets.push(subset);
    }
    subsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_french_stop_words() {
        assert_eq!(
            normalize_query("comment cr\u{e9}er un incident dans le syst\u{e8}me"),
            "cr\u{e9}er incident syst\u{e8}me"
        );
    }

    #[test]
    fn preserves_identifiers() {
        assert_eq!(normalize_query("how does SomeServiceImpl work"), "SomeServiceImpl work");
        assert_eq!(normalize_query("PreAuthorize Controller"), "PreAuthorize Controller");
        assert_eq!(normalize_query("where is MSG_ERR_042"), "MSG_ERR_042");
        assert_eq!(normalize_query("what is com.example.Foo"), "com.example.Foo");
    }

    #[test]
    fn all_stop_words_fall_back_to_original() {
        assert_eq!(normalize_query("the"), "the");
        assert_eq!(normalize_query("how is it"), "how is it");
    }

    #[test]
    fn empty_input_passes_through() {
        assert_eq!(normalize_query(""), "");
        assert_eq!(normalize_query("   "), "   ");
    }

    #[test]
    fn snake_case_survives_stop_word_set() {
        assert_eq!(normalize_query("is_a token"), "is_a token");
    }

    #[test]
    fn classify_exploration_vs_modification() {
        assert_eq!(classify_mode("How does SomeServiceImpl work?"), Mode::Exploration);
        assert_eq!(classify_mode("Add logging to SomeServiceImpl"), Mode::Modification);
        assert_eq!(classify_mode("Where is MSG_ERR_042 defined?"), Mode::Exploration);
        assert_eq!(classify_mode("Replace MSG_ERR_042 with MSG_ERR_043"), Mode::Modification);
    }

    #[test]
    fn modification_wins_over_exploration_words() {
        assert_eq!(classify_mode("explain how to add a cache layer"), Mode::Modification);
    }

    #[test]
    fn default_mode_is_exploration() {
        assert_eq!(classify_mode("zorp blorp"), Mode::Exploration);
    }

    #[test]
    fn budget_is_monotone_in_question_length() {
        assert_eq!(suggest_budget(10), 600);
        assert_eq!(suggest_budget(100), 800);
        assert_eq!(suggest_budget(250), 1200);
        assert_eq!(suggest_budget(800), 1500);
        assert!(suggest_budget(10) <= suggest_budget(100));
    }

    #[test]
    fn drop_order_is_shortest_first_stable() {
        let terms: Vec<String> =
            ["monitoring", "zz", "alert", "ab"].iter().map(|s| s.to_string()).collect();
        let order = drop_order(&terms);
        assert_eq!(order, vec!["zz", "ab", "alert", "monitoring"]);
    }

    #[test]
    fn reduced_subsets_shrink_to_single_longest_term() {
        let terms: Vec<String> =
            ["endpoint", "zz", "monitoring"].iter().map(|s| s.to_string()).collect();
        let subsets = reduced_subsets(&terms);
        assert_eq!(subsets.len(), 2);
        assert_eq!(subsets[0], vec!["endpoint", "monitoring"]);
        assert_eq!(subsets[1], vec!["monitoring"]);
    }

    #[test]
    fn reduced_subsets_empty_below_two_terms() {
        assert!(reduced_subsets(&["solo".to_string()]).is_empty());
        assert!(reduced_subsets(&[]).is_empty());
    }

    #[test]
    fn subsets_preserve_original_order() {
        let terms: Vec<String> =
            ["gamma", "alphabetical", "beta"].iter().map(|s| s.to_string()).collect();
        let subsets = reduced_subsets(&terms);
        // "beta" (4) leaves before "gamma" (5); order within subsets is original.
        assert_eq!(subsets[0], vec!["gamma", "alphabetical"]);
    }
}
