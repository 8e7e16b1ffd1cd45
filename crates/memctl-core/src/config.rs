//! Compiled configuration defaults.
//!
//! Config file loading lives outside the core; these structs carry the
//! defaults and whatever the front-end resolved from flags and
//! environment.

/// SQLite store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: String,
    pub wal_mode: bool,
    pub fts_tokenizer: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: ".memory/memory.db".to_string(),
            wal_mode: true,
            fts_tokenizer: "unicode61 remove_diacritics 2".to_string(),
        }
    }
}

/// Write-governance configuration.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Content beyond this length must use `type=pointer`.
    pub max_content_length: usize,
    pub secret_patterns_enabled: bool,
    pub injection_patterns_enabled: bool,
    pub instructional_content_enabled: bool,
    pub pii_patterns_enabled: bool,
    /// Tiers that require a provenance source.
    pub require_provenance_for: Vec<crate::MemoryTier>,
    pub quarantine_expiry_hours: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_content_length: 2000,
            secret_patterns_enabled: true,
            injection_patterns_enabled: true,
            instructional_content_enabled: true,
            pii_patterns_enabled: true,
            require_provenance_for: vec![crate::MemoryTier::Mtm, crate::MemoryTier::Ltm],
            quarantine_expiry_hours: 72,
        }
    }
}

/// Deterministic consolidation configuration.
#[derive(Debug, Clone)]
pub struct ConsolidateConfig {
    pub stm_threshold: usize,
    pub cluster_distance_threshold: f64,
    pub usage_count_for_ltm: i64,
    pub auto_promote_types: Vec<crate::MemoryType>,
}

impl Default for ConsolidateConfig {
    fn default() -> Self {
        Self {
            stm_threshold: 20,
            cluster_distance_threshold: 0.3,
            usage_count_for_ltm: 5,
            auto_promote_types: vec![
                crate::MemoryType::Constraint,
                crate::MemoryType::Decision,
                crate::MemoryType::Definition,
            ],
        }
    }
}

/// Bounded recall-answer loop configuration.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Hard cap on LLM invocations.
    pub max_calls: usize,
    /// Answer fixed-point similarity threshold.
    pub threshold: f64,
    /// Query cycle similarity threshold.
    pub query_threshold: f64,
    /// Consecutive stable steps required for convergence.
    pub stable_steps: usize,
    pub stop_on_no_new: bool,
    /// Token budget, converted to chars via x4.
    pub budget: usize,
    /// Raise on malformed JSON directives instead of falling back.
    pub strict: bool,
    /// Oracle subprocess timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_calls: 3,
            threshold: 0.92,
            query_threshold: 0.90,
            stable_steps: 2,
            stop_on_no_new: true,
            budget: 2200,
            strict: false,
            timeout_secs: 300,
        }
    }
}
