//! # memctl-policy
//!
//! Write governance. Every write candidate — proposal or constructed
//! item — is evaluated in one call and classified accept / quarantine /
//! reject. The verdict is consumed on every write path; nothing
//! bypasses it.
//!
//! Hard blocks (reject): secrets, prompt injection, instructional
//! block fragments, oversized non-pointer content, missing provenance
//! for MTM/LTM. Soft blocks (quarantine): self-instructions, PII,
//! missing why_store, missing provenance source. Quarantine forces
//! `tier=stm`, `validation=unverified`, an expiry, and — for
//! instructional or PII triggers — `injectable=false`.
//!
//! Deterministic: no network, no external state; same input, same
//! verdict.

pub mod patterns;

use chrono::{Duration, Utc};
use regex::Regex;

use memctl_core::config::PolicyConfig;
use memctl_core::{MemoryItem, MemoryProposal, MemoryTier, MemoryType, ValidationState};

use patterns::{
    INJECTION_PATTERNS, INSTRUCTIONAL_BLOCK_PATTERNS, INSTRUCTIONAL_QUARANTINE_PATTERNS,
    PII_PATTERNS, SECRET_PATTERNS,
};

/// Verdict action. A closed set; rejection is data, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Accept,
    Quarantine,
    Reject,
}

impl PolicyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::Accept => "accept",
            PolicyAction::Quarantine => "quarantine",
            PolicyAction::Reject => "reject",
        }
    }
}

/// Result of policy evaluation on a write candidate.
#[derive(Debug, Clone)]
pub struct PolicyVerdict {
    pub action: PolicyAction,
    /// Machine-parseable reasons, e.g.
    /// `HARD_BLOCK: secret pattern #3 matched`.
    pub reasons: Vec<String>,
    pub forced_tier: Option<MemoryTier>,
    pub forced_validation: Option<ValidationState>,
    pub forced_expires_at: Option<String>,
    /// When true the stored item gets `injectable = false`.
    pub forced_non_injectable: bool,
}

impl PolicyVerdict {
    fn accept() -> Self {
        Self {
            action: PolicyAction::Accept,
            reasons: Vec::new(),
            forced_tier: None,
            forced_validation: None,
            forced_expires_at: None,
            forced_non_injectable: false,
        }
    }

    fn reject(reasons: Vec<String>) -> Self {
        Self {
            action: PolicyAction::Reject,
            reasons,
            forced_tier: None,
            forced_validation: None,
            forced_expires_at: None,
            forced_non_injectable: false,
        }
    }

    pub fn accepted(&self) -> bool {
        self.action == PolicyAction::Accept
    }

    pub fn rejected(&self) -> bool {
        self.action == PolicyAction::Reject
    }
}

/// The write-governance rule engine.
pub struct MemoryPolicy {
    config: PolicyConfig,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

impl MemoryPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    /// Evaluate an LLM-emitted proposal (pre-storage).
    pub fn evaluate_proposal(&self, proposal: &MemoryProposal) -> PolicyVerdict {
        let text = format!("{} {}", proposal.title, proposal.content);

        let mut reasons = self.hard_block_reasons(&text);
        if proposal.content.len() > self.config.max_content_length
            && proposal.item_type != MemoryType::Pointer
        {
            reasons.push(format!(
                "Content too long ({} chars > {}); use type='pointer'",
                proposal.content.len(),
                self.config.max_content_length
            ));
        }
        if !reasons.is_empty() {
            return PolicyVerdict::reject(reasons);
        }

        let mut quarantine_reasons = Vec::new();
        let mut force_non_injectable = false;

        if self.config.instructional_content_enabled {
            let hits = check_patterns(
                &INSTRUCTIONAL_QUARANTINE_PATTERNS,
                &text,
                "QUARANTINE: instructional_self_instruction pattern",
            );
            if !hits.is_empty() {
                quarantine_reasons.extend(hits);
                force_non_injectable = true;
            }
        }
        if self.config.pii_patterns_enabled {
            let hits = check_patterns(&PII_PATTERNS, &text, "QUARANTINE: pii pattern");
            if !hits.is_empty() {
                quarantine_reasons.extend(hits);
                force_non_injectable = true;
            }
        }
        if proposal.why_store.is_empty() {
            quarantine_reasons.push("Missing why_store justification".to_string());
        }
        if proposal
            .provenance_hint
            .get("source_id")
            .map(String::as_str)
            .unwrap_or("")
            .is_empty()
        {
            quarantine_reasons.push("Missing provenance source_id".to_string());
        }

        if !quarantine_reasons.is_empty() {
            return self.quarantine(quarantine_reasons, force_non_injectable);
        }
        PolicyVerdict::accept()
    }

    /// Evaluate an already-constructed item (direct writes, import,
    /// tier promotion).
    pub fn evaluate_item(&self, item: &MemoryItem) -> PolicyVerdict {
        let text = format!("{} {}", item.title, item.content);

        let mut reasons = self.hard_block_reasons(&text);
        if item.content.len() > self.config.max_content_length
            && item.item_type != MemoryType::Pointer
        {
            reasons.push("Content too long for non-pointer type".to_string());
        }
        if self.config.require_provenance_for.contains(&item.tier)
            && item.provenance.source_id.is_empty()
        {
            reasons.push(format!(
                "Provenance source_id required for tier={}",
                item.tier.as_str()
            ));
        }
        if !reasons.is_empty() {
            return PolicyVerdict::reject(reasons);
        }

        let mut quarantine_reasons = Vec::new();
        let mut force_non_injectable = false;
        if self.config.instructional_content_enabled {
            let hits = check_patterns(
                &INSTRUCTIONAL_QUARANTINE_PATTERNS,
                &text,
                "QUARANTINE: instructional_self_instruction pattern",
            );
            if !hits.is_empty() {
                quarantine_reasons.extend(hits);
                force_non_injectable = true;
            }
        }
        if self.config.pii_patterns_enabled {
            let hits = check_patterns(&PII_PATTERNS, &text, "QUARANTINE: pii pattern");
            if !hits.is_empty() {
                quarantine_reasons.extend(hits);
                force_non_injectable = true;
            }
        }

        if !quarantine_reasons.is_empty() {
            return self.quarantine(quarantine_reasons, force_non_injectable);
        }
        PolicyVerdict::accept()
    }

    fn hard_block_reasons(&self, text: &str) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.config.secret_patterns_enabled {
            reasons.extend(check_patterns(&SECRET_PATTERNS, text, "HARD_BLOCK: secret pattern"));
        }
        if self.config.injection_patterns_enabled {
            reasons.extend(check_patterns(
                &INJECTION_PATTERNS,
                text,
                "HARD_BLOCK: injection pattern",
            ));
        }
        if self.config.instructional_content_enabled {
            reasons.extend(check_patterns(
                &INSTRUCTIONAL_BLOCK_PATTERNS,
                text,
                "HARD_BLOCK: instructional_content pattern",
            ));
        }
        reasons
    }

    fn quarantine(&self, reasons: Vec<String>, force_non_injectable: bool) -> PolicyVerdict {
        let expiry = Utc::now() + Duration::hours(self.config.quarantine_expiry_hours);
        PolicyVerdict {
            action: PolicyAction::Quarantine,
            reasons,
            forced_tier: Some(MemoryTier::Stm),
            forced_validation: Some(ValidationState::Unverified),
            forced_expires_at: Some(expiry.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)),
            forced_non_injectable: force_non_injectable,
        }
    }
}

/// Apply a quarantine verdict's forced fields to an item in place.
pub fn apply_verdict(item: &mut MemoryItem, verdict: &PolicyVerdict) {
    if let Some(tier) = verdict.forced_tier {
        item.tier = tier;
    }
    if let Some(validation) = verdict.forced_validation {
        item.validation = validation;
    }
    if let Some(expires_at) = &verdict.forced_expires_at {
        item.expires_at = Some(expires_at.clone());
    }
    if verdict.forced_non_injectable {
        item.injectable = false;
    }
}

fn check_patterns(patterns: &[Regex], text: &str, label: &str) -> Vec<String> {
    patterns
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_match(text))
        .map(|(i, _)| format!("{label} #{i} matched"))
        .collect()
}
