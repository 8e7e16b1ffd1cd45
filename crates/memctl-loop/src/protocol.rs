//! Oracle output protocols.
//!
//! Three conventions for how the answer-producer signals refinement:
//! `json` (a directive line, a blank line, the answer), `regex`
//! (`NEED_MORE:` / `QUERY:` markers anywhere), and `passive` (no
//! refinement at all).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use memctl_core::{MemctlError, MemctlResult};

/// Protocol system prompt, prepended to every call in json mode. A
/// caller-supplied system prompt is appended after it, never instead.
pub const PROTOCOL_SYSTEM_PROMPT: &str = "\
You are answering a question using retrieved context. Follow this protocol exactly:

1. Your FIRST line of output MUST be a JSON object with these fields:
   {\"need_more\": <bool>, \"query\": \"<string or null>\", \"rationale\": \"<string or null>\", \"stop\": <bool>}

2. After the JSON line, leave ONE blank line, then write your answer.

3. If the provided context is SUFFICIENT to answer fully:
   {\"need_more\": false, \"query\": null, \"rationale\": null, \"stop\": true}

4. If the provided context is INSUFFICIENT and you need more information:
   {\"need_more\": true, \"query\": \"specific refined search query\", \"rationale\": \"what is missing\", \"stop\": false}

5. Do NOT emit anything before the JSON line. Do NOT wrap it in markdown.";

/// Which protocol the oracle speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Json,
    Regex,
    Passive,
}

impl Protocol {
    pub fn parse(s: &str) -> MemctlResult<Self> {
        match s {
            "json" => Ok(Protocol::Json),
            "regex" => Ok(Protocol::Regex),
            "passive" => Ok(Protocol::Passive),
            other => Err(MemctlError::Validation(format!(
                "unknown protocol: {other:?} (expected json|regex|passive)"
            ))),
        }
    }
}

/// Parsed refinement directive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopDirective {
    pub need_more: bool,
    pub query: Option<String>,
    pub rationale: Option<String>,
    pub stop: bool,
}

impl LoopDirective {
    fn stop_now() -> Self {
        Self { stop: true, ..Default::default() }
    }
}

#[derive(Debug, Deserialize)]
struct RawDirective {
    #[serde(default)]
    need_more: bool,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    stop: bool,
}

static NEED_MORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)NEED_MORE\s*:\s*(.+)").unwrap());
static QUERY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)QUERY\s*:\s*(.+)").unwrap());

/// json protocol: the first output line is a directive object,
/// everything after one blank line is the answer. A malformed first
/// line means the whole output IS the answer — unless strict mode, in
/// which case that is a validation error.
pub fn parse_json_directive(output: &str, strict: bool) -> MemctlResult<(LoopDirective, String)> {
    let (first_line, rest) = match output.split_once('\n') {
        Some((first, rest)) => (first.trim(), rest.trim_start_matches('\n').to_string()),
        None => (output.trim(), String::new()),
    };

    match serde_json::from_str::<RawDirective>(first_line) {
        Ok(raw) => {
            let mut directive = LoopDirective {
                need_more: raw.need_more,
                query: raw.query,
                rationale: raw.rationale,
                stop: raw.stop,
            };
            // need_more with an empty query is unactionable: stop.
            let empty_query = directive
                .query
                .as_deref()
                .map(|q| q.trim().is_empty())
                .unwrap_or(true);
            if directive.need_more && empty_query {
                directive.need_more = false;
                directive.stop = true;
            }
            Ok((directive, rest))
        }
        Err(_) if strict => Err(MemctlError::Validation(format!(
            "invalid JSON protocol line: {first_line:?}"
        ))),
        Err(_) => Ok((LoopDirective::stop_now(), output.to_string())),
    }
}

/// regex protocol: scan for `NEED_MORE:` / `QUERY:` lines. The answer
/// is the full output — the markers are metadata, not removed.
pub fn parse_regex_directive(output: &str) -> (LoopDirective, String) {
    let need_more_match = NEED_MORE_RE.captures(output);
    let query_match = QUERY_RE.captures(output);

    if need_more_match.is_some() || query_match.is_some() {
        let query = query_match.map(|c| c[1].trim().to_string()).filter(|q| !q.is_empty());
        let rationale = need_more_match.map(|c| c[1].trim().to_string());
        let need_more = query.is_some();
        return (
            LoopDirective { need_more, query, rationale, stop: !need_more },
            output.to_string(),
        );
    }
    (LoopDirective::stop_now(), output.to_string())
}

/// passive protocol: no refinement, the output is the answer.
pub fn parse_passive_directive(output: &str) -> (LoopDirective, String) {
    (LoopDirective::stop_now(), output.to_string())
}

/// Dispatch on the protocol.
pub fn parse_directive(
    output: &str,
    protocol: Protocol,
    strict: bool,
) -> MemctlResult<(LoopDirective, String)> {
    match protocol {
        Protocol::Json => parse_json_directive(output, strict),
        Protocol::Regex => Ok(parse_regex_directive(output)),
        Protocol::Passive => Ok(parse_passive_directive(output)),
    }
}
