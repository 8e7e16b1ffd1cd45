//! JSONL loop traces: one record per iteration, replayable.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use memctl_core::MemctlResult;

/// Terminal (or continuing) action of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopAction {
    Continue,
    FixedPoint,
    QueryCycle,
    NoNewItems,
    MaxCalls,
    LlmStop,
}

impl LoopAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopAction::Continue => "continue",
            LoopAction::FixedPoint => "fixed_point",
            LoopAction::QueryCycle => "query_cycle",
            LoopAction::NoNewItems => "no_new_items",
            LoopAction::MaxCalls => "max_calls",
            LoopAction::LlmStop => "llm_stop",
        }
    }

    /// Converged means the loop settled on an answer rather than
    /// being cut off.
    pub fn converged(&self) -> bool {
        matches!(self, LoopAction::FixedPoint | LoopAction::LlmStop)
    }
}

/// One iteration's trace record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopTrace {
    pub iter: usize,
    pub query: Option<String>,
    pub new_items: usize,
    pub sim: Option<f64>,
    pub action: LoopAction,
}

/// Where trace records go.
pub enum TraceSink<'a> {
    Disabled,
    /// Standard diagnostic stream.
    Stderr,
    Stream(&'a mut dyn Write),
}

impl TraceSink<'_> {
    /// Emit one record as a JSON line. Emission failures are not the
    /// loop's problem; they are swallowed.
    pub fn emit(&mut self, trace: &LoopTrace) {
        let line = match serde_json::to_string(trace) {
            Ok(line) => line,
            Err(_) => return,
        };
        match self {
            TraceSink::Disabled => {}
            TraceSink::Stderr => {
                let _ = writeln!(std::io::stderr(), "{line}");
            }
            TraceSink::Stream(w) => {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }
}

/// Parse a JSONL trace back into records. Blank lines are skipped;
/// malformed lines propagate as JSON errors.
pub fn replay_trace<R: BufRead>(reader: R) -> MemctlResult<Vec<LoopTrace>> {
    let mut traces = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        traces.push(serde_json::from_str(line)?);
    }
    Ok(traces)
}
