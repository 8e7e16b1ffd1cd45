//! The bounded recall-answer controller.
//!
//! The oracle only proposes queries; this controller imposes the
//! bounds: at most `max_calls` invocations, fixed-point detection over
//! successive answers, query-cycle detection over refinement history,
//! dedup'd context under a character budget, and a structured trace.
//! The convergence ladder is control flow by result type — only
//! genuine subprocess and I/O failures raise.

use std::collections::HashSet;

use tracing::debug;

use memctl_core::config::LoopConfig;
use memctl_core::MemctlResult;
use memctl_similarity::{is_fixed_point, is_query_cycle, similarity};
use memctl_storage::MemoryStore;

use crate::context::merge_context;
use crate::llm::{build_prompt, Oracle};
use crate::protocol::{parse_directive, Protocol};
use crate::recall::recall_items;
use crate::trace::{LoopAction, LoopTrace, TraceSink};

/// Options beyond the numeric bounds in [`LoopConfig`].
#[derive(Debug, Clone, Default)]
pub struct LoopOptions {
    pub config: LoopConfig,
    pub protocol: Protocol,
    /// Appended after the protocol preamble, never instead of it.
    pub system_prompt: Option<String>,
    /// Restrict recall to one mount's items.
    pub mount_id: Option<String>,
    /// Max items per recall.
    pub recall_limit: usize,
}

impl LoopOptions {
    pub fn with_config(config: LoopConfig) -> Self {
        Self { config, recall_limit: 50, ..Default::default() }
    }
}

/// Final result of the recall-answer loop.
#[derive(Debug, Clone)]
pub struct LoopResult {
    pub answer: String,
    pub iterations: usize,
    pub converged: bool,
    pub traces: Vec<LoopTrace>,
    pub stop_reason: LoopAction,
}

/// Run the bounded loop. `initial_context` is typically an injection
/// block assembled by the caller; recall during iteration adds to it.
pub fn run_loop(
    store: &MemoryStore,
    oracle: &mut dyn Oracle,
    initial_context: &str,
    query: &str,
    opts: &LoopOptions,
    trace_sink: &mut TraceSink<'_>,
) -> MemctlResult<LoopResult> {
    let cfg = &opts.config;
    let budget_chars = cfg.budget * 4;
    let recall_limit = if opts.recall_limit == 0 { 50 } else { opts.recall_limit };

    let mut context = initial_context.to_string();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut query_history: Vec<String> = vec![query.to_string()];
    let mut answers: Vec<String> = Vec::new();
    let mut traces: Vec<LoopTrace> = Vec::new();
    let mut consecutive_stable = 0usize;
    let mut current_query = query.to_string();

    for iteration in 1..=cfg.max_calls {
        let prompt = build_prompt(
            &context,
            &current_query,
            opts.system_prompt.as_deref(),
            opts.protocol,
        );
        let output = oracle.invoke(&prompt)?;
        let (directive, answer) = parse_directive(&output, opts.protocol, cfg.strict)?;
        answers.push(answer);

        // Fixed-point test from the second answer onward.
        let mut sim: Option<f64> = None;
        if answers.len() >= 2 {
            let s = similarity(&answers[answers.len() - 1], &answers[answers.len() - 2]);
            sim = Some(s);
            if is_fixed_point(
                &answers[answers.len() - 1],
                &answers[answers.len() - 2],
                cfg.threshold,
            ) {
                consecutive_stable += 1;
            } else {
                consecutive_stable = 0;
            }
        }

        // Convergence ladder, in priority order.
        let mut action = if directive.stop || !directive.need_more {
            LoopAction::LlmStop
        } else if consecutive_stable >= cfg.stable_steps {
            LoopAction::FixedPoint
        } else if directive
            .query
            .as_deref()
            .map(|q| is_query_cycle(q, &query_history, cfg.query_threshold))
            .unwrap_or(false)
        {
            LoopAction::QueryCycle
        } else if iteration == cfg.max_calls {
            LoopAction::MaxCalls
        } else {
            LoopAction::Continue
        };

        let mut new_count = 0usize;
        if action == LoopAction::Continue {
            if let Some(refined) = &directive.query {
                let recalled = recall_items(store, refined, recall_limit, opts.mount_id.as_deref())?;
                let (merged, count) =
                    merge_context(&context, &recalled, &mut seen_ids, budget_chars);
                context = merged;
                new_count = count;

                if new_count == 0 && cfg.stop_on_no_new {
                    action = LoopAction::NoNewItems;
                }
                query_history.push(refined.clone());
                current_query = refined.clone();
            }
        }

        let trace = LoopTrace {
            iter: iteration,
            query: if directive.need_more { directive.query.clone() } else { None },
            new_items: new_count,
            sim: sim.map(|s| (s * 10_000.0).round() / 10_000.0),
            action,
        };
        trace_sink.emit(&trace);
        traces.push(trace);
        debug!(iteration, action = action.as_str(), new_items = new_count, "loop step");

        if action != LoopAction::Continue {
            return Ok(LoopResult {
                answer: answers.last().cloned().unwrap_or_default(),
                iterations: iteration,
                converged: action.converged(),
                traces,
                stop_reason: action,
            });
        }
    }

    // max_calls is decided inside the loop; this is unreachable with a
    // positive cap, but a zero cap lands here.
    Ok(LoopResult {
        answer: answers.last().cloned().unwrap_or_default(),
        iterations: cfg.max_calls,
        converged: false,
        traces,
        stop_reason: LoopAction::MaxCalls,
    })
}
