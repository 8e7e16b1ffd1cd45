//! # memctl-loop
//!
//! Deterministic controller driving an external answer-producer
//! through at most N iterations: protocol parsing, bounded subprocess
//! invocation, convergence and cycle detection, context accumulation
//! under a budget, and a replayable JSONL trace.

pub mod context;
pub mod controller;
pub mod llm;
pub mod protocol;
pub mod recall;
pub mod trace;

pub use context::merge_context;
pub use controller::{run_loop, LoopOptions, LoopResult};
pub use llm::{build_prompt, invoke_llm, CommandOracle, LlmMode, Oracle};
pub use protocol::{parse_directive, LoopDirective, Protocol, PROTOCOL_SYSTEM_PROMPT};
pub use recall::recall_items;
pub use trace::{replay_trace, LoopAction, LoopTrace, TraceSink};
