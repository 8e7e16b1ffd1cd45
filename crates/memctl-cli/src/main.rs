//! memctl — Unix-composable memory commands.
//!
//! Data-producing commands emit exclusively data on stdout; progress,
//! warnings, and info go to stderr so any read command pipes cleanly
//! into downstream tools.
//!
//! Precedence (invariant): CLI flag > MEMCTL_* env var > compiled
//! default. Recognised environment: MEMCTL_DB, MEMCTL_BUDGET,
//! MEMCTL_FTS (preset fr|en|raw or raw tokenizer string), MEMCTL_TIER,
//! MEMCTL_SESSION.
//!
//! Exit codes: 0 success (including idempotent no-op); 1 operational
//! (bad args, empty input, policy rejection, not found); 2 internal
//! (unexpected failure, I/O error).

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use memctl_core::MemctlError;

#[derive(Parser)]
#[command(name = "memctl", version, about = "Memory control plane for LLM orchestration")]
struct Args {
    /// Database path (overrides MEMCTL_DB).
    #[arg(long, global = true)]
    db: Option<String>,

    /// Token budget for injection blocks (overrides MEMCTL_BUDGET).
    #[arg(long, global = true)]
    budget: Option<usize>,

    /// FTS5 tokenizer preset (fr|en|raw) or raw tokenizer string
    /// (overrides MEMCTL_FTS).
    #[arg(long = "fts-tokenizer", global = true)]
    fts_tokenizer: Option<String>,

    /// Suppress non-fatal diagnostics (errors always show).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit JSON on stdout where applicable.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold a memory store (directory, database, .gitignore).
    Init {
        /// Target directory (default: .memory).
        path: Option<String>,
    },
    /// Ingest sources and/or emit a recall injection block.
    Push {
        /// Recall query; omit to only ingest.
        query: Option<String>,
        /// Files or directories to ingest before recall.
        #[arg(long = "source")]
        sources: Vec<String>,
        /// Read content to ingest from stdin.
        #[arg(long)]
        stdin: bool,
        /// Extra tags for ingested chunks.
        #[arg(long)]
        tags: Vec<String>,
        /// Memory scope for ingested chunks.
        #[arg(long, default_value = "project")]
        scope: String,
        /// Max recall results before budget cut.
        #[arg(short = 'k', long, default_value_t = 20)]
        limit: usize,
    },
    /// Read memory proposals from stdin (JSONL) and store the ones
    /// policy lets through.
    Pull {
        /// Title for raw (non-JSON) stdin content.
        #[arg(long)]
        title: Option<String>,
        /// Tags attached to raw stdin content.
        #[arg(long)]
        tags: Vec<String>,
    },
    /// Full-text search over the store.
    Search {
        query: String,
        #[arg(short = 'k', long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        tier: Option<String>,
        #[arg(long = "type")]
        item_type: Option<String>,
        #[arg(long)]
        scope: Option<String>,
    },
    /// Display a single memory item.
    Show { id: String },
    /// Store metrics.
    Stats,
    /// Project memory health dashboard.
    Status,
    /// Merge and promote short-term items.
    Consolidate {
        #[arg(long)]
        dry_run: bool,
        #[arg(long, default_value = "project")]
        scope: String,
    },
    /// Bounded recall-answer loop against an external LLM command.
    Loop {
        query: String,
        /// LLM command template, e.g. "claude -p" or "ollama run mistral".
        #[arg(long)]
        llm: String,
        #[arg(long, default_value = "json")]
        protocol: String,
        #[arg(long = "llm-mode", default_value = "stdin")]
        llm_mode: String,
        #[arg(long, default_value_t = 3)]
        max_calls: usize,
        #[arg(long = "system-prompt")]
        system_prompt: Option<String>,
        /// Restrict recall to one mount (id, path, or name).
        #[arg(long)]
        mount: Option<String>,
        /// Emit a JSONL trace.
        #[arg(long)]
        trace: bool,
        /// Trace destination (default: stderr).
        #[arg(long = "trace-file")]
        trace_file: Option<String>,
        /// Oracle timeout in seconds.
        #[arg(long, default_value_t = 300)]
        timeout: u64,
        /// Raise on malformed JSON directives.
        #[arg(long)]
        strict: bool,
    },
    /// Register and manage folder mounts.
    Mount {
        #[command(subcommand)]
        action: MountAction,
    },
    /// Scan and ingest mounted folders (3-tier delta).
    Sync {
        /// Folder to sync; omit to sync every registered mount.
        path: Option<String>,
        /// Re-process everything instead of the delta.
        #[arg(long)]
        full: bool,
        /// Ignore globs (override the mount's stored patterns).
        #[arg(long = "ignore")]
        ignore: Vec<String>,
    },
    /// Structural injection block over corpus metadata.
    Inspect {
        /// Folder to inspect (automount + autosync).
        path: Option<String>,
        /// Inspect an existing mount by id, path, or name.
        #[arg(long)]
        mount: Option<String>,
        #[arg(long = "sync-mode", default_value = "auto")]
        sync_mode: String,
        #[arg(long = "mount-mode", default_value = "persist")]
        mount_mode: String,
    },
    /// One-shot folder question answering.
    Ask {
        path: String,
        question: String,
        #[arg(long)]
        llm: String,
        #[arg(long, default_value = "json")]
        protocol: String,
        #[arg(long = "llm-mode", default_value = "stdin")]
        llm_mode: String,
        #[arg(long, default_value_t = 3)]
        max_calls: usize,
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },
    /// Export memory items as JSONL.
    Export {
        #[arg(long)]
        tier: Option<String>,
        #[arg(long = "type")]
        item_type: Option<String>,
        #[arg(long)]
        scope: Option<String>,
        #[arg(long = "include-archived")]
        include_archived: bool,
    },
    /// Import memory items from JSONL (file or stdin).
    Import {
        file: Option<String>,
        #[arg(long = "preserve-ids")]
        preserve_ids: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Rebuild the FTS5 index, optionally with a new tokenizer.
    Reindex {
        #[arg(long)]
        tokenizer: Option<String>,
    },
    /// Clear store content (items, revisions, events, links, corpus).
    Reset {
        /// Also remove registered mounts.
        #[arg(long = "drop-mounts")]
        drop_mounts: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum MountAction {
    /// Register a folder.
    Add {
        path: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "ignore")]
        ignore: Vec<String>,
        #[arg(long = "lang")]
        lang_hint: Option<String>,
    },
    /// List registered mounts.
    List,
    /// Remove a mount by id or name (items survive).
    Remove { id: String },
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let code = match commands::run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("[memctl] {e}");
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

/// Error taxonomy → exit code per the CLI contract.
fn exit_code(e: &MemctlError) -> i32 {
    match e {
        MemctlError::Validation(_)
        | MemctlError::Guard(_)
        | MemctlError::NotFound(_)
        | MemctlError::RateLimited { .. } => 1,
        _ => 2,
    }
}
