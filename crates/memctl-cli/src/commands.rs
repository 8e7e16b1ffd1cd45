//! Command handlers. Every handler returns through the shared error
//! taxonomy; `main` maps it onto the exit-code contract.

use std::fs;
use std::io::{IsTerminal, Read, Write};
use std::path::Path;

use serde_json::json;

use memctl_core::config::{ConsolidateConfig, LoopConfig, StoreConfig};
use memctl_core::inject::{format_injection_block, InjectionType};
use memctl_core::{MemctlError, MemctlResult, MemoryProposal, MemoryTier, MemoryType};
use memctl_exchange::{export_items, import_items, ExportOptions, ImportOptions};
use memctl_inspect::{inspect_path, inspect_stats, render_block, MountMode, SyncMode};
use memctl_loop::{
    recall_items, run_loop, CommandOracle, LlmMode, LoopOptions, Protocol, TraceSink,
};
use memctl_policy::{apply_verdict, MemoryPolicy, PolicyAction};
use memctl_storage::{resolve_tokenizer_preset, ItemFilter, MemoryStore};
use memctl_sync::{ingest_file, ingest_stdin_text, is_stale, IngestOptions, SyncOptions};

use crate::{Args, Command, MountAction};

// ─── Environment resolution ──────────────────────────────────────────────────

/// Integer env var with fallback; a bad export never crashes.
fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_str(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn resolve_db(args: &Args) -> String {
    args.db.clone().unwrap_or_else(|| env_str("MEMCTL_DB", ".memory/memory.db"))
}

fn resolve_budget(args: &Args) -> usize {
    args.budget.unwrap_or_else(|| env_usize("MEMCTL_BUDGET", 2200))
}

fn resolve_tokenizer(args: &Args) -> String {
    let value = args.fts_tokenizer.clone().unwrap_or_else(|| env_str("MEMCTL_FTS", "fr"));
    resolve_tokenizer_preset(&value)
}

fn resolve_tier() -> MemctlResult<MemoryTier> {
    MemoryTier::parse(&env_str("MEMCTL_TIER", "stm"))
}

fn open_store(args: &Args) -> MemctlResult<MemoryStore> {
    let db_path = resolve_db(args);
    if let Some(parent) = Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    MemoryStore::open(&StoreConfig {
        db_path,
        wal_mode: true,
        fts_tokenizer: resolve_tokenizer(args),
    })
}

fn info(quiet: bool, msg: &str) {
    if !quiet {
        eprintln!("{msg}");
    }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

pub fn run(args: Args) -> MemctlResult<()> {
    match &args.cmd {
        Command::Init { path } => cmd_init(&args, path.as_deref()),
        Command::Push { query, sources, stdin, tags, scope, limit } => cmd_push(
            &args,
            query.as_deref(),
            sources,
            *stdin,
            tags,
            scope,
            *limit,
        ),
        Command::Pull { title, tags } => cmd_pull(&args, title.as_deref(), tags),
        Command::Search { query, limit, tier, item_type, scope } => {
            cmd_search(&args, query, *limit, tier.as_deref(), item_type.as_deref(), scope.clone())
        }
        Command::Show { id } => cmd_show(&args, id),
        Command::Stats => cmd_stats(&args),
        Command::Status => cmd_status(&args),
        Command::Consolidate { dry_run, scope } => cmd_consolidate(&args, *dry_run, scope),
        Command::Loop {
            query,
            llm,
            protocol,
            llm_mode,
            max_calls,
            system_prompt,
            mount,
            trace,
            trace_file,
            timeout,
            strict,
        } => cmd_loop(
            &args,
            query,
            llm,
            protocol,
            llm_mode,
            *max_calls,
            system_prompt.as_deref(),
            mount.as_deref(),
            *trace,
            trace_file.as_deref(),
            *timeout,
            *strict,
        ),
        Command::Mount { action } => cmd_mount(&args, action),
        Command::Sync { path, full, ignore } => cmd_sync(&args, path.as_deref(), *full, ignore),
        Command::Inspect { path, mount, sync_mode, mount_mode } => {
            cmd_inspect(&args, path.as_deref(), mount.as_deref(), sync_mode, mount_mode)
        }
        Command::Ask { path, question, llm, protocol, llm_mode, max_calls, timeout } => {
            cmd_ask(&args, path, question, llm, protocol, llm_mode, *max_calls, *timeout)
        }
        Command::Export { tier, item_type, scope, include_archived } => {
            cmd_export(&args, tier.as_deref(), item_type.as_deref(), scope.clone(), *include_archived)
        }
        Command::Import { file, preserve_ids, dry_run } => {
            cmd_import(&args, file.as_deref(), *preserve_ids, *dry_run)
        }
        Command::Reindex { tokenizer } => cmd_reindex(&args, tokenizer.as_deref()),
        Command::Reset { drop_mounts, dry_run } => cmd_reset(&args, *drop_mounts, *dry_run),
    }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

fn cmd_init(args: &Args, path: Option<&str>) -> MemctlResult<()> {
    let dir = path.unwrap_or(".memory");
    fs::create_dir_all(dir)?;
    let db_path = if args.db.is_some() || std::env::var("MEMCTL_DB").is_ok() {
        resolve_db(args)
    } else {
        format!("{dir}/memory.db")
    };

    if let Some(parent) = Path::new(&db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let store = MemoryStore::open(&StoreConfig {
        db_path: db_path.clone(),
        wal_mode: true,
        fts_tokenizer: resolve_tokenizer(args),
    })?;
    let stats = store.stats()?;

    let gitignore = Path::new(dir).join(".gitignore");
    if !gitignore.exists() {
        fs::write(&gitignore, "*.db\n*.db-wal\n*.db-shm\n")?;
    }

    info(
        args.quiet,
        &format!(
            "[init] store ready at {db_path} (fts5={}, tokenizer={})",
            stats.fts5_available,
            stats.fts_tokenizer.as_deref().unwrap_or("none")
        ),
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_push(
    args: &Args,
    query: Option<&str>,
    sources: &[String],
    stdin: bool,
    tags: &[String],
    scope: &str,
    limit: usize,
) -> MemctlResult<()> {
    if query.map(str::trim).unwrap_or("").is_empty() && sources.is_empty() && !stdin {
        return Err(MemctlError::Validation(
            "nothing to do: give a query, --source, or --stdin".to_string(),
        ));
    }
    let store = open_store(args)?;
    let opts = IngestOptions {
        scope: scope.to_string(),
        tags: tags.to_vec(),
        ..Default::default()
    };

    for source in sources {
        let path = Path::new(source);
        if !path.exists() {
            return Err(MemctlError::NotFound(format!("source not found: {source}")));
        }
        if path.is_dir() {
            let scan = memctl_sync::scan_mount(path, &[])?;
            for fi in scan.files {
                let result = ingest_file(&store, &fi.abs_path, &opts)?;
                info(
                    args.quiet,
                    &format!(
                        "[push] {}: {} chunk(s)",
                        fi.rel_path, result.chunks_created
                    ),
                );
            }
        } else {
            let result = ingest_file(&store, path, &opts)?;
            info(args.quiet, &format!("[push] {source}: {} chunk(s)", result.chunks_created));
        }
    }

    if stdin {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        let result = ingest_stdin_text(&store, &text, &opts)?;
        info(args.quiet, &format!("[push] stdin: {} chunk(s)", result.chunks_created));
    }

    if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
        let items = recall_items(&store, query, limit, None)?;
        let matched = items.len();
        let block = format_injection_block(
            &items,
            resolve_budget(args),
            Some(matched),
            InjectionType::MemoryRecall,
        );
        if !block.is_empty() {
            println!("{block}");
        }
        info(args.quiet, &format!("[push] {matched} item(s) matched"));
    }
    Ok(())
}

fn cmd_pull(args: &Args, title: Option<&str>, tags: &[String]) -> MemctlResult<()> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    if input.trim().is_empty() {
        return Err(MemctlError::Validation("empty input on stdin".to_string()));
    }

    // JSONL proposals; raw text becomes a single proposal.
    let mut proposals: Vec<MemoryProposal> = Vec::new();
    let looks_like_json = input.trim_start().starts_with('{');
    if looks_like_json {
        for (n, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<MemoryProposal>(line) {
                Ok(p) => proposals.push(p),
                Err(e) => {
                    return Err(MemctlError::Validation(format!(
                        "malformed proposal on line {}: {e}",
                        n + 1
                    )))
                }
            }
        }
    } else {
        proposals.push(MemoryProposal {
            title: title.unwrap_or("").to_string(),
            content: input.trim().to_string(),
            tags: tags.to_vec(),
            ..Default::default()
        });
    }

    let store = open_store(args)?;
    let policy = MemoryPolicy::default();
    let tier = resolve_tier()?;
    let session = std::env::var("MEMCTL_SESSION").ok().filter(|s| !s.is_empty());
    let mut written = 0usize;
    let mut rejected = 0usize;

    for mut proposal in proposals {
        // A session id stands in as chat provenance when the proposal
        // carries none of its own.
        if let Some(session) = &session {
            proposal
                .provenance_hint
                .entry("source_id".to_string())
                .or_insert_with(|| format!("session:{session}"));
        }
        let verdict = policy.evaluate_proposal(&proposal);
        match verdict.action {
            PolicyAction::Reject => {
                rejected += 1;
                for reason in &verdict.reasons {
                    info(args.quiet, &format!("[pull] rejected: {reason}"));
                }
            }
            action => {
                let mut item = proposal.into_memory_item(tier, 0.5);
                if action == PolicyAction::Quarantine {
                    apply_verdict(&mut item, &verdict);
                    for reason in &verdict.reasons {
                        info(args.quiet, &format!("[pull] quarantined: {reason}"));
                    }
                }
                store.write_item(&mut item, "pull")?;
                println!("{}", item.id);
                written += 1;
            }
        }
    }

    info(args.quiet, &format!("[pull] {written} stored, {rejected} rejected"));
    if written == 0 && rejected > 0 {
        return Err(MemctlError::Validation("all proposals rejected by policy".to_string()));
    }
    Ok(())
}

fn cmd_search(
    args: &Args,
    query: &str,
    limit: usize,
    tier: Option<&str>,
    item_type: Option<&str>,
    scope: Option<String>,
) -> MemctlResult<()> {
    let store = open_store(args)?;
    let filter = ItemFilter {
        tier: tier.map(MemoryTier::parse).transpose()?,
        item_type: item_type.map(MemoryType::coerce),
        scope,
        limit,
        ..Default::default()
    };
    let (items, meta) = store.search_fulltext(query, &filter)?;
    info(
        args.quiet,
        &format!("[search] strategy={} matched={}", meta.strategy.as_str(), items.len()),
    );
    if let Some(hint) = &meta.morphological_hint {
        info(args.quiet, &format!("[search] {hint}"));
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for item in &items {
        if args.json {
            let record = json!({
                "id": item.id,
                "title": item.title,
                "tier": item.tier.as_str(),
                "type": item.item_type.as_str(),
                "tags": item.tags,
                "confidence": item.confidence,
                "validation": item.validation.as_str(),
                "content_preview": item.content.chars().take(200).collect::<String>(),
            });
            writeln!(out, "{record}")?;
        } else {
            writeln!(
                out,
                "{}  [{}:{}] {}  {}",
                item.id,
                item.tier.as_str(),
                item.validation.as_str(),
                item.item_type.as_str(),
                item.title
            )?;
        }
    }
    Ok(())
}

fn cmd_show(args: &Args, id: &str) -> MemctlResult<()> {
    let store = open_store(args)?;
    let item = store
        .read_item(id)?
        .ok_or_else(|| MemctlError::NotFound(format!("no such item: {id}")))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("id:         {}", item.id);
        println!("tier:       {}", item.tier.as_str());
        println!("type:       {}", item.item_type.as_str());
        println!("title:      {}", item.title);
        println!("tags:       {}", item.tags.join(", "));
        println!("scope:      {}", item.scope);
        println!("confidence: {:.2}", item.confidence);
        println!("validation: {}", item.validation.as_str());
        println!("injectable: {}", item.injectable);
        println!("archived:   {}", item.archived);
        println!(
            "provenance: {}:{}",
            item.provenance.source_kind.as_str(),
            item.provenance.source_id
        );
        println!("created:    {}", item.created_at);
        println!("updated:    {}", item.updated_at);
        println!();
        println!("{}", item.content);
    }
    Ok(())
}

fn cmd_stats(args: &Args) -> MemctlResult<()> {
    let store = open_store(args)?;
    let stats = store.stats()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("items:      {}", stats.total_items);
        for (tier, count) in &stats.by_tier {
            println!("  {tier}: {count}");
        }
        for (item_type, count) in &stats.by_type {
            println!("  {item_type}: {count}");
        }
        println!("events:     {}", stats.events_count);
        println!("embeddings: {}", stats.embeddings_count);
        println!(
            "fts5:       {} ({})",
            stats.fts5_available,
            stats.fts_tokenizer.as_deref().unwrap_or("none")
        );
    }
    Ok(())
}

fn cmd_status(args: &Args) -> MemctlResult<()> {
    let store = open_store(args)?;
    let stats = store.stats()?;
    let mounts = store.list_mounts()?;

    let mut mount_rows = Vec::new();
    for mount in &mounts {
        let state = if !Path::new(&mount.path).is_dir() {
            "missing"
        } else if mount.last_sync_at.is_none() {
            "never-synced"
        } else if is_stale(&store, mount, None)? {
            "stale"
        } else {
            "fresh"
        };
        mount_rows.push((mount, state));
    }

    if args.json {
        let payload = json!({
            "stats": stats,
            "mounts": mount_rows
                .iter()
                .map(|(m, state)| {
                    json!({
                        "mount_id": m.mount_id,
                        "path": m.path,
                        "name": m.name,
                        "last_sync_at": m.last_sync_at,
                        "state": state,
                    })
                })
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        println!("items: {} | events: {}", stats.total_items, stats.events_count);
        for (mount, state) in mount_rows {
            println!(
                "{}  {}  [{}]  last_sync={}",
                mount.mount_id,
                mount.label(),
                state,
                mount.last_sync_at.as_deref().unwrap_or("never")
            );
        }
    }
    Ok(())
}

fn cmd_consolidate(args: &Args, dry_run: bool, scope: &str) -> MemctlResult<()> {
    let store = open_store(args)?;
    let report =
        memctl_consolidate::consolidate(&store, &ConsolidateConfig::default(), scope, dry_run)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "clusters: {} | merged: {} | promoted: {}{}",
            report.clusters_found,
            report.items_merged,
            report.items_promoted,
            if dry_run { " (dry run)" } else { "" }
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_loop(
    args: &Args,
    query: &str,
    llm: &str,
    protocol: &str,
    llm_mode: &str,
    max_calls: usize,
    system_prompt: Option<&str>,
    mount: Option<&str>,
    trace: bool,
    trace_file: Option<&str>,
    timeout: u64,
    strict: bool,
) -> MemctlResult<()> {
    let store = open_store(args)?;
    let protocol = Protocol::parse(protocol)?;
    let llm_mode = LlmMode::parse(llm_mode)?;

    let mount_id = match mount {
        Some(value) => Some(
            store
                .read_mount(value)?
                .ok_or_else(|| MemctlError::NotFound(format!("no such mount: {value}")))?
                .mount_id,
        ),
        None => None,
    };

    // Unix composition: a piped stdin is the initial injection block
    // (typically the output of `memctl push`).
    let mut initial_context = String::new();
    if !std::io::stdin().is_terminal() {
        std::io::stdin().read_to_string(&mut initial_context)?;
    }

    let options = LoopOptions {
        config: LoopConfig {
            max_calls,
            budget: resolve_budget(args),
            strict,
            timeout_secs: timeout,
            ..Default::default()
        },
        protocol,
        system_prompt: system_prompt.map(str::to_string),
        mount_id,
        recall_limit: 50,
    };

    let mut oracle = CommandOracle::new(llm, llm_mode, timeout);
    let mut trace_writer;
    let mut sink = if let Some(path) = trace_file {
        trace_writer = fs::File::create(path)?;
        TraceSink::Stream(&mut trace_writer)
    } else if trace && !args.quiet {
        TraceSink::Stderr
    } else {
        TraceSink::Disabled
    };

    let result = run_loop(&store, &mut oracle, &initial_context, query, &options, &mut sink)
        .map_err(|e| match e {
            MemctlError::Oracle(msg) => {
                eprintln!("[loop] LLM error: {msg}");
                MemctlError::Oracle(msg)
            }
            other => other,
        })?;

    println!("{}", result.answer);
    info(
        args.quiet,
        &format!(
            "[loop] stop={} converged={} iterations={}",
            result.stop_reason.as_str(),
            result.converged,
            result.iterations
        ),
    );
    Ok(())
}

fn cmd_mount(args: &Args, action: &MountAction) -> MemctlResult<()> {
    let store = open_store(args)?;
    match action {
        MountAction::Add { path, name, ignore, lang_hint } => {
            let canonical = fs::canonicalize(path)
                .map_err(|_| MemctlError::NotFound(format!("mount path does not exist: {path}")))?;
            if !canonical.is_dir() {
                return Err(MemctlError::Validation(format!(
                    "mount path is not a directory: {path}"
                )));
            }
            let mount_id = store.write_mount(
                &canonical.to_string_lossy(),
                name.as_deref(),
                ignore,
                lang_hint.as_deref(),
            )?;
            println!("{mount_id}");
        }
        MountAction::List => {
            for mount in store.list_mounts()? {
                if args.json {
                    println!("{}", serde_json::to_string(&mount)?);
                } else {
                    println!(
                        "{}  {}  last_sync={}",
                        mount.mount_id,
                        mount.path,
                        mount.last_sync_at.as_deref().unwrap_or("never")
                    );
                }
            }
        }
        MountAction::Remove { id } => {
            if !store.remove_mount(id)? {
                return Err(MemctlError::NotFound(format!("no such mount: {id}")));
            }
            info(args.quiet, &format!("[mount] removed {id}"));
        }
    }
    Ok(())
}

fn cmd_sync(args: &Args, path: Option<&str>, full: bool, ignore: &[String]) -> MemctlResult<()> {
    let store = open_store(args)?;
    let opts = SyncOptions {
        delta: !full,
        ignore_patterns: if ignore.is_empty() { None } else { Some(ignore.to_vec()) },
        ..Default::default()
    };

    let results = match path {
        Some(p) => vec![memctl_sync::sync_mount(&store, Path::new(p), &opts)?],
        None => memctl_sync::sync_all(&store, &opts)?,
    };

    for result in &results {
        if args.json {
            println!("{}", serde_json::to_string(result)?);
        } else {
            info(
                args.quiet,
                &format!(
                    "[sync] {}: {} new, {} changed, {} unchanged, {} chunks",
                    result.mount_path,
                    result.files_new,
                    result.files_changed,
                    result.files_unchanged,
                    result.chunks_created
                ),
            );
        }
    }
    Ok(())
}

fn cmd_inspect(
    args: &Args,
    path: Option<&str>,
    mount: Option<&str>,
    sync_mode: &str,
    mount_mode: &str,
) -> MemctlResult<()> {
    let store = open_store(args)?;
    let budget = resolve_budget(args);

    if let Some(path) = path {
        let sync_mode = SyncMode::parse(sync_mode)?;
        let mount_mode = MountMode::parse(mount_mode)?;
        let quiet = args.quiet;
        let result = inspect_path(
            &store,
            Path::new(path),
            sync_mode,
            mount_mode,
            None,
            &mut |msg| info(quiet, msg),
        )?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            println!("{}", render_block(&result.stats, Some(&result.mount_label), budget));
        }
        return Ok(());
    }

    let (mount_id, label) = match mount {
        Some(value) => {
            let m = store
                .read_mount(value)?
                .ok_or_else(|| MemctlError::NotFound(format!("no such mount: {value}")))?;
            (Some(m.mount_id.clone()), Some(m.label().to_string()))
        }
        None => (None, None),
    };
    let stats = inspect_stats(&store, mount_id.as_deref())?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", render_block(&stats, label.as_deref(), budget));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_ask(
    args: &Args,
    path: &str,
    question: &str,
    llm: &str,
    protocol: &str,
    llm_mode: &str,
    max_calls: usize,
    timeout: u64,
) -> MemctlResult<()> {
    let store = open_store(args)?;
    let protocol = Protocol::parse(protocol)?;
    let llm_mode = LlmMode::parse(llm_mode)?;
    let budget = memctl_query::suggest_budget(question.len()).min(resolve_budget(args));
    let quiet = args.quiet;

    // Mount + sync + structural block.
    let inspected = inspect_path(
        &store,
        Path::new(path),
        SyncMode::Auto,
        MountMode::Persist,
        None,
        &mut |msg| info(quiet, msg),
    )?;
    let structure = render_block(&inspected.stats, Some(&inspected.mount_label), budget);

    // Initial recall scoped to the mount.
    let recalled = recall_items(&store, question, 20, Some(&inspected.mount_id))?;
    let matched = recalled.len();
    let memory =
        format_injection_block(&recalled, budget, Some(matched), InjectionType::MemoryRecall);

    let initial_context = if memory.is_empty() {
        structure
    } else {
        format!("{structure}\n\n{memory}")
    };

    let options = LoopOptions {
        config: LoopConfig {
            max_calls,
            budget: resolve_budget(args),
            timeout_secs: timeout,
            ..Default::default()
        },
        protocol,
        system_prompt: None,
        mount_id: Some(inspected.mount_id.clone()),
        recall_limit: 50,
    };
    let mut oracle = CommandOracle::new(llm, llm_mode, timeout);
    let result = run_loop(
        &store,
        &mut oracle,
        &initial_context,
        question,
        &options,
        &mut TraceSink::Disabled,
    )?;

    println!("{}", result.answer);
    info(
        args.quiet,
        &format!(
            "[ask] stop={} iterations={}",
            result.stop_reason.as_str(),
            result.iterations
        ),
    );
    Ok(())
}

fn cmd_export(
    args: &Args,
    tier: Option<&str>,
    item_type: Option<&str>,
    scope: Option<String>,
    include_archived: bool,
) -> MemctlResult<()> {
    let store = open_store(args)?;
    let opts = ExportOptions {
        tier: tier.map(MemoryTier::parse).transpose()?,
        item_type: item_type.map(MemoryType::coerce),
        scope,
        include_archived,
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let count = export_items(&store, &opts, &mut out)?;
    info(args.quiet, &format!("[export] {count} item(s)"));
    Ok(())
}

fn cmd_import(
    args: &Args,
    file: Option<&str>,
    preserve_ids: bool,
    dry_run: bool,
) -> MemctlResult<()> {
    let store = open_store(args)?;
    let opts = ImportOptions { preserve_ids, dry_run };

    let result = match file {
        Some(path) => {
            let file = fs::File::open(path)
                .map_err(|_| MemctlError::NotFound(format!("import file not found: {path}")))?;
            import_items(&store, &mut std::io::BufReader::new(file), &opts)?
        }
        None => {
            let mut buffered = String::new();
            std::io::stdin().read_to_string(&mut buffered)?;
            import_items(&store, &mut std::io::Cursor::new(buffered), &opts)?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        info(
            args.quiet,
            &format!(
                "[import]{} {} imported, {} dedup, {} policy, {} error(s)",
                if dry_run { " (dry run)" } else { "" },
                result.imported,
                result.skipped_dedup,
                result.skipped_policy,
                result.errors
            ),
        );
    }
    Ok(())
}

fn cmd_reindex(args: &Args, tokenizer: Option<&str>) -> MemctlResult<()> {
    let store = open_store(args)?;
    let resolved = tokenizer.map(resolve_tokenizer_preset);
    let count = store.rebuild_fts(resolved.as_deref())?;
    if count < 0 {
        return Err(MemctlError::Validation("FTS5 is not available in this build".to_string()));
    }
    info(
        args.quiet,
        &format!("[reindex] {count} item(s) indexed (tokenizer={})", store.fts_tokenizer()),
    );
    Ok(())
}

fn cmd_reset(args: &Args, drop_mounts: bool, dry_run: bool) -> MemctlResult<()> {
    let store = open_store(args)?;
    let counts = store.reset(!drop_mounts, dry_run)?;
    if args.json {
        println!("{}", serde_json::to_string(&counts)?);
    } else {
        info(
            args.quiet,
            &format!(
                "[reset]{} {} items, {} revisions, {} events, {} links, {} corpus, {} mounts",
                if dry_run { " (dry run)" } else { "" },
                counts.items,
                counts.revisions,
                counts.events,
                counts.links,
                counts.corpus_hashes,
                counts.mounts
            ),
        );
    }
    Ok(())
}
