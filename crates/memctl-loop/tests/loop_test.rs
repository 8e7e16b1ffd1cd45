//! Loop controller: convergence ladder, cycle detection, budget
//! behaviour, scoped recall, quarantine exclusion, trace shape.

use memctl_core::config::LoopConfig;
use memctl_core::{MemctlResult, MemoryItem};
use memctl_loop::{
    recall_items, run_loop, LoopAction, LoopOptions, Protocol, TraceSink,
};
use memctl_storage::MemoryStore;

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn store_with_items(contents: &[(&str, &str)]) -> MemoryStore {
    let store = MemoryStore::open_in_memory().unwrap();
    for (title, content) in contents {
        let mut item = MemoryItem {
            title: title.to_string(),
            content: content.to_string(),
            ..Default::default()
        };
        store.write_item(&mut item, "test").unwrap();
    }
    store
}

/// Oracle that replays scripted outputs in order.
fn scripted<S: Into<String>>(outputs: Vec<S>) -> impl FnMut(&str) -> MemctlResult<String> {
    let mut queue: std::collections::VecDeque<String> =
        outputs.into_iter().map(Into::into).collect();
    move |_prompt: &str| {
        Ok(queue.pop_front().unwrap_or_else(|| {
            "{\"need_more\": false, \"stop\": true}\n\nfallback answer".to_string()
        }))
    }
}

fn opts(max_calls: usize) -> LoopOptions {
    LoopOptions::with_config(LoopConfig { max_calls, ..Default::default() })
}

// ─── Convergence ladder ──────────────────────────────────────────────────────

#[test]
fn oracle_stop_converges_at_second_iteration() {
    let store = store_with_items(&[("Auth", "token refresh happens hourly")]);
    let mut oracle = scripted(vec![
        "{\"need_more\": true, \"query\": \"token refresh\", \"stop\": false}\n\nPartial answer.",
        "{\"need_more\": false, \"stop\": true}\n\nFinal answer.",
    ]);

    let result = run_loop(
        &store,
        &mut oracle,
        "",
        "how does auth work",
        &opts(5),
        &mut TraceSink::Disabled,
    )
    .unwrap();

    assert_eq!(result.stop_reason, LoopAction::LlmStop);
    assert!(result.converged);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.traces.len(), 2);
    assert_eq!(result.answer, "Final answer.");
    // Iteration 1 recalled and continued.
    assert_eq!(result.traces[0].action, LoopAction::Continue);
    assert_eq!(result.traces[0].new_items, 1);
}

#[test]
fn immediate_stop_converges_in_one_call() {
    let store = store_with_items(&[]);
    let mut oracle = scripted(vec!["{\"need_more\": false, \"stop\": true}\n\nDone."]);
    let result =
        run_loop(&store, &mut oracle, "", "q", &opts(5), &mut TraceSink::Disabled).unwrap();
    assert_eq!(result.iterations, 1);
    assert_eq!(result.stop_reason, LoopAction::LlmStop);
    assert_eq!(result.answer, "Done.");
}

#[test]
fn refining_with_the_original_query_is_a_cycle() {
    let store = store_with_items(&[("Auth", "auth flow content")]);
    let mut oracle = scripted(vec![
        "{\"need_more\": true, \"query\": \"auth flow\", \"stop\": false}\n\nTrying again.",
    ]);

    let result = run_loop(
        &store,
        &mut oracle,
        "",
        "auth flow",
        &opts(5),
        &mut TraceSink::Disabled,
    )
    .unwrap();

    assert_eq!(result.stop_reason, LoopAction::QueryCycle);
    assert!(!result.converged);
    assert_eq!(result.iterations, 1);
}

#[test]
fn near_duplicate_refinement_is_a_cycle() {
    let store = store_with_items(&[("Auth", "authentication refresh flow content")]);
    let original = "how does the authentication refresh flow work in the gateway";
    let refined = "how does the authentication refresh flow works in the gateway";
    let mut oracle = scripted(vec![format!(
        "{{\"need_more\": true, \"query\": \"{refined}\", \"stop\": false}}\n\nAnswer."
    )]);
    let result =
        run_loop(&store, &mut oracle, "", original, &opts(5), &mut TraceSink::Disabled).unwrap();
    assert_eq!(result.stop_reason, LoopAction::QueryCycle);
    assert!(!result.converged);
}

#[test]
fn max_calls_caps_the_loop() {
    let store = store_with_items(&[
        ("A", "alpha topic content"),
        ("B", "beta topic content"),
        ("C", "gamma topic content"),
    ]);
    // Always asks for more with fresh queries and fresh answers.
    let mut oracle = scripted(vec![
        "{\"need_more\": true, \"query\": \"alpha topic\", \"stop\": false}\n\nFirst answer about alpha.",
        "{\"need_more\": true, \"query\": \"beta topic\", \"stop\": false}\n\nSecond entirely different text on beta.",
        "{\"need_more\": true, \"query\": \"gamma topic\", \"stop\": false}\n\nThird unrelated gamma material.",
    ]);

    let result =
        run_loop(&store, &mut oracle, "", "seed question", &opts(3), &mut TraceSink::Disabled)
            .unwrap();
    assert_eq!(result.stop_reason, LoopAction::MaxCalls);
    assert!(!result.converged);
    assert_eq!(result.iterations, 3);
}

#[test]
fn identical_answers_reach_fixed_point() {
    let store = store_with_items(&[
        ("A", "alpha topic content"),
        ("B", "beta topic content"),
        ("C", "gamma topic content"),
        ("D", "delta topic content"),
    ]);
    let same = "The answer is stable and does not change.";
    let mut oracle = scripted(vec![
        format!("{{\"need_more\": true, \"query\": \"alpha topic\", \"stop\": false}}\n\n{same}"),
        format!("{{\"need_more\": true, \"query\": \"beta topic\", \"stop\": false}}\n\n{same}"),
        format!("{{\"need_more\": true, \"query\": \"gamma topic\", \"stop\": false}}\n\n{same}"),
        format!("{{\"need_more\": true, \"query\": \"delta topic\", \"stop\": false}}\n\n{same}"),
    ]);

    let result =
        run_loop(&store, &mut oracle, "", "seed", &opts(10), &mut TraceSink::Disabled).unwrap();
    // Two consecutive stable steps (default) trigger at iteration 3.
    assert_eq!(result.stop_reason, LoopAction::FixedPoint);
    assert!(result.converged);
    assert_eq!(result.iterations, 3);
    assert!(result.traces[2].sim.unwrap() > 0.99);
}

#[test]
fn exhausted_recall_stops_with_no_new_items() {
    let store = store_with_items(&[("A", "alpha topic content")]);
    let mut oracle = scripted(vec![
        "{\"need_more\": true, \"query\": \"alpha topic\", \"stop\": false}\n\nFirst pass answer.",
        "{\"need_more\": true, \"query\": \"more alpha details\", \"stop\": false}\n\nCompletely new second answer.",
    ]);

    let result =
        run_loop(&store, &mut oracle, "", "seed", &opts(5), &mut TraceSink::Disabled).unwrap();
    // Second recall returns the same single item, already seen.
    assert_eq!(result.stop_reason, LoopAction::NoNewItems);
    assert!(!result.converged);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.traces[1].new_items, 0);
}

// ─── Protocols ───────────────────────────────────────────────────────────────

#[test]
fn passive_protocol_stops_immediately() {
    let store = store_with_items(&[]);
    let mut oracle = scripted(vec!["Just prose, no protocol at all."]);
    let mut options = opts(5);
    options.protocol = Protocol::Passive;
    let result =
        run_loop(&store, &mut oracle, "", "q", &options, &mut TraceSink::Disabled).unwrap();
    assert_eq!(result.stop_reason, LoopAction::LlmStop);
    assert_eq!(result.answer, "Just prose, no protocol at all.");
}

#[test]
fn malformed_json_treats_output_as_answer() {
    let store = store_with_items(&[]);
    let mut oracle = scripted(vec!["No JSON here at all.\nSecond line."]);
    let result =
        run_loop(&store, &mut oracle, "", "q", &opts(5), &mut TraceSink::Disabled).unwrap();
    assert_eq!(result.stop_reason, LoopAction::LlmStop);
    assert_eq!(result.answer, "No JSON here at all.\nSecond line.");
}

#[test]
fn strict_mode_propagates_protocol_violations() {
    let store = store_with_items(&[]);
    let mut oracle = scripted(vec!["Not JSON."]);
    let mut options = opts(5);
    options.config.strict = true;
    let err = run_loop(&store, &mut oracle, "", "q", &options, &mut TraceSink::Disabled)
        .unwrap_err();
    assert!(matches!(err, memctl_core::MemctlError::Validation(_)));
}

#[test]
fn oracle_failure_propagates() {
    let store = store_with_items(&[]);
    let mut oracle =
        |_: &str| -> MemctlResult<String> { Err(memctl_core::MemctlError::Oracle("boom".into())) };
    let err =
        run_loop(&store, &mut oracle, "", "q", &opts(5), &mut TraceSink::Disabled).unwrap_err();
    assert!(matches!(err, memctl_core::MemctlError::Oracle(_)));
}

// ─── Prompt assembly ─────────────────────────────────────────────────────────

#[test]
fn json_protocol_prepends_preamble_and_appends_system_prompt() {
    let store = store_with_items(&[]);
    let seen_prompt = std::cell::RefCell::new(String::new());
    let mut oracle = |prompt: &str| -> MemctlResult<String> {
        *seen_prompt.borrow_mut() = prompt.to_string();
        Ok("{\"need_more\": false, \"stop\": true}\n\nok".to_string())
    };
    let mut options = opts(3);
    options.system_prompt = Some("Answer in French.".to_string());

    run_loop(&store, &mut oracle, "ctx block", "the question", &options, &mut TraceSink::Disabled)
        .unwrap();

    let prompt = seen_prompt.borrow();
    let proto = prompt.find("FIRST line").unwrap();
    let sys = prompt.find("Answer in French.").unwrap();
    let ctx = prompt.find("## Context").unwrap();
    let q = prompt.find("## Question").unwrap();
    assert!(proto < sys && sys < ctx && ctx < q);
}

// ─── Recall scoping ──────────────────────────────────────────────────────────

#[test]
fn recall_excludes_non_injectable_items() {
    let store = MemoryStore::open_in_memory().unwrap();
    let mut visible = MemoryItem {
        title: "ok".into(),
        content: "quarantine test content".into(),
        ..Default::default()
    };
    let mut hidden = MemoryItem {
        title: "hidden".into(),
        content: "quarantine test content hidden variant".into(),
        injectable: false,
        ..Default::default()
    };
    store.write_item(&mut visible, "test").unwrap();
    store.write_item(&mut hidden, "test").unwrap();

    let items = recall_items(&store, "quarantine test", 50, None).unwrap();
    assert!(items.iter().any(|i| i.id == visible.id));
    assert!(!items.iter().any(|i| i.id == hidden.id));

    // Direct search still sees it (quarantine hides, not erases).
    let (all, _) = store
        .search_fulltext("quarantine test", &memctl_storage::ItemFilter::default())
        .unwrap();
    assert!(all.iter().any(|i| i.id == hidden.id));
}

#[test]
fn mount_scope_limits_recall_to_corpus_items() {
    let store = MemoryStore::open_in_memory().unwrap();
    let mut inside = MemoryItem {
        title: "inside".into(),
        content: "scoped recall target".into(),
        ..Default::default()
    };
    let mut outside = MemoryItem {
        title: "outside".into(),
        content: "scoped recall other".into(),
        ..Default::default()
    };
    store.write_item(&mut inside, "test").unwrap();
    store.write_item(&mut outside, "test").unwrap();

    let mount_id = store.write_mount("/virtual/mount", None, &[], None).unwrap();
    store
        .write_corpus_hash(&memctl_core::CorpusFile {
            file_path: "/virtual/mount/doc.md".into(),
            sha256: "00".repeat(32),
            chunk_count: 1,
            item_ids: vec![inside.id.clone()],
            ingested_at: String::new(),
            mount_id: Some(mount_id.clone()),
            rel_path: Some("doc.md".into()),
            ext: Some(".md".into()),
            size_bytes: Some(1),
            mtime_epoch: Some(1),
            lang_hint: None,
        })
        .unwrap();

    let items = recall_items(&store, "scoped recall", 50, Some(&mount_id)).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, inside.id);
}

// ─── Trace emission ──────────────────────────────────────────────────────────

#[test]
fn trace_stream_carries_one_json_line_per_iteration() {
    let store = store_with_items(&[("A", "alpha topic content")]);
    let mut oracle = scripted(vec![
        "{\"need_more\": true, \"query\": \"alpha topic\", \"stop\": false}\n\nFirst.",
        "{\"need_more\": false, \"stop\": true}\n\nSecond.",
    ]);

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut sink = TraceSink::Stream(&mut buf);
        run_loop(&store, &mut oracle, "", "seed", &opts(5), &mut sink).unwrap();
    }
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.lines().count(), 2);

    let replayed = memctl_loop::replay_trace(std::io::Cursor::new(text)).unwrap();
    assert_eq!(replayed[0].iter, 1);
    assert_eq!(replayed[0].action, LoopAction::Continue);
    assert_eq!(replayed[1].action, LoopAction::LlmStop);
}
