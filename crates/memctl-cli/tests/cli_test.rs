//! End-to-end CLI contract: exit codes, stdout purity, env
//! precedence, pipe composition.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn memctl(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("memctl").unwrap();
    cmd.env_remove("MEMCTL_DB")
        .env_remove("MEMCTL_BUDGET")
        .env_remove("MEMCTL_FTS")
        .env_remove("MEMCTL_TIER")
        .env_remove("MEMCTL_SESSION")
        .env("MEMCTL_DB", dir.path().join("memory.db"))
        .current_dir(dir.path());
    cmd
}

#[test]
fn init_scaffolds_and_exits_zero() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir).args(["init", "mem"]).assert().success();
    assert!(dir.path().join("mem/.gitignore").exists());
}

#[test]
fn push_stdin_then_search_finds_it() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .args(["push", "--stdin"])
        .write_stdin("The deployment pipeline uses blue-green rollouts.\n")
        .assert()
        .success();

    memctl(&dir)
        .args(["search", "deployment rollouts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("MEM-"));
}

#[test]
fn push_query_emits_injection_block_on_stdout() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join("note.md"), "# Rollouts\n\nBlue-green deployment notes.\n").unwrap();

    memctl(&dir)
        .args(["push", "deployment", "--source", "note.md"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## Memory (Injected)"))
        .stdout(predicate::str::contains("format_version: 1"));
}

#[test]
fn push_without_input_is_operational_error() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir).arg("push").assert().code(1);
}

#[test]
fn pull_stores_clean_content_and_prints_id() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .args(["pull", "--title", "fact"])
        .write_stdin("The cache expires after one hour.")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("MEM-"));
}

#[test]
fn pull_rejects_secrets_with_exit_one() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .args(["pull", "--title", "creds"])
        .write_stdin("password = hunter2secret42")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn show_missing_item_exits_one() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir).args(["show", "MEM-nope"]).assert().code(1);
}

#[test]
fn bad_tier_argument_exits_one() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir).args(["search", "x", "--tier", "eternal"]).assert().code(1);
}

#[test]
fn export_stdout_is_pure_jsonl() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .args(["pull", "--title", "a"])
        .write_stdin("first memory body")
        .assert()
        .success();

    let output = memctl(&dir).arg("export").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for line in stdout.lines() {
        serde_json::from_str::<serde_json::Value>(line).expect("export must be pure JSONL");
    }
}

#[test]
fn export_then_import_round_trips() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .args(["pull", "--title", "a"])
        .write_stdin("round trip payload")
        .assert()
        .success();

    let exported = memctl(&dir).arg("export").output().unwrap().stdout;

    let dir2 = tempfile::TempDir::new().unwrap();
    memctl(&dir2)
        .args(["import", "--json"])
        .write_stdin(exported)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported\":1"));
}

#[test]
fn sync_and_inspect_compose() {
    let dir = tempfile::TempDir::new().unwrap();
    let corpus = dir.path().join("docs");
    fs::create_dir(&corpus).unwrap();
    fs::write(corpus.join("auth.md"), "# Auth\n\nJWT and OAuth2 notes.\n").unwrap();
    fs::write(corpus.join("api.md"), "# API\n\nEndpoint list.\n").unwrap();

    memctl(&dir).args(["sync", "docs"]).assert().success();
    memctl(&dir)
        .args(["inspect", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## Structure (Injected)"))
        .stdout(predicate::str::contains("Total files: 2"));

    // Idempotent second sync still exits zero.
    memctl(&dir).args(["sync", "docs"]).assert().success();
}

#[test]
fn mount_lifecycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let corpus = dir.path().join("docs");
    fs::create_dir(&corpus).unwrap();

    let out = memctl(&dir)
        .args(["mount", "add", "docs", "--name", "docs"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let mount_id = String::from_utf8(out.stdout).unwrap().trim().to_string();
    assert!(mount_id.starts_with("MNT-"));

    memctl(&dir)
        .args(["mount", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&mount_id));

    memctl(&dir).args(["mount", "remove", "docs"]).assert().success();
    memctl(&dir).args(["mount", "remove", "docs"]).assert().code(1);
}

#[cfg(unix)]
#[test]
fn loop_passive_echo_oracle_round_trips() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .args(["loop", "what is deployed", "--llm", "cat", "--protocol", "passive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## Question"));
}

#[test]
fn reset_clears_and_reports() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .args(["pull", "--title", "a"])
        .write_stdin("to be reset")
        .assert()
        .success();

    memctl(&dir)
        .args(["reset", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"items\":1"));

    memctl(&dir)
        .args(["stats", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_items\": 0"));
}

#[test]
fn reindex_reports_count() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .args(["pull", "--title", "a"])
        .write_stdin("something to index")
        .assert()
        .success();
    memctl(&dir).args(["reindex", "--tokenizer", "en"]).assert().success();
}

#[test]
fn env_budget_fallback_tolerates_garbage() {
    let dir = tempfile::TempDir::new().unwrap();
    memctl(&dir)
        .env("MEMCTL_BUDGET", "not-a-number")
        .args(["stats"])
        .assert()
        .success();
}
