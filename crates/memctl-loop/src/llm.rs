//! Oracle subprocess invocation.
//!
//! The oracle is launched from a shell-command template (argv split,
//! no shell), fed the prompt on stdin or via a temp file, and bounded
//! by a timeout. Failures carry a stable taxonomy: command not found,
//! non-zero exit, timeout, I/O error.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use memctl_core::{MemctlError, MemctlResult};

use crate::protocol::{Protocol, PROTOCOL_SYSTEM_PROMPT};

/// How the prompt reaches the oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmMode {
    /// Pipe the prompt to stdin.
    #[default]
    Stdin,
    /// Write the prompt to a temp file and append its path to argv.
    File,
}

impl LlmMode {
    pub fn parse(s: &str) -> MemctlResult<Self> {
        match s {
            "stdin" => Ok(LlmMode::Stdin),
            "file" => Ok(LlmMode::File),
            other => Err(MemctlError::Validation(format!(
                "unknown llm mode: {other:?} (expected stdin|file)"
            ))),
        }
    }
}

/// The opaque answer-producer the loop drives. The subprocess
/// implementation is the production path; tests substitute closures.
pub trait Oracle {
    fn invoke(&mut self, prompt: &str) -> MemctlResult<String>;
}

impl<F> Oracle for F
where
    F: FnMut(&str) -> MemctlResult<String>,
{
    fn invoke(&mut self, prompt: &str) -> MemctlResult<String> {
        self(prompt)
    }
}

/// Subprocess-backed oracle.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    pub cmd: String,
    pub mode: LlmMode,
    pub timeout: Duration,
}

impl CommandOracle {
    pub fn new(cmd: &str, mode: LlmMode, timeout_secs: u64) -> Self {
        Self { cmd: cmd.to_string(), mode, timeout: Duration::from_secs(timeout_secs) }
    }
}

impl Oracle for CommandOracle {
    fn invoke(&mut self, prompt: &str) -> MemctlResult<String> {
        invoke_llm(&self.cmd, prompt, self.mode, self.timeout)
    }
}

/// Invoke an LLM command as a bounded subprocess and return its
/// stdout.
pub fn invoke_llm(
    cmd: &str,
    prompt: &str,
    mode: LlmMode,
    timeout: Duration,
) -> MemctlResult<String> {
    let mut args = shell_words::split(cmd)
        .map_err(|e| MemctlError::Validation(format!("unparsable LLM command {cmd:?}: {e}")))?;
    if args.is_empty() {
        return Err(MemctlError::Validation("empty LLM command".to_string()));
    }

    // File mode: the temp file must outlive the child.
    let mut _prompt_file: Option<tempfile::NamedTempFile> = None;
    if mode == LlmMode::File {
        let mut file = tempfile::Builder::new()
            .prefix("memctl_prompt_")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(prompt.as_bytes())?;
        file.flush()?;
        args.push(file.path().to_string_lossy().to_string());
        _prompt_file = Some(file);
    }

    let program = args.remove(0);
    let mut child = Command::new(&program)
        .args(&args)
        .stdin(if mode == LlmMode::Stdin { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                MemctlError::Oracle(format!("LLM command not found: {program:?}"))
            }
            _ => MemctlError::Oracle(format!("LLM spawn failed: {e}")),
        })?;

    // Feed stdin from a thread so a child that emits before reading
    // cannot deadlock against a full pipe.
    let stdin_thread = child.stdin.take().map(|mut stdin| {
        let prompt = prompt.to_string();
        std::thread::spawn(move || {
            let _ = stdin.write_all(prompt.as_bytes());
        })
    });
    let stdout_thread = child.stdout.take().map(reader_thread);
    let stderr_thread = child.stderr.take().map(reader_thread);

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MemctlError::Oracle(format!(
                "LLM command timed out after {}s: {cmd}",
                timeout.as_secs()
            )));
        }
        Err(e) => return Err(MemctlError::Oracle(format!("LLM wait failed: {e}"))),
    };

    if let Some(t) = stdin_thread {
        let _ = t.join();
    }
    let stdout = stdout_thread.map(join_reader).unwrap_or_default();
    let stderr = stderr_thread.map(join_reader).unwrap_or_default();

    if !status.success() {
        let preview: String = stderr.trim().chars().take(200).collect();
        return Err(MemctlError::Oracle(format!(
            "LLM command failed (exit {}): {preview}",
            status.code().unwrap_or(-1)
        )));
    }

    Ok(stdout)
}

fn reader_thread<R: Read + Send + 'static>(mut reader: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn join_reader(handle: std::thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Assemble the full prompt: protocol preamble (json mode only), the
/// caller's system prompt, the accumulated context, and the question.
pub fn build_prompt(
    context: &str,
    query: &str,
    system_prompt: Option<&str>,
    protocol: Protocol,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if protocol == Protocol::Json {
        parts.push(PROTOCOL_SYSTEM_PROMPT.to_string());
        parts.push(String::new());
    }
    if let Some(sp) = system_prompt {
        parts.push(sp.to_string());
        parts.push(String::new());
    }
    if !context.trim().is_empty() {
        parts.push("## Context".to_string());
        parts.push(context.trim().to_string());
        parts.push(String::new());
    }
    parts.push("## Question".to_string());
    parts.push(query.to_string());
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_orders_protocol_system_context_question() {
        let p = build_prompt("ctx", "q?", Some("be terse"), Protocol::Json);
        let proto_pos = p.find("FIRST line").unwrap();
        let sys_pos = p.find("be terse").unwrap();
        let ctx_pos = p.find("## Context").unwrap();
        let q_pos = p.find("## Question").unwrap();
        assert!(proto_pos < sys_pos && sys_pos < ctx_pos && ctx_pos < q_pos);
    }

    #[test]
    fn passive_prompt_has_no_protocol_preamble() {
        let p = build_prompt("", "q?", None, Protocol::Passive);
        assert!(!p.contains("FIRST line"));
        assert!(p.starts_with("## Question"));
    }

    #[test]
    fn empty_context_is_omitted() {
        let p = build_prompt("   ", "q?", None, Protocol::Json);
        assert!(!p.contains("## Context"));
    }

    #[test]
    fn missing_command_is_an_oracle_error() {
        let err = invoke_llm(
            "definitely-not-a-real-binary-4242",
            "hi",
            LlmMode::Stdin,
            Duration::from_secs(5),
        )
        .unwrap_err();
        assert!(matches!(err, MemctlError::Oracle(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn stdin_mode_pipes_prompt_through() {
        let out = invoke_llm("cat", "hello oracle", LlmMode::Stdin, Duration::from_secs(10)).unwrap();
        assert_eq!(out, "hello oracle");
    }

    #[cfg(unix)]
    #[test]
    fn file_mode_passes_a_path() {
        let out = invoke_llm("cat", "file payload", LlmMode::File, Duration::from_secs(10)).unwrap();
        assert_eq!(out, "file payload");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_an_oracle_error() {
        let err = invoke_llm("false", "x", LlmMode::Stdin, Duration::from_secs(10)).unwrap_err();
        assert!(err.to_string().contains("exit"));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_child() {
        let err =
            invoke_llm("sleep 30", "x", LlmMode::Stdin, Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
