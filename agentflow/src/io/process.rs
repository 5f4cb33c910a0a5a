//! Run the generator command with a timeout and bounded output capture.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// One invocation of an external command.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, OsString)>,
    pub stdin: Vec<u8>,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl ProcessRequest {
    /// Build a request from `command[0]` and its arguments.
    pub fn from_command(command: &[String], stdin: impl Into<Vec<u8>>) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("command must not be empty"))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            env: Vec::new(),
            stdin: stdin.into(),
            timeout: Duration::from_secs(60),
            output_limit_bytes: 1_000_000,
        })
    }
}

/// Captured child process output.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last `max_chars` characters of stderr, for error messages.
    pub fn stderr_tail(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let text = text.trim();
        let skip = text.chars().count().saturating_sub(max_chars);
        text.chars().skip(skip).collect()
    }
}

/// Spawn the command, feed stdin, and wait up to `timeout`.
///
/// Stdin is written and stdout/stderr are drained on their own threads so a
/// large prompt or response cannot deadlock the pipes. Output beyond
/// `output_limit_bytes` is discarded while still draining.
#[instrument(skip_all, fields(program = %request.program, timeout_secs = request.timeout.as_secs()))]
pub fn run_process(request: &ProcessRequest) -> Result<ProcessOutput> {
    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &request.env {
        cmd.env(key, value);
    }

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {}", request.program));
        }
    };

    let mut child_stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let input = request.stdin.clone();
    let stdin_handle = thread::spawn(move || child_stdin.write_all(&input));
    let limit = request.output_limit_bytes;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

    let mut timed_out = false;
    let status = match child.wait_timeout(request.timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    match stdin_handle.join() {
        Ok(Ok(())) => {}
        // The child may exit without reading all of its input.
        Ok(Err(e)) => debug!(err = %e, "stdin not fully consumed"),
        Err(_) => return Err(anyhow!("stdin writer thread panicked")),
    }
    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, _) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 {
        warn!(stdout_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        let keep = n.min(remaining);
        buf.extend_from_slice(&chunk[..keep]);
        truncated += n - keep;
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, stdin: &str) -> ProcessRequest {
        let command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        ProcessRequest::from_command(&command, stdin).expect("request")
    }

    #[test]
    fn echoes_stdin() {
        let output = run_process(&sh("cat", "hello")).expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout_text(), "hello");
        assert!(!output.timed_out);
    }

    #[test]
    fn passes_environment() {
        let mut request = sh("printf '%s' \"$AGENTFLOW_TEST_VALUE\"", "");
        request
            .env
            .push(("AGENTFLOW_TEST_VALUE".to_string(), "x=1".into()));
        assert_eq!(run_process(&request).expect("run").stdout_text(), "x=1");
    }

    #[test]
    fn truncates_stdout() {
        let mut request = sh("printf 'abcdefghij'", "");
        request.output_limit_bytes = 4;
        let output = run_process(&request).expect("run");
        assert_eq!(output.stdout, b"abcd");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn kills_on_timeout() {
        let mut request = sh("sleep 5", "");
        request.timeout = Duration::from_millis(100);
        let output = run_process(&request).expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let output = run_process(&sh("echo 'first line' >&2; echo 'last' >&2; exit 3", ""))
            .expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stderr_tail(4), "last");
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(ProcessRequest::from_command(&[], "").is_err());
    }
}
