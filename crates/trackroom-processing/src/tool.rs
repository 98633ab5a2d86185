//! External tool execution
//!
//! `ToolRunner` is the one capability the pipeline needs from the operating system:
//! run a program with arguments under a wall-clock limit and get its captured output
//! back, or a typed failure carrying the exit code and a stderr excerpt.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Maximum number of stderr bytes kept in error messages.
const STDERR_EXCERPT_BYTES: usize = 1024;

/// A single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name without directories, for log fields and error messages.
    pub fn tool_name(&self) -> &str {
        self.program
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.program)
    }

    pub fn has_arg(&self, value: &str) -> bool {
        self.args.iter().any(|a| a == value)
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("failed to start {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with status {}: {stderr_excerpt}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr_excerpt: String,
    },

    #[error("{program} timed out after {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;
}

/// Keep the tail of stderr, where ffmpeg prints the actual failure.
pub fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_EXCERPT_BYTES {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - STDERR_EXCERPT_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

/// Runs tools as child processes. The child is killed if the time limit elapses.
#[derive(Debug, Clone, Default)]
pub struct ProcessToolRunner;

impl ProcessToolRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let program = invocation.tool_name().to_string();
        let start = std::time::Instant::now();

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Spawn {
                program: program.clone(),
                message: e.to_string(),
            })?;

        let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::Spawn {
                    program,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                tracing::warn!(
                    tool = %program,
                    timeout_secs = invocation.timeout.as_secs(),
                    "Tool timed out, killing process"
                );
                return Err(ToolError::Timeout {
                    program,
                    timeout: invocation.timeout,
                });
            }
        };

        tracing::debug!(
            tool = %program,
            status = ?output.status.code(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Tool finished"
        );

        if !output.status.success() {
            return Err(ToolError::Exit {
                program,
                code: output.status.code(),
                stderr_excerpt: stderr_excerpt(&output.stderr),
            });
        }

        Ok(ToolOutput {
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = ToolInvocation::new("/usr/bin/ffmpeg", Duration::from_secs(5))
            .arg("-y")
            .args(["-i", "in.wav"]);
        assert_eq!(inv.tool_name(), "ffmpeg");
        assert_eq!(inv.args, vec!["-y", "-i", "in.wav"]);
        assert!(inv.has_arg("-i"));
        assert!(!inv.has_arg("-t"));
    }

    #[test]
    fn test_stderr_excerpt_keeps_tail() {
        let long = format!("{}Invalid data found", "x".repeat(5000));
        let excerpt = stderr_excerpt(long.as_bytes());
        assert!(excerpt.starts_with("..."));
        assert!(excerpt.ends_with("Invalid data found"));
        assert!(excerpt.len() <= STDERR_EXCERPT_BYTES + 3);
        assert_eq!(stderr_excerpt(b"  short  \n"), "short");
    }

    #[test]
    fn test_error_messages() {
        let exit = ToolError::Exit {
            program: "ffmpeg".into(),
            code: Some(1),
            stderr_excerpt: "Invalid data found".into(),
        };
        assert_eq!(exit.to_string(), "ffmpeg exited with status 1: Invalid data found");
        let timeout = ToolError::Timeout {
            program: "ffprobe".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(timeout.to_string(), "ffprobe timed out after 30s");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = ProcessToolRunner::new();
        let inv = ToolInvocation::new("trackroom-no-such-tool", Duration::from_secs(1));
        let result = runner.run(&inv).await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let runner = ProcessToolRunner::new();
        let inv = ToolInvocation::new("sh", Duration::from_secs(5))
            .args(["-c", "echo boom >&2; exit 3"]);
        match runner.run(&inv).await {
            Err(ToolError::Exit {
                code,
                stderr_excerpt,
                ..
            }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr_excerpt, "boom");
            }
            other => panic!("Expected exit error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_reported() {
        let runner = ProcessToolRunner::new();
        let inv = ToolInvocation::new("sleep", Duration::from_millis(100)).arg("5");
        let result = runner.run(&inv).await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_captured() {
        let runner = ProcessToolRunner::new();
        let inv = ToolInvocation::new("sh", Duration::from_secs(5)).args(["-c", "printf abc"]);
        let output = runner.run(&inv).await.unwrap();
        assert_eq!(output.stdout, b"abc".to_vec());
    }
}
