//! Command invocation with a hard timeout.

use std::collections::BTreeMap;
use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

/// A single external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name or path.
    pub program: String,

    /// Ordered arguments.
    pub args: Vec<String>,

    /// Extra environment variables for the child.
    pub env: BTreeMap<String, String>,

    /// Hard limit on how long to wait for the child to exit.
    pub timeout: Duration,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: BTreeMap::new(),
            timeout,
        }
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// First argument, e.g. `push` or `curl`.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Command line as it would be typed, for failure reports.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) || arg.contains('"') {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Captured outcome of an invocation that exited in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    /// Command line that produced this result.
    pub command: String,

    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl InvocationResult {
    /// Whether the command exited 0.
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Convert a nonzero exit into [`HarnessError::InvocationFailure`].
    pub fn expect_success(self) -> HarnessResult<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(HarnessError::InvocationFailure {
                command: self.command,
                exit_code: self.exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            })
        }
    }

    /// Require each fragment to appear in stdout after the previous one.
    pub fn expect_output_in_order(&self, expected: &[&str]) -> HarnessResult<()> {
        let mut rest = self.stdout.as_str();
        for fragment in expected {
            match rest.find(fragment) {
                Some(pos) => rest = &rest[pos + fragment.len()..],
                None => {
                    return Err(HarnessError::UnexpectedOutput {
                        command: self.command.clone(),
                        expected: expected.join(" .. "),
                        stdout: self.stdout.clone(),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Executes invocations. The seam between orchestration and the real CLI.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion or fail with [`HarnessError::InvocationTimeout`].
    ///
    /// A nonzero exit is not an error at this layer; see
    /// [`InvocationResult::expect_success`].
    async fn run(&self, invocation: &Invocation) -> HarnessResult<InvocationResult>;
}

/// Runs invocations as local child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> HarnessResult<InvocationResult> {
        let start = Instant::now();
        let command = invocation.command_line();

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Dropping the wait future on timeout kills the child; the remote
        // operation it started is not retracted.
        let output = tokio::time::timeout(invocation.timeout, child.wait_with_output())
            .await
            .map_err(|_| HarnessError::InvocationTimeout {
                command: command.clone(),
                timeout: invocation.timeout,
            })??;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        debug!(command = %command, exit_code, duration_ms, "command exited");

        Ok(InvocationResult {
            command,
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
        })
    }
}
