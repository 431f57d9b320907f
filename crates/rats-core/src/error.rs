//! Error types for the acceptance harness.
//!
//! Every variant is fatal for the scenario that produced it. Nothing in this
//! crate catches and suppresses an error locally; retries belong to the
//! convergence poller alone.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while driving the platform under test.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The external command did not exit within its allotted timeout.
    #[error("`{command}` did not exit within {timeout:?}")]
    InvocationTimeout { command: String, timeout: Duration },

    /// The external command exited nonzero.
    #[error("`{command}` exited with code {exit_code}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    InvocationFailure {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// The external command could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command output does not parse into the expected schema.
    #[error("response of `{command}` does not match the expected {schema} shape: {source}\n--- body ---\n{body}")]
    Decode {
        command: String,
        schema: &'static str,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// A request body could not be serialized.
    #[error("failed to encode {schema} request body: {source}")]
    Encode {
        schema: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// An indexed lookup into a decoded list found nothing.
    #[error("`{command}` returned no {what}")]
    EmptyResult { command: String, what: String },

    /// A polled predicate never held within the deadline.
    #[error("timed out after {deadline:?} ({attempts} attempt(s)) waiting for {description}; last observed: {last_observed}")]
    ConvergenceTimeout {
        description: String,
        deadline: Duration,
        attempts: u32,
        last_observed: String,
    },

    /// The command succeeded but its output is missing expected lines.
    #[error("`{command}` output is missing {expected:?} (in order)\n--- stdout ---\n{stdout}")]
    UnexpectedOutput {
        command: String,
        expected: String,
        stdout: String,
    },

    /// Invalid or incomplete suite configuration.
    #[error("invalid suite configuration: {0}")]
    Config(String),

    /// Local filesystem error (config file, CLI home directories).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
