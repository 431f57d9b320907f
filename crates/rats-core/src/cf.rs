//! Platform CLI client bound to one user context.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::HarnessResult;
use crate::invoker::{CommandRunner, Invocation, InvocationResult};

/// Environment variable selecting the CLI's config/home directory.
pub const CF_HOME_ENV: &str = "CF_HOME";

/// Environment variable enabling CLI request tracing to a file.
pub const CF_TRACE_ENV: &str = "CF_TRACE";

/// The platform CLI as seen by one user.
///
/// Cloning is cheap; clones share the runner.
#[derive(Clone)]
pub struct Cf {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    home: Option<PathBuf>,
    trace_file: Option<PathBuf>,
}

impl std::fmt::Debug for Cf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cf")
            .field("binary", &self.binary)
            .field("home", &self.home)
            .field("trace_file", &self.trace_file)
            .finish()
    }
}

impl Cf {
    pub fn new(runner: Arc<dyn CommandRunner>, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
            home: None,
            trace_file: None,
        }
    }

    /// Isolate this client's login state in `home`.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Write CLI request traces to `path`.
    pub fn with_trace_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_file = Some(path.into());
        self
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Build the invocation for `cf <args>` in this user context.
    pub fn invocation(&self, args: &[&str], timeout: Duration) -> Invocation {
        let mut invocation = Invocation::new(self.binary.clone(), args.iter().copied(), timeout);
        if let Some(home) = &self.home {
            invocation = invocation.env(CF_HOME_ENV, home.to_string_lossy());
        }
        if let Some(trace) = &self.trace_file {
            invocation = invocation.env(CF_TRACE_ENV, trace.to_string_lossy());
        }
        invocation
    }

    /// Run `cf <args>`; a nonzero exit is returned, not raised.
    pub async fn run(&self, args: &[&str], timeout: Duration) -> HarnessResult<InvocationResult> {
        let invocation = self.invocation(args, timeout);
        info!(command = %invocation, "cf");
        self.runner.run(&invocation).await
    }

    /// Run `cf <args>` and fail on a nonzero exit.
    pub async fn run_ok(&self, args: &[&str], timeout: Duration) -> HarnessResult<InvocationResult> {
        self.run(args, timeout).await?.expect_success()
    }
}
