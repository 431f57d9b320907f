//! Records for the fixtures the harness creates on the platform.

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::invoker::InvocationResult;

/// An app pushed by the fixture orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppRecord {
    /// Caller-supplied name, unique within the run.
    pub name: String,

    /// Platform-assigned guid, once looked up.
    pub guid: Option<String>,

    /// Guids of routes bound through the orchestrator.
    pub routes: Vec<String>,

    /// Requested instance count.
    pub instances: u32,
}

impl AppRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: None,
            routes: Vec::new(),
            instances: 1,
        }
    }
}

/// A route created through the REST passthrough. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteRecord {
    pub host: String,
    pub path: String,
    pub domain_guid: String,
    pub space_guid: String,
    pub guid: String,
}

/// An admin buildpack. Must outlive every app that references it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildpackRecord {
    pub name: String,
    pub archive: PathBuf,
    pub position: u32,
}

/// Network location of one running instance, fetched transiently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsSample {
    pub index: u32,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for StatsSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Running/requested instances as reported by `cf app`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceCount {
    pub running: u32,
    pub requested: u32,
}

impl InstanceCount {
    /// Parse the `instances: R/N` line out of `cf app` output.
    pub fn parse(app_output: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"instances:\s*(\d+)/(\d+)").expect("instance count pattern is valid")
        });
        let caps = pattern.captures(app_output)?;
        Some(Self {
            running: caps[1].parse().ok()?,
            requested: caps[2].parse().ok()?,
        })
    }

    /// All `n` requested instances are running.
    pub fn is_converged_to(&self, n: u32) -> bool {
        self.running == n && self.requested == n
    }
}

impl fmt::Display for InstanceCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instances: {}/{}", self.running, self.requested)
    }
}

/// One `cf app` sample: the raw invocation next to the parsed count.
///
/// Displays the command, exit code and both streams so a convergence
/// failure can be diagnosed from its message alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSample {
    pub result: InvocationResult,
    pub count: Option<InstanceCount>,
}

impl InstanceSample {
    pub fn new(result: InvocationResult) -> Self {
        let count = InstanceCount::parse(&result.stdout);
        Self { result, count }
    }

    pub fn is_converged_to(&self, n: u32) -> bool {
        self.count.is_some_and(|count| count.is_converged_to(n))
    }
}

impl fmt::Display for InstanceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.count {
            Some(count) => write!(f, "{count}")?,
            None => f.write_str("no instance count")?,
        }
        write!(
            f,
            " from `{}` (exit {})\n--- stdout ---\n{}\n--- stderr ---\n{}",
            self.result.command, self.result.exit_code, self.result.stdout, self.result.stderr
        )
    }
}
