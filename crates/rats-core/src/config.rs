//! Suite configuration.
//!
//! Loaded once before any scenario runs and shared read-only as
//! `Arc<SuiteConfig>` by every other component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::poller::PollPolicy;

/// Per-call timeout used when the config leaves `default_timeout` at 0.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Push/start timeout used when the config leaves `cf_push_timeout` at 0.
pub const CF_PUSH_TIMEOUT: Duration = Duration::from_secs(120);

/// Memory limit passed to every push.
pub const DEFAULT_MEMORY_LIMIT: &str = "256M";

/// Runtime backend an app is pinned to before it is started.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Diego,
    Dea,
    /// Leave the platform's default in place.
    #[default]
    #[serde(rename = "")]
    Default,
}

impl Backend {
    /// Value of the `diego` flag to send, or `None` to skip the update.
    pub fn diego_flag(&self) -> Option<bool> {
        match self {
            Backend::Diego => Some(true),
            Backend::Dea => Some(false),
            Backend::Default => None,
        }
    }
}

/// Tuning for the convergence poller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PollSettings {
    /// Fixed sleep between samples.
    pub interval_secs: u64,
    /// Deadline = `default_timeout * deadline_multiplier`.
    pub deadline_multiplier: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            deadline_multiplier: 2,
        }
    }
}

/// Process-wide suite configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SuiteConfig {
    /// Platform API endpoint, e.g. `api.example.com`.
    pub api: String,
    /// Domain every pushed app gets its route on.
    pub apps_domain: String,
    pub admin_user: String,
    pub admin_password: String,
    pub skip_ssl_validation: bool,
    /// Per-call timeout in seconds (0 = [`DEFAULT_TIMEOUT`]).
    pub default_timeout: u64,
    /// Push/start timeout in seconds (0 = [`CF_PUSH_TIMEOUT`]).
    pub cf_push_timeout: u64,
    /// When set, CLI traces are written here.
    pub artifacts_directory: Option<PathBuf>,
    pub backend: Backend,
    /// Name or path of the platform CLI.
    pub cf_binary: String,
    /// Run as this user instead of creating one per suite.
    pub existing_user: Option<String>,
    pub existing_user_password: Option<String>,
    pub poll: PollSettings,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            api: String::new(),
            apps_domain: String::new(),
            admin_user: String::new(),
            admin_password: String::new(),
            skip_ssl_validation: false,
            default_timeout: 0,
            cf_push_timeout: 0,
            artifacts_directory: None,
            backend: Backend::Default,
            cf_binary: "cf".to_string(),
            existing_user: None,
            existing_user_password: None,
            poll: PollSettings::default(),
        }
    }
}

impl SuiteConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
            .map_err(|e| HarnessError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(raw: &str) -> HarnessResult<Self> {
        let config: SuiteConfig =
            serde_json::from_str(raw).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that cannot drive a platform.
    pub fn validate(&self) -> HarnessResult<()> {
        let required = [
            ("api", &self.api),
            ("apps_domain", &self.apps_domain),
            ("admin_user", &self.admin_user),
            ("admin_password", &self.admin_password),
            ("cf_binary", &self.cf_binary),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(HarnessError::Config(format!("`{field}` is required")));
            }
        }
        if self.existing_user.is_some() != self.existing_user_password.is_some() {
            return Err(HarnessError::Config(
                "`existing_user` and `existing_user_password` must be set together".to_string(),
            ));
        }
        if self.poll.interval_secs == 0 || self.poll.deadline_multiplier == 0 {
            return Err(HarnessError::Config(
                "poll interval and deadline multiplier must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Timeout for ordinary CLI calls.
    pub fn default_timeout(&self) -> Duration {
        match self.default_timeout {
            0 => DEFAULT_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    /// Timeout for push, start and restart.
    pub fn cf_push_timeout(&self) -> Duration {
        match self.cf_push_timeout {
            0 => CF_PUSH_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    /// Polling policy derived from the base timeout.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from_base(
            self.default_timeout(),
            self.poll.deadline_multiplier,
            Duration::from_secs(self.poll.interval_secs),
        )
    }
}
