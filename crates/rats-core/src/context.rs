//! Suite context: configuration, user contexts and the shared test org/space.
//!
//! Built once at suite start and read-only afterwards. `teardown` releases
//! the environment-level fixtures (org, space, user) on the platform.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{info, warn};

use crate::cf::Cf;
use crate::config::SuiteConfig;
use crate::error::HarnessResult;
use crate::fixtures::Fixtures;
use crate::invoker::CommandRunner;
use crate::naming::{prefixed_random_name, random_name};

/// Trace file for `component` inside the artifacts directory.
pub fn trace_file_path(artifacts: &Path, component: &str) -> PathBuf {
    let component: String = component
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    artifacts.join(format!("CATS-TRACE-{component}-{}.txt", std::process::id()))
}

/// Everything a scenario needs to talk to the platform.
pub struct SuiteContext {
    config: Arc<SuiteConfig>,
    admin: Cf,
    regular: Cf,
    org: String,
    space: String,
    user: String,
    created_user: bool,
    // CLI homes live as long as the context.
    _homes: [TempDir; 2],
}

impl std::fmt::Debug for SuiteContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteContext")
            .field("org", &self.org)
            .field("space", &self.space)
            .field("user", &self.user)
            .field("created_user", &self.created_user)
            .finish()
    }
}

impl SuiteContext {
    /// Log in as admin, create a unique org, space and (unless configured)
    /// user, and log that user in targeting the new space.
    ///
    /// If a step fails after the org exists, the org is deleted again before
    /// the error is returned.
    pub async fn setup(
        config: Arc<SuiteConfig>,
        runner: Arc<dyn CommandRunner>,
        component: &str,
    ) -> HarnessResult<Self> {
        config.validate()?;

        let admin_home = tempfile::Builder::new().prefix("rats-admin-").tempdir()?;
        let regular_home = tempfile::Builder::new().prefix("rats-user-").tempdir()?;

        let mut admin = Cf::new(runner.clone(), config.cf_binary.clone()).with_home(admin_home.path());
        let mut regular = Cf::new(runner, config.cf_binary.clone()).with_home(regular_home.path());
        if let Some(artifacts) = &config.artifacts_directory {
            std::fs::create_dir_all(artifacts)?;
            let trace = trace_file_path(artifacts, component);
            info!(trace = %trace.display(), "CLI tracing enabled");
            admin = admin.with_trace_file(&trace);
            regular = regular.with_trace_file(&trace);
        }

        let (user, password, created_user) =
            match (&config.existing_user, &config.existing_user_password) {
                (Some(user), Some(password)) => (user.clone(), password.clone(), false),
                _ => (prefixed_random_name("RATS-USER-"), random_name(), true),
            };

        let ctx = Self {
            org: prefixed_random_name("RATS-ORG-"),
            space: prefixed_random_name("RATS-SPACE-"),
            user,
            created_user,
            config,
            admin,
            regular,
            _homes: [admin_home, regular_home],
        };

        ctx.login(&ctx.admin, &ctx.config.admin_user, &ctx.config.admin_password)
            .await?;
        let timeout = ctx.config.default_timeout();
        ctx.admin.run_ok(&["create-org", &ctx.org], timeout).await?;

        if let Err(err) = ctx.populate_environment(&password).await {
            warn!(org = %ctx.org, error = %err, "suite setup failed, removing test org");
            if let Err(cleanup) = ctx.teardown_environment().await {
                warn!(error = %cleanup, "failed to remove test environment");
            }
            return Err(err);
        }

        info!(org = %ctx.org, space = %ctx.space, user = %ctx.user, "suite environment ready");
        Ok(ctx)
    }

    async fn login(&self, cf: &Cf, user: &str, password: &str) -> HarnessResult<()> {
        let timeout = self.config.default_timeout();
        let mut api = vec!["api", self.config.api.as_str()];
        if self.config.skip_ssl_validation {
            api.push("--skip-ssl-validation");
        }
        cf.run_ok(&api, timeout).await?;
        cf.run_ok(&["auth", user, password], timeout).await?;
        Ok(())
    }

    async fn populate_environment(&self, password: &str) -> HarnessResult<()> {
        let timeout = self.config.default_timeout();
        self.admin
            .run_ok(&["create-space", &self.space, "-o", &self.org], timeout)
            .await?;
        if self.created_user {
            self.admin
                .run_ok(&["create-user", &self.user, password], timeout)
                .await?;
        }
        self.admin
            .run_ok(
                &["set-space-role", &self.user, &self.org, &self.space, "SpaceDeveloper"],
                timeout,
            )
            .await?;

        self.login(&self.regular, &self.user, password).await?;
        self.regular
            .run_ok(&["target", "-o", &self.org, "-s", &self.space], timeout)
            .await?;
        Ok(())
    }

    async fn teardown_environment(&self) -> HarnessResult<()> {
        let timeout = self.config.default_timeout();
        let user_result = if self.created_user {
            self.admin
                .run_ok(&["delete-user", &self.user, "-f"], timeout)
                .await
                .map(|_| ())
        } else {
            Ok(())
        };
        self.admin
            .run_ok(&["delete-org", &self.org, "-f"], timeout)
            .await?;
        user_result
    }

    /// Delete the created user and the test org. Attempts both even if the
    /// first fails.
    pub async fn teardown(self) -> HarnessResult<()> {
        self.teardown_environment().await?;
        info!(org = %self.org, "suite environment removed");
        Ok(())
    }

    pub fn config(&self) -> &Arc<SuiteConfig> {
        &self.config
    }

    /// CLI logged in as the suite's space developer.
    pub fn cf(&self) -> &Cf {
        &self.regular
    }

    /// CLI logged in as the administrator.
    pub fn as_admin(&self) -> &Cf {
        &self.admin
    }

    /// Fixture operations as the space developer.
    pub fn fixtures(&self) -> Fixtures {
        Fixtures::new(self.regular.clone(), self.config.clone())
    }

    /// Fixture operations as the administrator (buildpacks).
    pub fn admin_fixtures(&self) -> Fixtures {
        Fixtures::new(self.admin.clone(), self.config.clone())
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn user(&self) -> &str {
        &self.user
    }
}
