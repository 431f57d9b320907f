//! Scoped teardown for scenario fixtures.

use tracing::{info, warn};

use crate::context::SuiteContext;
use crate::error::HarnessResult;

/// One registered teardown action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupStep {
    /// `delete <app> -f -r` as the space developer.
    DeleteApp(String),
    /// `delete-buildpack <name> -f` as the administrator.
    DeleteBuildpack(String),
}

/// Teardown actions, run last-registered-first.
///
/// Register a buildpack before the apps that use it so the apps are deleted
/// first.
#[derive(Debug, Default)]
pub struct Cleanup {
    steps: Vec<CleanupStep>,
}

impl Cleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete_app(&mut self, name: impl Into<String>) {
        self.steps.push(CleanupStep::DeleteApp(name.into()));
    }

    pub fn delete_buildpack(&mut self, name: impl Into<String>) {
        self.steps.push(CleanupStep::DeleteBuildpack(name.into()));
    }

    /// Steps in execution order.
    pub fn pending(&self) -> impl Iterator<Item = &CleanupStep> {
        self.steps.iter().rev()
    }

    /// Run every step; report the first failure after attempting all.
    pub async fn run(self, ctx: &SuiteContext) -> HarnessResult<()> {
        let fixtures = ctx.fixtures();
        let admin = ctx.admin_fixtures();
        let mut first_err = None;

        for step in self.steps.into_iter().rev() {
            let result = match &step {
                CleanupStep::DeleteApp(name) => fixtures.delete_app(name).await,
                CleanupStep::DeleteBuildpack(name) => admin.delete_buildpack(name).await,
            };
            match result {
                Ok(()) => info!(?step, "cleaned up"),
                Err(err) => {
                    warn!(?step, error = %err, "cleanup step failed");
                    first_err.get_or_insert(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Combine a scenario body's result with its cleanup's; the body's error wins.
pub fn settle<T>(body: HarnessResult<T>, cleanup: HarnessResult<()>) -> HarnessResult<T> {
    let value = body?;
    cleanup?;
    Ok(value)
}
