//! Acceptance scenarios composed from fixture operations.
//!
//! Each scenario registers its own teardown and always runs it, whether the
//! body passed or not.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::cleanup::{settle, Cleanup};
use crate::context::SuiteContext;
use crate::error::{HarnessError, HarnessResult};
use crate::naming::{prefixed_random_name, random_name, APP_PREFIX};

/// Summary of a passed scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub app: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub details: serde_json::Value,
}

struct Clock {
    started_at: DateTime<Utc>,
    start: Instant,
}

impl Clock {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    fn finish(self, scenario: &str, app: String, details: serde_json::Value) -> ScenarioOutcome {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        info!(scenario, app = %app, duration_ms, "scenario passed");
        ScenarioOutcome {
            scenario: scenario.to_string(),
            app,
            started_at: self.started_at,
            duration_ms,
            details,
        }
    }
}

/// Push without starting, scale, then start and wait for `instances: N/N`.
///
/// The pre-start sample is recorded as observed; nothing is asserted on it.
pub async fn scale_before_start(
    ctx: &SuiteContext,
    asset: &Path,
    buildpack: &str,
    instances: u32,
) -> HarnessResult<ScenarioOutcome> {
    let clock = Clock::start();
    let app = prefixed_random_name(APP_PREFIX);
    let mut cleanup = Cleanup::new();

    let body = async {
        let fixtures = ctx.fixtures();
        cleanup.delete_app(&app);
        let mut record = fixtures
            .push_named_app_no_start(&app, asset, buildpack)
            .await?;
        fixtures.scale(&mut record, instances).await?;
        let before_start = fixtures.app_instances(&app).await?;
        fixtures.start_app(&app).await?;
        let converged = fixtures.wait_for_instances(&app, instances).await?;
        Ok::<_, HarnessError>(json!({
            "instances": record.instances,
            "before_start": before_start.map(|c| c.to_string()),
            "converged": converged.value.count.map(|c| c.to_string()),
            "attempts": converged.attempts,
        }))
    }
    .await;

    let details = settle(body, cleanup.run(ctx).await)?;
    Ok(clock.finish("scale_before_start", app, details))
}

/// Push and start an app, map an extra `host`/`path` route to it, and
/// resolve the network location of its first instance.
pub async fn route_mapping(
    ctx: &SuiteContext,
    asset: &Path,
    buildpack: &str,
    host: &str,
    path: &str,
) -> HarnessResult<ScenarioOutcome> {
    let clock = Clock::start();
    let app = prefixed_random_name(APP_PREFIX);
    let mut cleanup = Cleanup::new();

    let body = async {
        let fixtures = ctx.fixtures();
        cleanup.delete_app(&app);
        let mut record = fixtures
            .push_named_app_no_start(&app, asset, buildpack)
            .await?;
        fixtures.start_app(&app).await?;
        let route = fixtures.map_route(&mut record, host, path).await?;
        let location = fixtures.app_instance_location(&app).await?;
        Ok::<_, HarnessError>(json!({
            "route_guid": route.guid,
            "host": route.host,
            "path": route.path,
            "instance": location.to_string(),
            "app_record": record,
        }))
    }
    .await;

    let details = settle(body, cleanup.run(ctx).await)?;
    Ok(clock.finish("route_mapping", app, details))
}

/// Upload an admin buildpack, push an app staged with it, and require the
/// staging output to contain `expected` in order.
pub async fn buildpack_staging_environment(
    ctx: &SuiteContext,
    app_dir: &Path,
    buildpack_archive: &Path,
    expected: &[String],
) -> HarnessResult<ScenarioOutcome> {
    let clock = Clock::start();
    let app = prefixed_random_name(APP_PREFIX);
    let buildpack = random_name();
    let mut cleanup = Cleanup::new();

    let body = async {
        let admin = ctx.admin_fixtures();
        let fixtures = ctx.fixtures();

        // The buildpack can exist even when its output check fails.
        cleanup.delete_buildpack(&buildpack);
        admin.create_buildpack(&buildpack, buildpack_archive, 0).await?;

        cleanup.delete_app(&app);
        fixtures
            .push_named_app_no_start(&app, app_dir, &buildpack)
            .await?;
        let start = fixtures.start_app(&app).await?;
        let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
        start.expect_output_in_order(&expected)?;
        Ok::<_, HarnessError>(json!({
            "buildpack": buildpack,
            "matched": expected,
        }))
    }
    .await;

    let details = settle(body, cleanup.run(ctx).await)?;
    Ok(clock.finish("buildpack_staging_environment", app, details))
}
