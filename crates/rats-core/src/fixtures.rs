//! Fixture orchestration: apps, buildpacks and routes on the platform.
//!
//! Every operation either returns the derived record/identifier or fails the
//! calling scenario; no partial state is reported back.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use crate::cf::Cf;
use crate::config::{SuiteConfig, DEFAULT_MEMORY_LIMIT};
use crate::decode;
use crate::error::{HarnessError, HarnessResult};
use crate::invoker::InvocationResult;
use crate::model::{
    AppRecord, BuildpackRecord, InstanceCount, InstanceSample, RouteRecord, StatsSample,
};
use crate::naming::{prefixed_random_name, APP_PREFIX};
use crate::poller::{poll_until, Converged};
use crate::request::{encode, AppBackendRequest, CreateRouteRequest};

/// Lines `create-buildpack` prints, in order, on success.
pub const BUILDPACK_CREATED_OUTPUT: [&str; 4] = ["Creating", "OK", "Uploading", "OK"];

/// Named fixture operations over one CLI user context.
#[derive(Debug, Clone)]
pub struct Fixtures {
    cf: Cf,
    config: Arc<SuiteConfig>,
}

impl Fixtures {
    pub fn new(cf: Cf, config: Arc<SuiteConfig>) -> Self {
        Self { cf, config }
    }

    pub fn cf(&self) -> &Cf {
        &self.cf
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    fn timeout(&self) -> Duration {
        self.config.default_timeout()
    }

    fn push_timeout(&self) -> Duration {
        self.config.cf_push_timeout()
    }

    // ---------------------------------------------------------------------
    // Apps
    // ---------------------------------------------------------------------

    /// Push a freshly named app without starting it.
    pub async fn push_app_no_start(&self, asset: &Path, buildpack: &str) -> HarnessResult<AppRecord> {
        let name = prefixed_random_name(APP_PREFIX);
        self.push_named_app_no_start(&name, asset, buildpack).await
    }

    /// Push `name` without starting it, routed on the configured apps domain.
    #[instrument(skip(self, asset), fields(asset = %asset.display()))]
    pub async fn push_named_app_no_start(
        &self,
        name: &str,
        asset: &Path,
        buildpack: &str,
    ) -> HarnessResult<AppRecord> {
        let asset = asset.to_string_lossy();
        self.cf
            .run_ok(
                &[
                    "push",
                    name,
                    "-b",
                    buildpack,
                    "--no-start",
                    "-m",
                    DEFAULT_MEMORY_LIMIT,
                    "-p",
                    &asset,
                    "-d",
                    &self.config.apps_domain,
                ],
                self.timeout(),
            )
            .await?;
        info!(app = name, "pushed app");
        Ok(AppRecord::new(name))
    }

    /// Push a freshly named app and start it.
    pub async fn push_app(&self, asset: &Path, buildpack: &str) -> HarnessResult<AppRecord> {
        let app = self.push_app_no_start(asset, buildpack).await?;
        self.start_app(&app.name).await?;
        Ok(app)
    }

    /// Select the runtime backend, then start. Returns the staging output.
    #[instrument(skip(self))]
    pub async fn start_app(&self, app: &str) -> HarnessResult<InvocationResult> {
        self.set_backend(app).await?;
        self.cf.run_ok(&["start", app], self.push_timeout()).await
    }

    pub async fn restart_app(&self, app: &str) -> HarnessResult<InvocationResult> {
        self.cf.run_ok(&["restart", app], self.push_timeout()).await
    }

    /// Pin the app to the configured backend; a no-op for the default.
    pub async fn set_backend(&self, app: &str) -> HarnessResult<()> {
        match self.config.backend.diego_flag() {
            Some(diego) => self.set_diego(app, diego).await,
            None => Ok(()),
        }
    }

    /// `PUT /v2/apps/<guid>` with `{"diego": <flag>}`.
    pub async fn set_diego(&self, app: &str, diego: bool) -> HarnessResult<()> {
        let guid = self.app_guid(app).await?;
        let body = encode("app update", &AppBackendRequest { diego })?;
        let path = format!("/v2/apps/{guid}");
        self.cf
            .run_ok(&["curl", &path, "-d", &body, "-X", "PUT"], self.timeout())
            .await?;
        Ok(())
    }

    /// Request `instances` without waiting for them to run.
    pub async fn scale_app(&self, app: &str, instances: u32) -> HarnessResult<()> {
        let count = instances.to_string();
        self.cf
            .run_ok(&["scale", app, "-i", &count], self.timeout())
            .await?;
        Ok(())
    }

    /// Scale a tracked app and record the requested count.
    pub async fn scale(&self, app: &mut AppRecord, instances: u32) -> HarnessResult<()> {
        self.scale_app(&app.name, instances).await?;
        app.instances = instances;
        Ok(())
    }

    /// Scale and wait until `instances: N/N` is reported.
    pub async fn scale_app_instances(
        &self,
        app: &str,
        instances: u32,
    ) -> HarnessResult<Converged<InstanceSample>> {
        self.scale_app(app, instances).await?;
        self.wait_for_instances(app, instances).await
    }

    /// One `cf app` sample. Exit status is not checked; `cf app` may fail
    /// transiently while the app restages, and the sample keeps its output.
    pub async fn sample_instances(&self, app: &str) -> HarnessResult<InstanceSample> {
        let result = self.cf.run(&["app", app], self.timeout()).await?;
        Ok(InstanceSample::new(result))
    }

    /// The app's instance count, if `cf app` reported one.
    pub async fn app_instances(&self, app: &str) -> HarnessResult<Option<InstanceCount>> {
        Ok(self.sample_instances(app).await?.count)
    }

    /// Poll `cf app` until all `instances` are running.
    pub async fn wait_for_instances(
        &self,
        app: &str,
        instances: u32,
    ) -> HarnessResult<Converged<InstanceSample>> {
        let description = format!("{app} to report instances: {instances}/{instances}");
        poll_until(
            &self.config.poll_policy(),
            &description,
            || self.sample_instances(app),
            |sample| sample.is_converged_to(instances),
        )
        .await
    }

    /// Delete the app together with its mapped routes.
    #[instrument(skip(self))]
    pub async fn delete_app(&self, app: &str) -> HarnessResult<()> {
        self.cf
            .run_ok(&["delete", app, "-f", "-r"], self.timeout())
            .await?;
        Ok(())
    }

    /// Platform-assigned guid of `app`.
    pub async fn app_guid(&self, app: &str) -> HarnessResult<String> {
        let result = self
            .cf
            .run_ok(&["app", app, "--guid"], self.timeout())
            .await?;
        let guid = result.stdout.trim();
        if guid.is_empty() {
            return Err(HarnessError::EmptyResult {
                command: result.command,
                what: "app guid".to_string(),
            });
        }
        Ok(guid.to_string())
    }

    /// Network location of instance 0, via the app list and its stats.
    pub async fn app_instance_location(&self, app: &str) -> HarnessResult<StatsSample> {
        let query = format!("/v2/apps?q=name:{app}");
        let apps = self.cf.run_ok(&["curl", &query], self.timeout()).await?;
        let app_url = decode::first_app_url(&apps.command, &apps.stdout)?;

        let stats_path = format!("{app_url}/stats");
        let stats = self
            .cf
            .run_ok(&["curl", &stats_path], self.timeout())
            .await?;
        decode::instance_stats(&stats.command, &stats.stdout, 0)
    }

    // ---------------------------------------------------------------------
    // Buildpacks
    // ---------------------------------------------------------------------

    /// Upload an admin buildpack at `position`. Requires an admin context.
    #[instrument(skip(self, archive), fields(archive = %archive.display()))]
    pub async fn create_buildpack(
        &self,
        name: &str,
        archive: &Path,
        position: u32,
    ) -> HarnessResult<BuildpackRecord> {
        let archive_arg = archive.to_string_lossy();
        let position_arg = position.to_string();
        let result = self
            .cf
            .run_ok(
                &["create-buildpack", name, &archive_arg, &position_arg],
                self.timeout(),
            )
            .await?;
        result.expect_output_in_order(&BUILDPACK_CREATED_OUTPUT)?;
        Ok(BuildpackRecord {
            name: name.to_string(),
            archive: archive.to_path_buf(),
            position,
        })
    }

    /// Delete an admin buildpack. Delete every app using it first.
    pub async fn delete_buildpack(&self, name: &str) -> HarnessResult<()> {
        self.cf
            .run_ok(&["delete-buildpack", name, "-f"], self.timeout())
            .await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Routes
    // ---------------------------------------------------------------------

    /// `(space_guid, domain_guid)` of the route whose host is the app name.
    pub async fn space_and_domain_guids(&self, app: &str) -> HarnessResult<(String, String)> {
        let query = format!("/v2/routes?q=host:{app}");
        let result = self.cf.run_ok(&["curl", &query], self.timeout()).await?;
        decode::first_route_space_and_domain(&result.command, &result.stdout)
    }

    /// Create a route in an existing space and domain.
    pub async fn create_route(
        &self,
        host: &str,
        path: &str,
        space_guid: &str,
        domain_guid: &str,
    ) -> HarnessResult<RouteRecord> {
        let body = encode(
            "route creation",
            &CreateRouteRequest {
                host,
                path,
                domain_guid,
                space_guid,
            },
        )?;
        let result = self
            .cf
            .run_ok(&["curl", "/v2/routes", "-X", "POST", "-d", &body], self.push_timeout())
            .await?;
        let guid = decode::created_route_guid(&result.command, &result.stdout)?;
        info!(host, path, route_guid = %guid, "created route");
        Ok(RouteRecord {
            host: host.to_string(),
            path: path.to_string(),
            domain_guid: domain_guid.to_string(),
            space_guid: space_guid.to_string(),
            guid,
        })
    }

    /// Bind an existing route to an existing app.
    pub async fn bind_route(&self, app_guid: &str, route_guid: &str) -> HarnessResult<()> {
        let path = format!("/v2/apps/{app_guid}/routes/{route_guid}");
        self.cf
            .run_ok(&["curl", &path, "-X", "PUT"], self.push_timeout())
            .await?;
        Ok(())
    }

    /// Create `host`/`path` in the app's space and domain and bind it.
    ///
    /// Resolution order: space/domain, create route, app guid, bind.
    #[instrument(skip(self))]
    pub async fn map_route_to_app(
        &self,
        host: &str,
        path: &str,
        app: &str,
    ) -> HarnessResult<RouteRecord> {
        let (route, _) = self.create_and_bind_route(host, path, app).await?;
        Ok(route)
    }

    /// [`Fixtures::map_route_to_app`] for a tracked app, recording its guid
    /// and the new route binding.
    pub async fn map_route(
        &self,
        app: &mut AppRecord,
        host: &str,
        path: &str,
    ) -> HarnessResult<RouteRecord> {
        let (route, app_guid) = self.create_and_bind_route(host, path, &app.name).await?;
        app.guid = Some(app_guid);
        app.routes.push(route.guid.clone());
        Ok(route)
    }

    async fn create_and_bind_route(
        &self,
        host: &str,
        path: &str,
        app: &str,
    ) -> HarnessResult<(RouteRecord, String)> {
        let (space_guid, domain_guid) = self.space_and_domain_guids(app).await?;
        let route = self
            .create_route(host, path, &space_guid, &domain_guid)
            .await?;
        let app_guid = self.app_guid(app).await?;
        self.bind_route(&app_guid, &route.guid).await?;
        Ok((route, app_guid))
    }
}
