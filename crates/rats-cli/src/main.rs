//! RATS - Routing and App Acceptance Test Suite CLI
//!
//! The `rats` command runs one acceptance scenario against a live platform
//! through the `cf` CLI.
//!
//! ## Commands
//!
//! - `scale`: scale an app before its first start and wait for convergence
//! - `route`: map an extra route to an app and locate its first instance
//! - `staging-env`: stage an app with an uploaded buildpack and check its output
//! - `app-info`: show guid and instance counts of an existing app

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rats_core::scenario::{buildpack_staging_environment, route_mapping, scale_before_start};
use rats_core::{
    Cf, CommandRunner, Fixtures, ProcessRunner, ScenarioOutcome, SuiteConfig, SuiteContext,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "rats")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Routing and App Acceptance Test Suite (RATS)", long_about = None)]
struct Cli {
    /// Suite configuration file (JSON)
    #[arg(short, long, global = true, env = "CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Scale an app before starting it, then wait for all instances
    Scale {
        /// App bits to push
        #[arg(short, long)]
        asset: PathBuf,

        /// Buildpack to stage with
        #[arg(short, long)]
        buildpack: String,

        /// Instance count to scale to
        #[arg(short, long, default_value = "3")]
        instances: u32,
    },

    /// Map an extra host/path route to a fresh app
    Route {
        /// App bits to push
        #[arg(short, long)]
        asset: PathBuf,

        /// Buildpack to stage with
        #[arg(short, long)]
        buildpack: String,

        /// Host of the extra route
        #[arg(long)]
        host: String,

        /// Path of the extra route
        #[arg(long, default_value = "")]
        path: String,
    },

    /// Stage an app with an admin buildpack and check the staging output
    StagingEnv {
        /// App directory to push
        #[arg(long)]
        app_dir: PathBuf,

        /// Buildpack archive to upload
        #[arg(long)]
        buildpack_archive: PathBuf,

        /// Lines the staging output must contain, in order
        #[arg(short, long = "expect", required = true)]
        expect: Vec<String>,
    },

    /// Show guid and instance counts of an existing app
    AppInfo {
        /// App name
        name: String,
    },
}

#[derive(Debug, Serialize)]
struct AppInfo {
    name: String,
    guid: String,
    instances: Option<String>,
    location: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    rats_core::init_tracing(cli.json, level);

    let path = cli
        .config
        .context("No suite config given; pass --config or set CONFIG")?;
    let config = Arc::new(
        SuiteConfig::load(&path)
            .with_context(|| format!("Failed to load suite config {}", path.display()))?,
    );
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner);

    let report = match cli.command {
        Commands::AppInfo { name } => {
            serde_json::to_value(cmd_app_info(config, runner, &name).await?)?
        }
        command => serde_json::to_value(cmd_scenario(config, runner, command).await?)?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn component(command: &Commands) -> &'static str {
    match command {
        Commands::Scale { .. } => "Scale",
        Commands::Route { .. } => "Routing",
        Commands::StagingEnv { .. } => "Buildpacks",
        Commands::AppInfo { .. } => "AppInfo",
    }
}

/// Set up the suite environment, run one scenario, and always tear down.
async fn cmd_scenario(
    config: Arc<SuiteConfig>,
    runner: Arc<dyn CommandRunner>,
    command: Commands,
) -> Result<ScenarioOutcome> {
    let ctx = SuiteContext::setup(config, runner, component(&command))
        .await
        .context("Failed to set up suite environment")?;

    let outcome = run_scenario(&ctx, command).await;
    let teardown = ctx.teardown().await;

    let outcome = outcome?;
    if let Err(err) = teardown {
        warn!(error = %err, "suite teardown failed");
        return Err(err).context("Failed to tear down suite environment");
    }
    info!(scenario = %outcome.scenario, "done");
    Ok(outcome)
}

async fn run_scenario(ctx: &SuiteContext, command: Commands) -> Result<ScenarioOutcome> {
    let outcome = match command {
        Commands::Scale {
            asset,
            buildpack,
            instances,
        } => scale_before_start(ctx, &asset, &buildpack, instances).await,
        Commands::Route {
            asset,
            buildpack,
            host,
            path,
        } => route_mapping(ctx, &asset, &buildpack, &host, &path).await,
        Commands::StagingEnv {
            app_dir,
            buildpack_archive,
            expect,
        } => buildpack_staging_environment(ctx, &app_dir, &buildpack_archive, &expect).await,
        Commands::AppInfo { .. } => anyhow::bail!("app-info is not a scenario"),
    };
    outcome.context("Scenario failed")
}

/// Look up an app in the currently targeted space, without suite setup.
async fn cmd_app_info(
    config: Arc<SuiteConfig>,
    runner: Arc<dyn CommandRunner>,
    name: &str,
) -> Result<AppInfo> {
    let cf = Cf::new(runner, config.cf_binary.clone());
    let fixtures = Fixtures::new(cf, config);

    let guid = fixtures
        .app_guid(name)
        .await
        .with_context(|| format!("App {name} not found"))?;
    let instances = fixtures.app_instances(name).await?;
    let location = match instances {
        Some(count) if count.running > 0 => {
            Some(fixtures.app_instance_location(name).await?.to_string())
        }
        _ => None,
    };

    Ok(AppInfo {
        name: name.to_string(),
        guid,
        instances: instances.map(|c| c.to_string()),
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rats_core::fakes::FakePlatform;
    use std::path::Path;

    fn config() -> Arc<SuiteConfig> {
        Arc::new(SuiteConfig {
            api: "api.example.com".to_string(),
            apps_domain: "example.com".to_string(),
            admin_user: "admin".to_string(),
            admin_password: "admin".to_string(),
            ..SuiteConfig::default()
        })
    }

    #[test]
    fn test_parse_scale_defaults() {
        let cli = Cli::try_parse_from([
            "rats", "--config", "/tmp/config.json", "scale", "--asset", "/tmp/dora", "-b", "ruby",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.json")));
        assert_eq!(
            cli.command,
            Commands::Scale {
                asset: PathBuf::from("/tmp/dora"),
                buildpack: "ruby".to_string(),
                instances: 3,
            }
        );
    }

    #[test]
    fn test_config_falls_back_to_env() {
        use clap::CommandFactory;
        let cmd = Cli::command();
        let config = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "config")
            .unwrap();
        assert_eq!(config.get_env(), Some(std::ffi::OsStr::new("CONFIG")));
    }

    #[test]
    fn test_parse_staging_env_requires_expectations() {
        assert!(Cli::try_parse_from([
            "rats",
            "staging-env",
            "--app-dir",
            "/tmp/app",
            "--buildpack-archive",
            "/tmp/bp.zip",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "rats",
            "staging-env",
            "--app-dir",
            "/tmp/app",
            "--buildpack-archive",
            "/tmp/bp.zip",
            "-e",
            "RUBY_LOCATION=/usr/bin/ruby",
            "-e",
            "RUBY_VERSION=ruby 1.9.3p547",
        ])
        .unwrap();
        match cli.command {
            Commands::StagingEnv { expect, .. } => assert_eq!(expect.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_scale_scenario_tears_down_environment() {
        let platform = Arc::new(FakePlatform::new().with_system_buildpack("ruby"));
        let outcome = cmd_scenario(
            config(),
            platform.clone(),
            Commands::Scale {
                asset: PathBuf::from("/tmp/dora"),
                buildpack: "ruby".to_string(),
                instances: 2,
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.details["converged"], "instances: 2/2");
        assert!(platform.orgs().is_empty());
        assert!(platform.users().is_empty());
        assert!(platform.app_names().is_empty());
    }

    #[tokio::test]
    async fn test_failed_scenario_still_tears_down() {
        let platform = Arc::new(FakePlatform::new());
        let err = cmd_scenario(
            config(),
            platform.clone(),
            Commands::Route {
                asset: PathBuf::from("/tmp/dora"),
                buildpack: "missing".to_string(),
                host: "extra".to_string(),
                path: String::new(),
            },
        )
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("Scenario failed"));
        assert!(platform.orgs().is_empty());
    }

    #[tokio::test]
    async fn test_app_info_reports_location_for_running_app() {
        let platform = Arc::new(FakePlatform::new().with_system_buildpack("ruby"));
        let fixtures = Fixtures::new(Cf::new(platform.clone(), "cf"), config());
        let app = fixtures
            .push_app(Path::new("/tmp/dora"), "ruby")
            .await
            .unwrap();

        let info = cmd_app_info(config(), platform.clone(), &app.name)
            .await
            .unwrap();
        assert_eq!(info.guid, platform.app(&app.name).unwrap().guid);
        assert_eq!(info.instances.as_deref(), Some("instances: 1/1"));
        assert!(info.location.unwrap().starts_with("10.0.0.1:"));
    }
}
