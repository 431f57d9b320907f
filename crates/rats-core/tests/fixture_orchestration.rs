//! Fixture orchestrator against scripted and simulated platforms.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rats_core::fakes::{FakePlatform, ScriptedRunner, FAKE_DOMAIN_GUID, FAKE_SPACE_GUID};
use rats_core::{Backend, Cf, CommandRunner, Fixtures, HarnessError, SuiteConfig};
use serde_json::Value;

fn config() -> SuiteConfig {
    SuiteConfig {
        api: "api.example.com".to_string(),
        apps_domain: "example.com".to_string(),
        admin_user: "admin".to_string(),
        admin_password: "admin".to_string(),
        ..SuiteConfig::default()
    }
}

fn fixtures_on(runner: Arc<dyn CommandRunner>, config: SuiteConfig) -> Fixtures {
    Fixtures::new(Cf::new(runner, "cf"), Arc::new(config))
}

fn platform() -> Arc<FakePlatform> {
    Arc::new(FakePlatform::new().with_system_buildpack("ruby_buildpack"))
}

const ASSET: &str = "/tmp/assets/dora";

/// Test: push then delete leaves nothing behind for any app name
#[tokio::test]
async fn test_create_then_delete_leaves_no_residue() {
    let platform = platform();
    let fixtures = fixtures_on(platform.clone(), config());

    for _ in 0..5 {
        let app = fixtures
            .push_app_no_start(Path::new(ASSET), "ruby_buildpack")
            .await
            .expect("push failed");
        assert!(app.name.starts_with("RATS-APP-"));
        assert_eq!(platform.routes_with_host(&app.name).len(), 1);

        fixtures.delete_app(&app.name).await.expect("delete failed");
        assert!(platform.app(&app.name).is_none());
        assert!(platform.routes_with_host(&app.name).is_empty());
    }

    assert_eq!(platform.route_count(), 0);
    assert_eq!(platform.buildpack_names(), vec!["ruby_buildpack".to_string()]);
}

/// Test: push passes memory, asset path and domain through unchanged
#[tokio::test]
async fn test_push_arguments() {
    let runner = Arc::new(ScriptedRunner::new().ok("OK"));
    let fixtures = fixtures_on(runner.clone(), config());

    fixtures
        .push_named_app_no_start("my-app", Path::new(ASSET), "go_buildpack")
        .await
        .expect("push failed");

    assert_eq!(
        runner.calls()[0],
        vec![
            "push", "my-app", "-b", "go_buildpack", "--no-start", "-m", "256M", "-p", ASSET, "-d",
            "example.com"
        ]
    );
    assert_eq!(runner.invocations()[0].timeout, Duration::from_secs(30));
}

/// Test: route mapping resolves prerequisites in a fixed order
#[tokio::test]
async fn test_map_route_resolution_order() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .ok(r#"{"resources":[{"entity":{"space_guid":"s-1","domain_guid":"d-1"}}]}"#)
            .ok(r#"{"metadata":{"guid":"r-1"}}"#)
            .ok("app-guid-1\n")
            .ok("{}"),
    );
    let fixtures = fixtures_on(runner.clone(), config());

    let route = fixtures
        .map_route_to_app("other-host", "/v1", "my-app")
        .await
        .expect("map route failed");
    assert_eq!(route.guid, "r-1");
    assert_eq!(route.space_guid, "s-1");
    assert_eq!(route.domain_guid, "d-1");

    let calls = runner.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], vec!["curl", "/v2/routes?q=host:my-app"]);
    assert_eq!(&calls[1][..4], &["curl", "/v2/routes", "-X", "POST"]);
    assert_eq!(calls[2], vec!["app", "my-app", "--guid"]);
    assert_eq!(calls[3], vec!["curl", "/v2/apps/app-guid-1/routes/r-1", "-X", "PUT"]);

    let body: Value = serde_json::from_str(&calls[1][5]).expect("route body must be JSON");
    assert_eq!(body["host"], "other-host");
    assert_eq!(body["path"], "/v1");
    assert_eq!(body["space_guid"], "s-1");
    assert_eq!(body["domain_guid"], "d-1");

    // Route creation and binding use the push timeout.
    let invocations = runner.invocations();
    assert_eq!(invocations[1].timeout, Duration::from_secs(120));
    assert_eq!(invocations[3].timeout, Duration::from_secs(120));
}

/// Test: mapped routes are bound and removed with the app
#[tokio::test]
async fn test_map_route_on_fake_platform() {
    let platform = platform();
    let fixtures = fixtures_on(platform.clone(), config());

    let app = fixtures
        .push_app(Path::new(ASSET), "ruby_buildpack")
        .await
        .expect("push failed");
    let route = fixtures
        .map_route_to_app("extra-host", "/path", &app.name)
        .await
        .expect("map failed");

    assert_eq!(route.space_guid, FAKE_SPACE_GUID);
    assert_eq!(route.domain_guid, FAKE_DOMAIN_GUID);
    let bound = platform.app(&app.name).unwrap().routes;
    assert!(bound.contains(&route.guid));
    assert_eq!(bound.len(), 2);

    fixtures.delete_app(&app.name).await.unwrap();
    assert_eq!(platform.route_count(), 0);
}

/// Test: instance location comes from the stats of instance 0
#[tokio::test]
async fn test_app_instance_location() {
    let platform = platform();
    let fixtures = fixtures_on(platform.clone(), config());

    let app = fixtures
        .push_app(Path::new(ASSET), "ruby_buildpack")
        .await
        .unwrap();
    let location = fixtures.app_instance_location(&app.name).await.unwrap();
    let expected_port = platform.app(&app.name).unwrap().port;

    assert_eq!(location.host, "10.0.0.1");
    assert_eq!(location.port, expected_port);
    assert_eq!(location.index, 0);
}

/// Test: a stopped app's stats body is an API error, not a stats map
#[tokio::test]
async fn test_app_instance_location_for_stopped_app_is_decode_error() {
    let platform = platform();
    let fixtures = fixtures_on(platform, config());

    let app = fixtures
        .push_app_no_start(Path::new(ASSET), "ruby_buildpack")
        .await
        .unwrap();
    let err = fixtures.app_instance_location(&app.name).await.unwrap_err();
    assert!(matches!(err, HarnessError::Decode { .. }), "got {err}");
}

/// Test: unknown app name yields EmptyResult, not a zero-valued record
#[tokio::test]
async fn test_app_instance_location_unknown_app() {
    let runner = Arc::new(ScriptedRunner::new().ok(r#"{"resources":[]}"#));
    let fixtures = fixtures_on(runner.clone(), config());

    let err = fixtures.app_instance_location("ghost").await.unwrap_err();
    match err {
        HarnessError::EmptyResult { command, what } => {
            assert_eq!(command, "cf curl /v2/apps?q=name:ghost");
            assert_eq!(what, "app");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.calls().len(), 1, "lookups are never retried");
}

/// Test: empty `--guid` output is EmptyResult
#[tokio::test]
async fn test_app_guid_empty() {
    let runner = Arc::new(ScriptedRunner::new().ok("\n"));
    let fixtures = fixtures_on(runner, config());
    let err = fixtures.app_guid("my-app").await.unwrap_err();
    assert!(matches!(err, HarnessError::EmptyResult { .. }));
}

/// Test: buildpack creation checks the ordered CLI output
#[tokio::test]
async fn test_create_buildpack_output_checked() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .ok("Creating buildpack bp...\nOK\n\nUploading buildpack bp...\nOK\n")
            .ok("Creating buildpack bp2...\nOK\n"),
    );
    let fixtures = fixtures_on(runner.clone(), config());

    let record = fixtures
        .create_buildpack("bp", Path::new("/tmp/bp/buildpack.zip"), 0)
        .await
        .expect("create failed");
    assert_eq!(record.name, "bp");
    assert_eq!(record.position, 0);
    assert_eq!(
        runner.calls()[0],
        vec!["create-buildpack", "bp", "/tmp/bp/buildpack.zip", "0"]
    );

    let err = fixtures
        .create_buildpack("bp2", Path::new("/tmp/bp/buildpack.zip"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::UnexpectedOutput { .. }));
}

/// Test: nonzero exit fails with the command and both streams
#[tokio::test]
async fn test_nonzero_exit_reports_command_and_output() {
    let runner = Arc::new(ScriptedRunner::new().exit(1, "Deleting app x...", "FAILED: server error"));
    let fixtures = fixtures_on(runner, config());

    let err = fixtures.delete_app("x").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("cf delete x -f -r"));
    assert!(msg.contains("Deleting app x..."));
    assert!(msg.contains("FAILED: server error"));
}

/// Test: a hung command fails the operation without retry
#[tokio::test]
async fn test_hung_command_is_fatal() {
    let platform = platform();
    platform.hang_on("push");
    let fixtures = fixtures_on(platform.clone(), config());

    let err = fixtures
        .push_app_no_start(Path::new(ASSET), "ruby_buildpack")
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::InvocationTimeout { .. }));
    assert_eq!(platform.subcommands(), vec!["push".to_string()]);
}

/// Test: staging with an unknown buildpack fails start
#[tokio::test]
async fn test_start_with_missing_buildpack_fails() {
    let platform = platform();
    let fixtures = fixtures_on(platform, config());

    let app = fixtures
        .push_app_no_start(Path::new(ASSET), "missing_buildpack")
        .await
        .unwrap();
    let err = fixtures.start_app(&app.name).await.unwrap_err();
    assert!(matches!(err, HarnessError::InvocationFailure { exit_code: 1, .. }));
}

/// Test: the configured backend is selected before start
#[tokio::test]
async fn test_start_selects_backend() {
    let platform = platform();
    let mut diego = config();
    diego.backend = Backend::Diego;
    let fixtures = fixtures_on(platform.clone(), diego);

    let app = fixtures
        .push_app(Path::new(ASSET), "ruby_buildpack")
        .await
        .unwrap();
    assert_eq!(platform.app(&app.name).unwrap().diego, Some(true));
    assert_eq!(
        platform.subcommands(),
        vec!["push", "app", "curl", "start"]
    );

    let mut dea = config();
    dea.backend = Backend::Dea;
    let fixtures = fixtures_on(platform.clone(), dea);
    fixtures.start_app(&app.name).await.unwrap();
    assert_eq!(platform.app(&app.name).unwrap().diego, Some(false));
}

/// Test: the default backend issues no update
#[tokio::test]
async fn test_default_backend_skips_update() {
    let platform = platform();
    let fixtures = fixtures_on(platform.clone(), config());

    fixtures
        .push_app(Path::new(ASSET), "ruby_buildpack")
        .await
        .unwrap();
    assert_eq!(platform.subcommands(), vec!["push", "start"]);
}

/// Test: buildpacks cannot be deleted while an app uses them
#[tokio::test]
async fn test_buildpack_outlives_apps() {
    let platform = Arc::new(FakePlatform::new());
    let fixtures = fixtures_on(platform.clone(), config());

    fixtures
        .create_buildpack("bp", Path::new("/tmp/bp.zip"), 0)
        .await
        .unwrap();
    let app = fixtures
        .push_app_no_start(Path::new(ASSET), "bp")
        .await
        .unwrap();

    assert!(fixtures.delete_buildpack("bp").await.is_err());
    fixtures.delete_app(&app.name).await.unwrap();
    fixtures.delete_buildpack("bp").await.unwrap();
    assert!(platform.buildpack_names().is_empty());
}

/// Test: restart runs with the push timeout and fails on a nonzero exit
#[tokio::test]
async fn test_restart_app_uses_push_timeout() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .ok("Restarting app my-app...\nOK\n")
            .exit(1, "", "App my-app not found"),
    );
    let fixtures = fixtures_on(runner.clone(), config());

    let result = fixtures.restart_app("my-app").await.unwrap();
    assert!(result.stdout.contains("Restarting"));
    assert_eq!(runner.calls()[0], vec!["restart", "my-app"]);
    assert_eq!(runner.invocations()[0].timeout, Duration::from_secs(120));

    let err = fixtures.restart_app("my-app").await.unwrap_err();
    assert!(matches!(err, HarnessError::InvocationFailure { .. }));
}

/// Test: a tracked app records its scale, guid and mapped routes
#[tokio::test]
async fn test_tracked_app_records_scale_and_routes() {
    let platform = platform();
    let fixtures = fixtures_on(platform.clone(), config());

    let mut app = fixtures
        .push_app(Path::new(ASSET), "ruby_buildpack")
        .await
        .unwrap();
    assert_eq!(app.instances, 1);
    assert!(app.guid.is_none());

    fixtures.scale(&mut app, 3).await.unwrap();
    assert_eq!(app.instances, 3);
    assert_eq!(platform.app(&app.name).unwrap().instances, 3);

    let route = fixtures.map_route(&mut app, "extra-host", "").await.unwrap();
    let fake = platform.app(&app.name).unwrap();
    assert_eq!(app.guid.as_deref(), Some(fake.guid.as_str()));
    assert_eq!(app.routes, vec![route.guid.clone()]);
    assert!(fake.routes.contains(&route.guid));

    // A failed scale leaves the record untouched.
    platform.hang_on("scale");
    assert!(fixtures.scale(&mut app, 5).await.is_err());
    assert_eq!(app.instances, 3);
}
