//! In-memory fakes for the `CommandRunner` seam (testing only)
//!
//! Provides `ScriptedRunner`, which replays canned results in order, and
//! `FakePlatform`, which simulates the CLI and its REST passthrough closely
//! enough to drive the fixture orchestrator and scenarios end to end.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{HarnessError, HarnessResult};
use crate::invoker::{CommandRunner, Invocation, InvocationResult};

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Scripted {
    Exit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    Timeout,
}

/// Replays scripted results in FIFO order and records every invocation.
///
/// Once the script is exhausted every call exits 1.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next call exits 0 with `stdout`.
    pub fn ok(self, stdout: &str) -> Self {
        self.exit(0, stdout, "")
    }

    /// Next call exits with `exit_code`.
    pub fn exit(self, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Exit {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
        self
    }

    /// Next call times out.
    pub fn timeout(self) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Timeout);
        self
    }

    /// Invocations received so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.seen.lock().unwrap().clone()
    }

    /// Argument lists received so far.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.invocations().into_iter().map(|i| i.args).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> HarnessResult<InvocationResult> {
        self.seen.lock().unwrap().push(invocation.clone());
        let next = self.script.lock().unwrap().pop_front();
        let command = invocation.command_line();
        match next {
            Some(Scripted::Exit {
                exit_code,
                stdout,
                stderr,
            }) => Ok(InvocationResult {
                command,
                exit_code,
                stdout,
                stderr,
                duration_ms: 0,
            }),
            Some(Scripted::Timeout) => Err(HarnessError::InvocationTimeout {
                command,
                timeout: invocation.timeout,
            }),
            None => Ok(InvocationResult {
                command,
                exit_code: 1,
                stdout: String::new(),
                stderr: "no scripted response".to_string(),
                duration_ms: 0,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FakePlatform
// ---------------------------------------------------------------------------

/// Space every fake route lives in.
pub const FAKE_SPACE_GUID: &str = "fake-space-guid";

/// Domain every fake route lives on.
pub const FAKE_DOMAIN_GUID: &str = "fake-domain-guid";

/// Host reported for every running instance.
pub const FAKE_INSTANCE_HOST: &str = "10.0.0.1";

/// Snapshot of a simulated app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeApp {
    pub guid: String,
    pub buildpack: String,
    pub started: bool,
    pub instances: u32,
    pub running: u32,
    pub diego: Option<bool>,
    pub routes: BTreeSet<String>,
    pub port: u16,
}

/// Snapshot of a simulated route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRoute {
    pub guid: String,
    pub host: String,
    pub path: String,
    pub space_guid: String,
    pub domain_guid: String,
}

#[derive(Debug)]
struct PlatformState {
    apps: BTreeMap<String, FakeApp>,
    routes: BTreeMap<String, FakeRoute>,
    buildpacks: BTreeMap<String, u32>,
    staging_output: BTreeMap<String, String>,
    fallback_staging_output: String,
    orgs: BTreeSet<String>,
    users: BTreeSet<String>,
    hang_on: BTreeSet<String>,
    stdout_overrides: BTreeMap<String, String>,
    invocations: Vec<Invocation>,
    next_port: u16,
}

impl Default for PlatformState {
    fn default() -> Self {
        Self {
            apps: BTreeMap::new(),
            routes: BTreeMap::new(),
            buildpacks: BTreeMap::new(),
            staging_output: BTreeMap::new(),
            fallback_staging_output: String::new(),
            orgs: BTreeSet::new(),
            users: BTreeSet::new(),
            hang_on: BTreeSet::new(),
            stdout_overrides: BTreeMap::new(),
            invocations: Vec::new(),
            next_port: 61000,
        }
    }
}

/// Simulated platform behind the CLI.
///
/// Instances converge one per `cf app` sample after a start or scale, so
/// pollers observe intermediate `instances: R/N` states.
#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<PlatformState>,
}

type Reply = (i32, String);

fn ok(stdout: impl Into<String>) -> Reply {
    (0, stdout.into())
}

fn failed(stdout: impl Into<String>) -> Reply {
    (1, stdout.into())
}

fn arg<'a>(args: &'a [String], index: usize) -> &'a str {
    args.get(index).map(String::as_str).unwrap_or("")
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn api_error(code: u32, description: &str) -> String {
    json!({ "code": code, "description": description, "error_code": "CF-Fake" }).to_string()
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buildpack that exists before the suite starts.
    pub fn with_system_buildpack(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .buildpacks
            .insert(name.to_string(), 0);
        self
    }

    /// Output `cf start` prints while staging with `buildpack`.
    pub fn with_staging_output(self, buildpack: &str, output: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .staging_output
            .insert(buildpack.to_string(), output.to_string());
        self
    }

    /// Output `cf start` prints for buildpacks without their own output.
    pub fn with_fallback_staging_output(self, output: &str) -> Self {
        self.state.lock().unwrap().fallback_staging_output = output.to_string();
        self
    }

    /// Print `stdout` for `cf <subcommand>` in place of its usual output.
    /// The call's effect on the platform is unchanged.
    pub fn with_stdout(self, subcommand: &str, stdout: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .stdout_overrides
            .insert(subcommand.to_string(), stdout.to_string());
        self
    }

    /// Make every `cf <subcommand>` call time out.
    pub fn hang_on(&self, subcommand: &str) {
        self.state
            .lock()
            .unwrap()
            .hang_on
            .insert(subcommand.to_string());
    }

    pub fn app(&self, name: &str) -> Option<FakeApp> {
        self.state.lock().unwrap().apps.get(name).cloned()
    }

    pub fn app_names(&self) -> Vec<String> {
        self.state.lock().unwrap().apps.keys().cloned().collect()
    }

    pub fn routes_with_host(&self, host: &str) -> Vec<FakeRoute> {
        self.state
            .lock()
            .unwrap()
            .routes
            .values()
            .filter(|r| r.host == host)
            .cloned()
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.state.lock().unwrap().routes.len()
    }

    pub fn buildpack_names(&self) -> Vec<String> {
        self.state.lock().unwrap().buildpacks.keys().cloned().collect()
    }

    pub fn orgs(&self) -> Vec<String> {
        self.state.lock().unwrap().orgs.iter().cloned().collect()
    }

    pub fn users(&self) -> Vec<String> {
        self.state.lock().unwrap().users.iter().cloned().collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().unwrap().invocations.clone()
    }

    /// Subcommands received so far, e.g. `["push", "start"]`.
    pub fn subcommands(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .filter_map(|i| i.subcommand().map(str::to_string))
            .collect()
    }

    fn dispatch(state: &mut PlatformState, args: &[String]) -> Reply {
        match arg(args, 0) {
            "api" | "auth" | "target" | "logout" | "set-space-role" | "create-space" => ok("OK\n"),
            "create-org" => {
                state.orgs.insert(arg(args, 1).to_string());
                ok("OK\n")
            }
            "delete-org" => {
                state.orgs.remove(arg(args, 1));
                ok("OK\n")
            }
            "create-user" => {
                state.users.insert(arg(args, 1).to_string());
                ok("OK\n")
            }
            "delete-user" => {
                state.users.remove(arg(args, 1));
                ok("OK\n")
            }
            "push" => Self::push(state, args),
            "start" | "restart" => Self::start(state, arg(args, 1)),
            "scale" => Self::scale(state, arg(args, 1), flag(args, "-i")),
            "app" => Self::app_info(state, arg(args, 1), args.iter().any(|a| a == "--guid")),
            "delete" => Self::delete(state, arg(args, 1)),
            "create-buildpack" => Self::create_buildpack(state, arg(args, 1), arg(args, 3)),
            "delete-buildpack" => Self::delete_buildpack(state, arg(args, 1)),
            "curl" => Self::curl(state, args),
            other => failed(format!("'{other}' is not a registered command\n")),
        }
    }

    fn push(state: &mut PlatformState, args: &[String]) -> Reply {
        let name = arg(args, 1).to_string();
        if state.apps.contains_key(&name) {
            return ok(format!("Updating app {name}...\nOK\n"));
        }
        let Some(buildpack) = flag(args, "-b") else {
            return failed("Incorrect Usage: -b is required\n");
        };
        if flag(args, "-d").is_none() {
            return failed("Incorrect Usage: -d is required\n");
        }
        let route_guid = Uuid::new_v4().to_string();
        state.routes.insert(
            route_guid.clone(),
            FakeRoute {
                guid: route_guid.clone(),
                host: name.clone(),
                path: String::new(),
                space_guid: FAKE_SPACE_GUID.to_string(),
                domain_guid: FAKE_DOMAIN_GUID.to_string(),
            },
        );
        let port = state.next_port;
        state.next_port += 1;
        state.apps.insert(
            name.clone(),
            FakeApp {
                guid: Uuid::new_v4().to_string(),
                buildpack: buildpack.to_string(),
                started: false,
                instances: 1,
                running: 0,
                diego: None,
                routes: BTreeSet::from([route_guid]),
                port,
            },
        );
        let started = if args.iter().any(|a| a == "--no-start") {
            String::new()
        } else {
            Self::start(state, &name).1
        };
        ok(format!("Creating app {name}...\nOK\n{started}"))
    }

    fn start(state: &mut PlatformState, name: &str) -> Reply {
        let Some(app) = state.apps.get_mut(name) else {
            return failed(format!("App {name} not found\n"));
        };
        if !state.buildpacks.contains_key(&app.buildpack) {
            return failed(format!(
                "Staging error: buildpack {} not found\nFAILED\n",
                app.buildpack
            ));
        }
        app.started = true;
        app.running = 0;
        let staging = state
            .staging_output
            .get(&app.buildpack)
            .cloned()
            .unwrap_or_else(|| state.fallback_staging_output.clone());
        ok(format!(
            "Starting app {name}...\n-----> Downloaded app package\n{staging}\nApp started\n\nOK\n"
        ))
    }

    fn scale(state: &mut PlatformState, name: &str, instances: Option<&str>) -> Reply {
        let Some(app) = state.apps.get_mut(name) else {
            return failed(format!("App {name} not found\n"));
        };
        let Some(instances) = instances.and_then(|n| n.parse::<u32>().ok()) else {
            return failed("Incorrect Usage: -i must be a number\n");
        };
        app.instances = instances;
        app.running = app.running.min(instances);
        ok(format!("Scaling app {name}...\nOK\n"))
    }

    fn app_info(state: &mut PlatformState, name: &str, guid_only: bool) -> Reply {
        let Some(app) = state.apps.get_mut(name) else {
            return failed(format!("App {name} not found\n"));
        };
        if guid_only {
            return ok(format!("{}\n", app.guid));
        }
        if app.started && app.running < app.instances {
            app.running += 1;
        }
        let requested = if app.started { "started" } else { "stopped" };
        ok(format!(
            "Showing health and status for app {name}...\nOK\n\nrequested state: {requested}\ninstances: {}/{}\nusage: 256M x {} instances\n",
            app.running, app.instances, app.instances
        ))
    }

    fn delete(state: &mut PlatformState, name: &str) -> Reply {
        if let Some(app) = state.apps.remove(name) {
            for route in &app.routes {
                state.routes.remove(route);
            }
        }
        ok(format!("Deleting app {name}...\nOK\n"))
    }

    fn create_buildpack(state: &mut PlatformState, name: &str, position: &str) -> Reply {
        if state.buildpacks.contains_key(name) {
            return failed(format!("Buildpack {name} already exists\n"));
        }
        let position = position.parse().unwrap_or(0);
        state.buildpacks.insert(name.to_string(), position);
        ok(format!(
            "Creating buildpack {name}...\nOK\n\nUploading buildpack {name}...\nOK\n"
        ))
    }

    fn delete_buildpack(state: &mut PlatformState, name: &str) -> Reply {
        if let Some(user) = state.apps.iter().find(|(_, a)| a.buildpack == name) {
            return failed(format!(
                "Buildpack {name} is still referenced by app {}\nFAILED\n",
                user.0
            ));
        }
        state.buildpacks.remove(name);
        ok(format!("Deleting buildpack {name}...\nOK\n"))
    }

    fn curl(state: &mut PlatformState, args: &[String]) -> Reply {
        let target = arg(args, 1);
        let method = flag(args, "-X").unwrap_or("GET");
        let body = flag(args, "-d");
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            ("GET", ["v2", "apps"]) => {
                let name = query.strip_prefix("q=name:").unwrap_or("");
                let resources: Vec<Value> = state
                    .apps
                    .get(name)
                    .map(|a| {
                        json!({
                            "metadata": { "guid": a.guid, "url": format!("/v2/apps/{}", a.guid) },
                            "entity": { "name": name },
                        })
                    })
                    .into_iter()
                    .collect();
                ok(json!({ "total_results": resources.len(), "resources": resources }).to_string())
            }
            ("GET", ["v2", "apps", guid, "stats"]) => {
                let Some(app) = state.apps.values().find(|a| a.guid == *guid) else {
                    return ok(api_error(100004, "The app could not be found"));
                };
                if !app.started {
                    return ok(api_error(200003, "Could not fetch stats for stopped app"));
                }
                let stats: serde_json::Map<String, Value> = (0..app.instances.max(1))
                    .map(|i| {
                        (
                            i.to_string(),
                            json!({
                                "state": "RUNNING",
                                "stats": { "host": FAKE_INSTANCE_HOST, "port": app.port + i as u16 },
                            }),
                        )
                    })
                    .collect();
                ok(Value::Object(stats).to_string())
            }
            ("PUT", ["v2", "apps", guid]) => {
                let update: Value = match body.map(serde_json::from_str::<Value>) {
                    Some(Ok(v)) => v,
                    _ => return ok(api_error(1001, "Request invalid due to parse error")),
                };
                let Some(app) = state.apps.values_mut().find(|a| a.guid == *guid) else {
                    return ok(api_error(100004, "The app could not be found"));
                };
                app.diego = update.get("diego").and_then(Value::as_bool);
                ok(json!({ "metadata": { "guid": guid } }).to_string())
            }
            ("PUT", ["v2", "apps", app_guid, "routes", route_guid]) => {
                if !state.routes.contains_key(*route_guid) {
                    return ok(api_error(210002, "The route could not be found"));
                }
                let Some(app) = state.apps.values_mut().find(|a| a.guid == *app_guid) else {
                    return ok(api_error(100004, "The app could not be found"));
                };
                app.routes.insert(route_guid.to_string());
                ok(json!({ "metadata": { "guid": app_guid } }).to_string())
            }
            ("GET", ["v2", "routes"]) => {
                let host = query.strip_prefix("q=host:").unwrap_or("");
                let resources: Vec<Value> = state
                    .routes
                    .values()
                    .filter(|r| r.host == host)
                    .map(|r| {
                        json!({
                            "metadata": { "guid": r.guid },
                            "entity": {
                                "host": r.host,
                                "path": r.path,
                                "space_guid": r.space_guid,
                                "domain_guid": r.domain_guid,
                            },
                        })
                    })
                    .collect();
                ok(json!({ "total_results": resources.len(), "resources": resources }).to_string())
            }
            ("POST", ["v2", "routes"]) => {
                let request: Value = match body.map(serde_json::from_str::<Value>) {
                    Some(Ok(v)) => v,
                    _ => return ok(api_error(1001, "Request invalid due to parse error")),
                };
                let field = |k: &str| request.get(k).and_then(Value::as_str).unwrap_or("").to_string();
                let (host, path) = (field("host"), field("path"));
                let (space_guid, domain_guid) = (field("space_guid"), field("domain_guid"));
                if space_guid != FAKE_SPACE_GUID || domain_guid != FAKE_DOMAIN_GUID {
                    return ok(api_error(1001, "Unknown space or domain"));
                }
                if state.routes.values().any(|r| r.host == host && r.path == path) {
                    return ok(api_error(210001, "The host is taken"));
                }
                let guid = Uuid::new_v4().to_string();
                state.routes.insert(
                    guid.clone(),
                    FakeRoute {
                        guid: guid.clone(),
                        host,
                        path,
                        space_guid,
                        domain_guid,
                    },
                );
                ok(json!({
                    "metadata": { "guid": guid, "url": format!("/v2/routes/{guid}") },
                    "entity": {},
                })
                .to_string())
            }
            _ => ok(api_error(10000, "Unknown request")),
        }
    }
}

#[async_trait]
impl CommandRunner for FakePlatform {
    async fn run(&self, invocation: &Invocation) -> HarnessResult<InvocationResult> {
        let mut state = self.state.lock().unwrap();
        state.invocations.push(invocation.clone());
        let command = invocation.command_line();

        if let Some(sub) = invocation.subcommand() {
            if state.hang_on.contains(sub) {
                return Err(HarnessError::InvocationTimeout {
                    command,
                    timeout: invocation.timeout,
                });
            }
        }

        let (exit_code, mut stdout) = Self::dispatch(&mut state, &invocation.args);
        if let Some(out) = invocation
            .subcommand()
            .and_then(|sub| state.stdout_overrides.get(sub))
        {
            stdout = out.clone();
        }
        Ok(InvocationResult {
            command,
            exit_code,
            stdout,
            stderr: String::new(),
            duration_ms: 0,
        })
    }
}
