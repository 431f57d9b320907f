//! RATS Core - Routing and App Acceptance Test Suite
//!
//! Drives the platform CLI to build deterministic test fixtures and waits
//! for the platform to converge:
//! - [`invoker`]: external commands with a hard timeout
//! - [`decode`] / [`request`]: typed REST payloads through `cf curl`
//! - [`fixtures`]: apps, buildpacks and routes as named operations
//! - [`poller`]: bounded fixed-interval convergence polling
//! - [`context`]: suite configuration, user contexts, test org/space
//!
//! Every error is fatal for the scenario that raised it.

pub mod cf;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod decode;
pub mod error;
pub mod fakes;
pub mod fixtures;
pub mod invoker;
pub mod model;
pub mod naming;
pub mod poller;
pub mod request;
pub mod scenario;
pub mod telemetry;

// Re-export key types
pub use cf::Cf;
pub use cleanup::{Cleanup, CleanupStep};
pub use config::{Backend, PollSettings, SuiteConfig};
pub use context::SuiteContext;
pub use error::{HarnessError, HarnessResult};
pub use fixtures::Fixtures;
pub use invoker::{CommandRunner, Invocation, InvocationResult, ProcessRunner};
pub use model::{
    AppRecord, BuildpackRecord, InstanceCount, InstanceSample, RouteRecord, StatsSample,
};
pub use poller::{poll_until, Converged, PollPolicy};
pub use scenario::ScenarioOutcome;
pub use telemetry::init_tracing;

/// RATS version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
