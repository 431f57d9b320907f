//! Convergence polling: bounded fixed-interval retry until a predicate holds.
//!
//! Uses `tokio::time`, so tests drive it with a paused clock instead of real
//! sleeps.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::config::DEFAULT_TIMEOUT;
use crate::error::{HarnessError, HarnessResult};

/// Sleep between samples when nothing else is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Shortest sleep between samples; smaller intervals are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Deadline = base timeout times this, when nothing else is configured.
pub const DEFAULT_DEADLINE_MULTIPLIER: u32 = 2;

/// Interval and overall deadline for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed sleep between samples (no backoff), at least [`MIN_POLL_INTERVAL`].
    pub interval: Duration,
    /// Total time after which the loop gives up.
    pub deadline: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            deadline,
        }
    }

    /// Deadline derived from a base per-call timeout.
    pub fn from_base(base: Duration, multiplier: u32, interval: Duration) -> Self {
        Self::new(interval, base.saturating_mul(multiplier))
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_base(DEFAULT_TIMEOUT, DEFAULT_DEADLINE_MULTIPLIER, DEFAULT_POLL_INTERVAL)
    }
}

/// A sample that satisfied the predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converged<T> {
    pub value: T,
    /// Samples taken, including the satisfying one.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Sample with `fetch` until `predicate` holds or `policy.deadline` is reached.
///
/// Returns on the first satisfying sample without sleeping. Errors from
/// `fetch` are not retried. On expiry the last sample is reported in
/// [`HarnessError::ConvergenceTimeout`] through its `Display`. The final
/// sample is taken at the deadline, never past it.
pub async fn poll_until<T, F, Fut, P>(
    policy: &PollPolicy,
    description: &str,
    mut fetch: F,
    predicate: P,
) -> HarnessResult<Converged<T>>
where
    T: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = HarnessResult<T>>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let value = fetch().await?;

        if predicate(&value) {
            let elapsed = start.elapsed();
            debug!(description, attempts, ?elapsed, "converged");
            return Ok(Converged {
                value,
                attempts,
                elapsed,
            });
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.deadline {
            return Err(HarnessError::ConvergenceTimeout {
                description: description.to_string(),
                deadline: policy.deadline,
                attempts,
                last_observed: value.to_string(),
            });
        }

        debug!(description, attempts, observed = %value, "not converged yet");
        let interval = policy.interval.max(MIN_POLL_INTERVAL);
        tokio::time::sleep(interval.min(policy.deadline - elapsed)).await;
    }
}
