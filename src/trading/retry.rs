//! Retry policy and the cancellable iteration driver
//!
//! Every long-running strategy is a loop of iterations behind a fault
//! boundary: an iteration error is logged, the loop waits a fixed delay
//! and goes on. Errors whose kind is in the abort filter, configuration
//! errors and cancellation end the loop instead.

use backoff::backoff::{Backoff, Constant};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Error, ErrorKind, Result};

/// How many iterations a driver runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempts {
    Limited(u64),
    Infinite,
}

impl Attempts {
    fn allows(&self, completed: u64) -> bool {
        match self {
            Attempts::Limited(n) => completed < *n,
            Attempts::Infinite => true,
        }
    }
}

impl From<Option<u64>> for Attempts {
    fn from(limit: Option<u64>) -> Self {
        limit.map_or(Attempts::Infinite, Attempts::Limited)
    }
}

/// Iteration count, pacing and abort filter for a strategy loop
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: Attempts,
    pub success_delay: Duration,
    pub error_delay: Duration,
    abort_on: Vec<ErrorKind>,
}

impl RetryPolicy {
    pub fn new(attempts: Attempts, success_delay: Duration, error_delay: Duration) -> Self {
        Self {
            attempts,
            success_delay,
            error_delay,
            abort_on: Vec::new(),
        }
    }

    /// Stop the loop on errors of this kind instead of retrying
    pub fn abort_on(mut self, kind: ErrorKind) -> Self {
        if !self.abort_on.contains(&kind) {
            self.abort_on.push(kind);
        }
        self
    }

    /// Configuration errors always abort
    pub fn should_abort(&self, e: &Error) -> bool {
        e.is_fatal() || self.abort_on.contains(&e.kind())
    }

    fn delays(&self) -> (Constant, Constant) {
        (Constant::new(self.success_delay), Constant::new(self.error_delay))
    }
}

/// What a driver did before it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveReport {
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: bool,
    pub last_error: Option<String>,
}

impl DriveReport {
    pub fn iterations(&self) -> u64 {
        self.succeeded + self.failed
    }
}

/// Sleep for `duration` unless cancelled first; returns false on cancel
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Run `iteration` under `policy` until attempts are used up, an aborting
/// error occurs or `cancel` fires. The stop signal is checked before each
/// iteration and during every wait.
pub async fn drive<F, Fut, T>(
    name: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut iteration: F,
) -> Result<DriveReport>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let (mut on_success, mut on_error) = policy.delays();
    let mut report = DriveReport::default();

    while policy.attempts.allows(report.iterations()) {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let n = report.iterations() + 1;
        info!("{} iteration {}", name, n);

        let wait = match iteration(n).await {
            Ok(_) => {
                report.succeeded += 1;
                on_success.next_backoff()
            }
            Err(e) if e.kind() == ErrorKind::Cancelled => {
                report.cancelled = true;
                break;
            }
            Err(e) if policy.should_abort(&e) => {
                error!("{} aborted on iteration {}: {}", name, n, e);
                return Err(e);
            }
            Err(e) => {
                warn!("{} iteration {} failed: {}", name, n, e);
                report.failed += 1;
                report.last_error = Some(e.to_string());
                on_error.next_backoff()
            }
        };

        if !policy.attempts.allows(report.iterations()) {
            break;
        }
        if let Some(delay) = wait {
            if !pause(delay, cancel).await {
                report.cancelled = true;
                break;
            }
        }
    }

    if report.cancelled {
        info!("{} stopped after {} iterations", name, report.iterations());
    }
    Ok(report)
}
