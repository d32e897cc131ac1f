//! Retry and propagation polling
//!
//! Two budgets are applied around remote calls:
//!
//! - transient failures (throttling, 5xx, network) are retried with
//!   exponential backoff up to `max_attempts`
//! - after a successful write, reads are polled up to
//!   `propagation_attempts` times until the expected state is visible

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::ssoadmin::arn::InstanceArn;
use crate::ssoadmin::error::ApiError;

/// Retry budget for one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per remote call when failures are transient
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Cap for any single delay
    pub max_delay_ms: u64,
    /// Growth factor between delays
    pub multiplier: u32,
    /// Reads allowed for a write to become visible
    pub propagation_attempts: u32,
    /// Deadline for a whole operation, if any
    pub operation_timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            multiplier: 2,
            propagation_attempts: 10,
            operation_timeout_ms: None,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let factor = u64::from(self.multiplier.max(1)).saturating_pow(exponent);
        let millis = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout_ms =
            timeout.map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

/// Why a retried call gave up
#[derive(Debug)]
pub enum RetryFailure {
    /// A non-transient error, returned unmodified
    Fatal(ApiError),
    /// Transient errors until the budget ran out
    Exhausted { attempts: u32, last: ApiError },
}

impl RetryFailure {
    /// Map into the reconciler taxonomy
    pub fn into_reconcile_error(self, arn: &InstanceArn, operation: &'static str) -> ReconcileError {
        match self {
            Self::Fatal(source) => ReconcileError::Api {
                arn: arn.to_string(),
                operation,
                source,
            },
            Self::Exhausted { attempts, last } => ReconcileError::Transient {
                arn: arn.to_string(),
                operation,
                attempts,
                source: last,
            },
        }
    }
}

/// Run `call`, retrying transient failures with backoff
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    arn: &InstanceArn,
    mut call: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(RetryFailure::Fatal(err)),
            Err(err) if attempt >= max_attempts => {
                warn!(%arn, operation, attempts = attempt, error = %err, "Retry budget exhausted");
                return Err(RetryFailure::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    %arn,
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Poll `check` until it yields a value or the propagation budget runs out
///
/// `check` returns `Ok(None)` while the expected state is not yet visible.
pub async fn wait_for_propagation<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    arn: &InstanceArn,
    mut check: F,
) -> Result<T, ReconcileError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ReconcileError>>,
{
    let attempts = policy.propagation_attempts.max(1);

    for attempt in 1..=attempts {
        if let Some(value) = check().await? {
            debug!(%arn, operation, attempt, "Change visible");
            return Ok(value);
        }
        if attempt < attempts {
            let delay = policy.delay_for(attempt);
            debug!(
                %arn,
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Change not yet visible"
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(ReconcileError::PropagationTimeout {
        arn: arn.to_string(),
        operation,
        attempts,
    })
}

/// Apply the policy's operation deadline to `fut`
pub async fn with_deadline<T, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    arn: &InstanceArn,
    fut: Fut,
) -> Result<T, ReconcileError>
where
    Fut: Future<Output = Result<T, ReconcileError>>,
{
    match policy.operation_timeout() {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .unwrap_or_else(|_| {
                Err(ReconcileError::Timeout {
                    arn: arn.to_string(),
                    operation,
                    after,
                })
            }),
        None => fut.await,
    }
}
