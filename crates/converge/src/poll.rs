//! Bounded polling for long-running operations and delete confirmation.

use crate::error::{Error, ProviderError, ProviderErrorKind, Result};
use crate::provider::Provider;
use crate::types::{PendingOperation, PollStatus, ResourceKey};
use serde_json::Value;
use std::thread;
use std::time::Duration;

/// How often and how long to wait.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second poll
    pub interval: Duration,
    /// Polls before giving up
    pub max_attempts: u32,
    /// Multiplier applied to the delay after each poll
    pub backoff_factor: f64,
    /// Upper bound for any single delay, server hints included
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            max_attempts: 90,
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            ..Default::default()
        }
    }

    /// A policy that never sleeps, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts,
            backoff_factor: 1.0,
            max_interval: Duration::ZERO,
        }
    }

    /// Delay after the given 0-indexed attempt, never above `max_interval`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let secs = self.interval.as_secs_f64() * factor;
        let capped = secs.min(self.max_interval.as_secs_f64());
        // A cap near Duration::MAX does not survive the f64 round trip.
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_interval)
    }

    /// Delay to use, preferring a server hint when present.
    pub fn next_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(self.max_interval),
            None => self.delay_for_attempt(attempt),
        }
    }
}

/// Notified before each wait.
pub trait PollCallback {
    /// `attempt` is 1-indexed; `what` names the awaited operation.
    fn on_wait(
        &self,
        resource: &ResourceKey,
        what: &str,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    );
}

/// No-op callback.
pub struct NoCallback;

impl PollCallback for NoCallback {
    fn on_wait(&self, _: &ResourceKey, _: &str, _: u32, _: u32, _: Duration) {}
}

/// Callback that logs each wait at debug level.
pub struct LogCallback;

impl PollCallback for LogCallback {
    fn on_wait(
        &self,
        resource: &ResourceKey,
        what: &str,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    ) {
        log::debug!(
            "{resource}: waiting for {what} ({attempt}/{max_attempts}), next check in {}s",
            delay.as_secs()
        );
    }
}

/// Poll a pending operation until it settles.
///
/// Returns the final body when the operation produced one. A reported
/// failure becomes [`Error::ProviderCall`], running out of attempts
/// [`Error::PollTimeout`].
pub fn wait_for_operation<P: Provider + ?Sized>(
    provider: &P,
    key: &ResourceKey,
    operation: &'static str,
    pending: &PendingOperation,
    policy: &PollPolicy,
    callback: &dyn PollCallback,
) -> Result<Option<Value>> {
    let mut hint = pending.retry_after;

    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            let delay = policy.next_delay(attempt - 1, hint);
            callback.on_wait(key, operation, attempt, policy.max_attempts, delay);
            thread::sleep(delay);
        }

        let status = provider
            .poll(pending)
            .map_err(|source| Error::ProviderCall {
                resource: key.to_string(),
                operation,
                source,
            })?;

        match status {
            PollStatus::Succeeded(body) => return Ok(body),
            PollStatus::Failed(message) => {
                return Err(Error::ProviderCall {
                    resource: key.to_string(),
                    operation,
                    source: ProviderError::new(ProviderErrorKind::Server, message),
                });
            }
            PollStatus::InProgress { retry_after } => {
                log::debug!("{key}: {operation} still in progress");
                hint = retry_after;
            }
        }
    }

    Err(Error::PollTimeout {
        resource: key.to_string(),
        operation,
        attempts: policy.max_attempts,
    })
}

/// Re-fetch until the resource is gone.
///
/// Lookup failures during the wait are treated as provider failures of the
/// delete confirmation, not as "gone".
pub fn wait_until_absent<P: Provider + ?Sized>(
    provider: &P,
    key: &ResourceKey,
    policy: &PollPolicy,
    callback: &dyn PollCallback,
) -> Result<()> {
    const OPERATION: &str = "delete confirmation";

    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            let delay = policy.delay_for_attempt(attempt - 1);
            callback.on_wait(key, OPERATION, attempt, policy.max_attempts, delay);
            thread::sleep(delay);
        }

        let found = provider.get(key).map_err(|source| Error::ProviderCall {
            resource: key.to_string(),
            operation: OPERATION,
            source,
        })?;

        if found.is_none() {
            return Ok(());
        }
        log::debug!("{key}: still present after delete");
    }

    Err(Error::PollTimeout {
        resource: key.to_string(),
        operation: OPERATION,
        attempts: policy.max_attempts,
    })
}
