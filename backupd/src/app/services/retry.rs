// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Bounded attempts separated by a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Runs `op` until it succeeds or `policy.attempts` attempts have failed,
/// sleeping `policy.delay` between attempts. The delay does not grow and has
/// no jitter. Returns the last error once attempts are exhausted, or at once
/// when `retryable` rejects it.
///
/// `state` is lent to each attempt so the operation can borrow long-lived
/// resources such as a remote session mutably.
pub async fn retry_with_backoff<S, T, E, R, F>(
    state: &mut S,
    policy: RetryPolicy,
    label: &str,
    retryable: R,
    mut op: F,
) -> Result<T, E>
where
    S: ?Sized,
    E: Display,
    R: Fn(&E) -> bool,
    F: for<'a> FnMut(&'a mut S, u32) -> BoxFuture<'a, Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(state, attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(op = label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !retryable(&err) => {
                tracing::warn!(op = label, attempt, "not retryable: {err}");
                return Err(err);
            }
            Err(err) if attempt < attempts => {
                tracing::warn!(
                    op = label,
                    attempt,
                    attempts,
                    delay_secs = policy.delay.as_secs_f64(),
                    "attempt failed, retrying: {err}"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => {
                tracing::warn!(op = label, attempt, attempts, "giving up: {err}");
                return Err(err);
            }
        }
    }
}
