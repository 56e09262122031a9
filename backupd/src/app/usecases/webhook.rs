// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::AppResult;
use crate::app::ports::ClaimOutcome;
use crate::app::services::rate_limit::RateDecision;
use crate::app::types::JobStatus;

use super::UseCases;
use super::scheduling::StartReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    Paused,
    AlreadyRunning,
    HostBusy,
}

impl ConflictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictReason::Paused => "job is paused",
            ConflictReason::AlreadyRunning => "job is already running",
            ConflictReason::HostBusy => "another job is running on the same host",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Accepted,
    NotFound,
    RateLimited { retry_after_secs: u64 },
    Forbidden,
    Conflict(ConflictReason),
}

fn tokens_match(expected: &str, given: &str) -> bool {
    let (expected, given) = (expected.as_bytes(), given.as_bytes());
    if expected.len() != given.len() {
        return false;
    }
    expected
        .iter()
        .zip(given)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

impl UseCases {
    /// Starts a job on behalf of an external caller holding its webhook token.
    ///
    /// Checks run in a fixed order: existence, rate limit, token, job state,
    /// host exclusivity. Only an accepted request changes job state.
    #[tracing::instrument(name = "webhook", level = "debug", skip(self, token))]
    pub async fn trigger_from_webhook(
        &self,
        job_id: i64,
        token: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let Some(job) = self.jobs.get_job(job_id).await? else {
            return Ok(WebhookOutcome::NotFound);
        };
        let now = self.clock.now_utc();
        if let RateDecision::Limited { retry_after_secs } =
            self.webhook_limiter.check(job_id, now)
        {
            tracing::info!(job_id, retry_after_secs, "webhook rate limited");
            return Ok(WebhookOutcome::RateLimited { retry_after_secs });
        }
        let authorized = matches!(
            (job.webhook_token.as_deref(), token),
            (Some(expected), Some(given)) if !expected.is_empty() && tokens_match(expected, given)
        );
        if !authorized {
            tracing::warn!(job_id, "webhook rejected: bad token");
            return Ok(WebhookOutcome::Forbidden);
        }
        match job.status {
            JobStatus::Paused => return Ok(WebhookOutcome::Conflict(ConflictReason::Paused)),
            JobStatus::Running => {
                return Ok(WebhookOutcome::Conflict(ConflictReason::AlreadyRunning));
            }
            JobStatus::Ready => {}
        }
        if self.jobs.host_has_running_job(job.host_id, job.id).await? {
            return Ok(WebhookOutcome::Conflict(ConflictReason::HostBusy));
        }

        let outcome = match self.start_job(&job, now, StartReason::Webhook).await? {
            ClaimOutcome::Claimed => WebhookOutcome::Accepted,
            ClaimOutcome::HostBusy => WebhookOutcome::Conflict(ConflictReason::HostBusy),
            ClaimOutcome::NotReady(JobStatus::Paused) => {
                WebhookOutcome::Conflict(ConflictReason::Paused)
            }
            ClaimOutcome::NotReady(_) => WebhookOutcome::Conflict(ConflictReason::AlreadyRunning),
            ClaimOutcome::Missing => WebhookOutcome::NotFound,
        };
        if outcome == WebhookOutcome::Accepted {
            tracing::info!(job_id, "webhook accepted");
        }
        Ok(outcome)
    }
}
