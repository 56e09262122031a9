// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{ClaimOutcome, NotificationSubject};
use crate::app::services::schedule::{self, NotDue};
use crate::app::types::{BackupJob, Frequency, JobStatus, RunOutcome};

use super::UseCases;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub dispatched: Vec<i64>,
    pub skipped_busy: Vec<i64>,
}

/// Why a job is being started; only scheduled starts advance the weekly cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartReason {
    Schedule,
    Webhook,
}

impl UseCases {
    /// One scheduler sweep: start every due Ready job whose host is idle.
    #[tracing::instrument(name = "scheduler", level = "debug", skip(self))]
    pub async fn run_scheduler_tick(&self) -> AppResult<TickReport> {
        let now = self.clock.now_utc();
        let mut report = TickReport::default();
        for job in self.jobs.list_jobs_with_status(JobStatus::Ready).await? {
            match schedule::due_at(&job, now) {
                Ok(()) => {}
                Err(NotDue::Invalid(reason)) => {
                    tracing::warn!(job_id = job.id, "schedule is unusable, never due: {reason}");
                    continue;
                }
                Err(_) => continue,
            }
            if self.jobs.host_has_running_job(job.host_id, job.id).await? {
                tracing::info!(
                    job_id = job.id,
                    host_id = job.host_id,
                    "due but another job is running on the host; skipping"
                );
                report.skipped_busy.push(job.id);
                continue;
            }
            match self.start_job(&job, now, StartReason::Schedule).await {
                Ok(ClaimOutcome::Claimed) => report.dispatched.push(job.id),
                Ok(ClaimOutcome::HostBusy) => {
                    tracing::info!(job_id = job.id, "host became busy before claim; skipping");
                    report.skipped_busy.push(job.id);
                }
                Ok(other) => tracing::debug!(job_id = job.id, "not started: {other:?}"),
                Err(err) => tracing::warn!(job_id = job.id, "failed to start job: {err}"),
            }
        }
        if !report.dispatched.is_empty() {
            tracing::info!(dispatched = ?report.dispatched, "scheduler tick dispatched jobs");
        }
        Ok(report)
    }

    /// Claims the job, then hands it to the worker queue. A claim that cannot
    /// be dispatched is rolled back to Ready as a failed run.
    pub(crate) async fn start_job(
        &self,
        job: &BackupJob,
        now: OffsetDateTime,
        reason: StartReason,
    ) -> AppResult<ClaimOutcome> {
        let outcome = self.jobs.claim_job(job.id, now).await?;
        if outcome != ClaimOutcome::Claimed {
            return Ok(outcome);
        }
        if reason == StartReason::Schedule && job.frequency == Frequency::Weekly {
            self.jobs.record_weekly_dispatch(job.id, now).await?;
        }
        self.notify_job_status(job.id, JobStatus::Running);

        if let Err(err) = self.dispatcher.dispatch(job.id).await {
            tracing::error!(job_id = job.id, "dispatch failed: {err}");
            let reason = format!("could not be dispatched: {err}");
            self.jobs
                .finish_job(job.id, Some(now), RunOutcome::Failed, Some(&reason), now)
                .await?;
            self.notify_job_status(job.id, JobStatus::Ready);
            return Err(err);
        }
        tracing::debug!(job_id = job.id, ?reason, "job dispatched");
        Ok(outcome)
    }

    /// Claims a Ready job and executes it in the caller's task, bypassing the
    /// worker queue and the schedule.
    pub async fn run_job_now(&self, job_id: i64) -> AppResult<RunOutcome> {
        let job = self.load_job(job_id).await?;
        match self.jobs.claim_job(job.id, self.clock.now_utc()).await? {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::Missing => {
                return Err(AppError::not_found(format!("backup job {job_id}")));
            }
            ClaimOutcome::HostBusy => {
                return Err(AppError::with_message(
                    AppErrorKind::Conflict,
                    codes::CONFLICT,
                    format!("another job is running on host {}", job.host_id),
                ));
            }
            ClaimOutcome::NotReady(status) => {
                return Err(AppError::with_message(
                    AppErrorKind::Conflict,
                    codes::CONFLICT,
                    format!("backup job {job_id} is {status}"),
                ));
            }
        }
        self.notify_job_status(job.id, JobStatus::Running);
        self.execute_job(job.id).await
    }

    /// Resets Running jobs whose heartbeat is older than the inoperative
    /// threshold. Jobs that have not reported a heartbeat are left alone.
    #[tracing::instrument(name = "watchdog", level = "debug", skip(self))]
    pub async fn run_watchdog(&self) -> AppResult<Vec<i64>> {
        let now = self.clock.now_utc();
        let stale_before = now - self.settings.inoperative_threshold;
        let mut reset = Vec::new();
        for job in self.jobs.list_jobs_with_status(JobStatus::Running).await? {
            let Some(heartbeat) = job.last_script_update_at else {
                continue;
            };
            if heartbeat >= stale_before {
                continue;
            }
            let since = heartbeat.format(&Rfc3339).unwrap_or_else(|_| heartbeat.to_string());
            let reason = format!("abandoned: no progress reported since {since}");
            if !self.jobs.reset_stale_job(job.id, heartbeat, &reason).await? {
                continue;
            }
            tracing::warn!(job_id = job.id, heartbeat = %since, "reset inoperative job");
            self.notify_job_status(job.id, JobStatus::Ready);
            self.tell_owner(
                NotificationSubject::Job(job.id),
                format!("Backup '{}' stopped reporting progress and was reset", job.name),
            );
            reset.push(job.id);
        }
        Ok(reset)
    }
}
