// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::app::errors::AppResult;
use crate::app::types::{
    BackupDestination, BackupJob, JobStatus, NewBackupJob, NewDestination, RunOutcome,
};

/// Result of an atomic attempt to move a job from Ready to Running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    /// The job was not Ready; carries the status it had instead.
    NotReady(JobStatus),
    /// Another job on the same host is Running.
    HostBusy,
    Missing,
}

#[async_trait]
pub trait JobStorePort: Send + Sync {
    async fn insert_job(&self, job: &NewBackupJob) -> AppResult<i64>;
    async fn get_job(&self, id: i64) -> AppResult<Option<BackupJob>>;
    async fn list_jobs_with_status(&self, status: JobStatus) -> AppResult<Vec<BackupJob>>;
    async fn host_has_running_job(&self, host_id: i64, excluding_job_id: i64) -> AppResult<bool>;
    /// Ready -> Running guarded by per-host exclusivity in a single statement.
    /// Records `now` as both the start time and the first heartbeat.
    async fn claim_job(&self, id: i64, now: OffsetDateTime) -> AppResult<ClaimOutcome>;
    async fn record_weekly_dispatch(&self, id: i64, now: OffsetDateTime) -> AppResult<()>;
    async fn touch_heartbeat(&self, id: i64, now: OffsetDateTime) -> AppResult<()>;
    /// Running -> Ready, recorded as failed with `reason`, provided the
    /// heartbeat still equals `observed_heartbeat`. Returns false when the
    /// job moved on in the meantime.
    async fn reset_stale_job(
        &self,
        id: i64,
        observed_heartbeat: OffsetDateTime,
        reason: &str,
    ) -> AppResult<bool>;
    /// Records the outcome of the run claimed at `started_at`; false when the
    /// job has been claimed again since and the write was skipped.
    async fn finish_job(
        &self,
        id: i64,
        started_at: Option<OffsetDateTime>,
        outcome: RunOutcome,
        failure_reason: Option<&str>,
        finished_at: OffsetDateTime,
    ) -> AppResult<bool>;
    async fn insert_destination(&self, destination: &NewDestination) -> AppResult<i64>;
    async fn get_destination(&self, id: i64) -> AppResult<Option<BackupDestination>>;
}
