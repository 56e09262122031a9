// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::adapters::db::{BackupStore, BackupStoreError};
use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{ClaimOutcome, HostStorePort, JobStorePort};
use crate::app::types::{
    BackupDestination, BackupJob, ConnectivityStatus, JobStatus, NewBackupJob, NewDestination,
    NewHost, RemoteHost, RunOutcome,
};

#[derive(Clone)]
pub struct SqliteStoreAdapter {
    store: Arc<BackupStore>,
}

impl SqliteStoreAdapter {
    pub fn new(store: BackupStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Keeps sqlx and schema details out of the application core.
fn map_store_error(err: BackupStoreError) -> AppError {
    match err {
        BackupStoreError::EmptyName | BackupStoreError::EmptyCommand => AppError::with_message(
            AppErrorKind::InvalidArgument,
            codes::INVALID_ARGUMENT,
            err.to_string(),
        ),
        BackupStoreError::Corrupt { .. } | BackupStoreError::Timestamp(_) => {
            AppError::with_message(AppErrorKind::Internal, codes::INTERNAL_ERROR, err.to_string())
        }
        BackupStoreError::Sqlx(inner) => {
            tracing::error!("database error: {inner}");
            AppError::new(AppErrorKind::Internal, codes::INTERNAL_ERROR)
        }
    }
}

#[async_trait]
impl HostStorePort for SqliteStoreAdapter {
    async fn insert_host(&self, host: &NewHost) -> AppResult<i64> {
        self.store.insert_host(host).await.map_err(map_store_error)
    }

    async fn get_host(&self, id: i64) -> AppResult<Option<RemoteHost>> {
        self.store.get_host(id).await.map_err(map_store_error)
    }

    async fn list_hosts(&self) -> AppResult<Vec<RemoteHost>> {
        self.store.list_hosts().await.map_err(map_store_error)
    }

    async fn update_connectivity(
        &self,
        id: i64,
        status: ConnectivityStatus,
        checked_at: OffsetDateTime,
    ) -> AppResult<()> {
        self.store
            .update_host_connectivity(id, status, checked_at)
            .await
            .map_err(map_store_error)
    }
}

#[async_trait]
impl JobStorePort for SqliteStoreAdapter {
    async fn insert_job(&self, job: &NewBackupJob) -> AppResult<i64> {
        self.store.insert_job(job).await.map_err(map_store_error)
    }

    async fn get_job(&self, id: i64) -> AppResult<Option<BackupJob>> {
        self.store.get_job(id).await.map_err(map_store_error)
    }

    async fn list_jobs_with_status(&self, status: JobStatus) -> AppResult<Vec<BackupJob>> {
        self.store
            .list_jobs_with_status(status)
            .await
            .map_err(map_store_error)
    }

    async fn host_has_running_job(&self, host_id: i64, excluding_job_id: i64) -> AppResult<bool> {
        self.store
            .host_has_running_job(host_id, excluding_job_id)
            .await
            .map_err(map_store_error)
    }

    async fn claim_job(&self, id: i64, now: OffsetDateTime) -> AppResult<ClaimOutcome> {
        self.store.claim_job(id, now).await.map_err(map_store_error)
    }

    async fn record_weekly_dispatch(&self, id: i64, now: OffsetDateTime) -> AppResult<()> {
        self.store
            .record_weekly_dispatch(id, now)
            .await
            .map_err(map_store_error)
    }

    async fn touch_heartbeat(&self, id: i64, now: OffsetDateTime) -> AppResult<()> {
        self.store
            .touch_heartbeat(id, now)
            .await
            .map_err(map_store_error)
    }

    async fn reset_stale_job(
        &self,
        id: i64,
        observed_heartbeat: OffsetDateTime,
        reason: &str,
    ) -> AppResult<bool> {
        self.store
            .reset_stale_job(id, observed_heartbeat, reason)
            .await
            .map_err(map_store_error)
    }

    async fn finish_job(
        &self,
        id: i64,
        started_at: Option<OffsetDateTime>,
        outcome: RunOutcome,
        failure_reason: Option<&str>,
        finished_at: OffsetDateTime,
    ) -> AppResult<bool> {
        self.store
            .finish_job(id, started_at, outcome, failure_reason, finished_at)
            .await
            .map_err(map_store_error)
    }

    async fn insert_destination(&self, destination: &NewDestination) -> AppResult<i64> {
        self.store
            .insert_destination(destination)
            .await
            .map_err(map_store_error)
    }

    async fn get_destination(&self, id: i64) -> AppResult<Option<BackupDestination>> {
        self.store
            .get_destination(id)
            .await
            .map_err(map_store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_invalid_argument() {
        let err = map_store_error(BackupStoreError::EmptyCommand);
        assert_eq!(err.kind(), AppErrorKind::InvalidArgument);
        assert_eq!(err.code(), codes::INVALID_ARGUMENT);

        let err = map_store_error(BackupStoreError::Corrupt {
            column: "status",
            value: "bogus".into(),
        });
        assert_eq!(err.code(), codes::INTERNAL_ERROR);
        assert!(err.message().contains("bogus"));
    }
}
