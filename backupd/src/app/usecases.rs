// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;
use std::sync::Arc;

use time::Duration as TimeDuration;

use crate::app::errors::{AppError, AppResult};
use crate::app::ports::{
    ClockPort, CredentialStorePort, HostStorePort, JobDispatchPort, JobStorePort,
    NotificationPort, NotificationSubject, ObjectStorageProvider, StatusEvent,
};
use crate::app::services::rate_limit::FixedWindowRateLimiter;
use crate::app::services::retry::RetryPolicy;
use crate::app::services::sessions::SessionFactory;
use crate::app::types::{
    BackupDestination, BackupJob, ConnectivityStatus, JobStatus, RemoteHost,
};

mod backups;
mod catalog;
mod execution;
mod hosts;
mod scheduling;
mod webhook;

pub use webhook::WebhookOutcome;

/// Tunables resolved from configuration at startup.
#[derive(Debug, Clone)]
pub struct UseCaseSettings {
    pub transfer_policy: RetryPolicy,
    pub inoperative_threshold: TimeDuration,
    /// Minimum spacing between heartbeat writes while a job streams output,
    /// and the timer period while it transfers.
    pub heartbeat_interval: TimeDuration,
    pub staging_dir: PathBuf,
}

#[derive(Clone)]
pub struct UseCases {
    pub(crate) jobs: Arc<dyn JobStorePort>,
    pub(crate) hosts: Arc<dyn HostStorePort>,
    pub(crate) sessions: SessionFactory,
    pub(crate) storage: Arc<dyn ObjectStorageProvider>,
    pub(crate) credentials: Arc<dyn CredentialStorePort>,
    pub(crate) notifier: Arc<dyn NotificationPort>,
    pub(crate) dispatcher: Arc<dyn JobDispatchPort>,
    pub(crate) clock: Arc<dyn ClockPort>,
    pub(crate) webhook_limiter: Arc<FixedWindowRateLimiter>,
    pub(crate) settings: Arc<UseCaseSettings>,
}

impl UseCases {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn JobStorePort>,
        hosts: Arc<dyn HostStorePort>,
        sessions: SessionFactory,
        storage: Arc<dyn ObjectStorageProvider>,
        credentials: Arc<dyn CredentialStorePort>,
        notifier: Arc<dyn NotificationPort>,
        dispatcher: Arc<dyn JobDispatchPort>,
        clock: Arc<dyn ClockPort>,
        webhook_limiter: FixedWindowRateLimiter,
        settings: UseCaseSettings,
    ) -> Self {
        Self {
            jobs,
            hosts,
            sessions,
            storage,
            credentials,
            notifier,
            dispatcher,
            clock,
            webhook_limiter: Arc::new(webhook_limiter),
            settings: Arc::new(settings),
        }
    }

    async fn load_job(&self, id: i64) -> AppResult<BackupJob> {
        self.jobs
            .get_job(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("backup job {id}")))
    }

    async fn load_host(&self, id: i64) -> AppResult<RemoteHost> {
        self.hosts
            .get_host(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("host {id}")))
    }

    async fn load_destination(&self, id: i64) -> AppResult<BackupDestination> {
        self.jobs
            .get_destination(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("destination {id}")))
    }

    /// Persists a connectivity change and emits exactly one event for it.
    async fn set_host_connectivity(
        &self,
        host_id: i64,
        status: ConnectivityStatus,
        reason: Option<String>,
    ) -> AppResult<()> {
        self.hosts
            .update_connectivity(host_id, status, self.clock.now_utc())
            .await?;
        self.notifier.publish(StatusEvent::HostConnectivity {
            host_id,
            status,
            reason,
        });
        Ok(())
    }

    fn notify_job_status(&self, job_id: i64, status: JobStatus) {
        self.notifier
            .publish(StatusEvent::JobStatus { job_id, status });
    }

    fn tell_owner(&self, subject: NotificationSubject, message: impl Into<String>) {
        self.notifier.publish(StatusEvent::OwnerMessage {
            subject,
            message: message.into(),
        });
    }
}
