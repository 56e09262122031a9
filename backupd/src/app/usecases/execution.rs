// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{NotificationSubject, ObjectStoragePort, RemoteSession, SessionProtocol};
use crate::app::services::shell::sh_escape;
use crate::app::services::transfer::{self, TransferReceipt};
use crate::app::types::{
    BackupDestination, BackupJob, ConnectivityStatus, JobStatus, RunOutcome,
};

use super::UseCases;

const MIN_HEARTBEAT_PERIOD: Duration = Duration::from_millis(10);

/// The archive path is the last non-empty line the backup command prints.
fn archive_path_from_output(output: &[u8]) -> AppResult<String> {
    let text = String::from_utf8_lossy(output);
    text.lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::with_message(
                AppErrorKind::Aborted,
                codes::COMMAND_FAILURE,
                "backup command did not print an archive path",
            )
        })
}

fn archive_file_name(archive: &str) -> AppResult<String> {
    Path::new(archive)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::with_message(
                AppErrorKind::Aborted,
                codes::COMMAND_FAILURE,
                format!("'{archive}' is not a file path"),
            )
        })
}

impl UseCases {
    /// Runs a claimed job end to end and records the outcome.
    ///
    /// Returns `Ok` with the outcome whenever the job could be bookkept,
    /// including failed runs; `Err` means the job was not in a runnable state.
    #[tracing::instrument(name = "execute", level = "info", skip(self))]
    pub async fn execute_job(&self, job_id: i64) -> AppResult<RunOutcome> {
        let job = self.load_job(job_id).await?;
        if job.status != JobStatus::Running {
            return Err(AppError::with_message(
                AppErrorKind::Conflict,
                codes::CONFLICT,
                format!("backup job {job_id} is {} and cannot be executed", job.status),
            ));
        }

        let result = self.perform_backup(&job).await;
        let finished_at = self.clock.now_utc();
        let (outcome, reason) = match &result {
            Ok(receipt) => {
                tracing::info!(job_id, key = %receipt.key, bytes = receipt.bytes, "backup stored");
                (RunOutcome::Succeeded, None)
            }
            Err(err) => {
                tracing::warn!(job_id, code = err.code(), "backup failed: {err}");
                (RunOutcome::Failed, Some(err.to_string()))
            }
        };
        let recorded = self
            .jobs
            .finish_job(
                job_id,
                job.last_started_at,
                outcome,
                reason.as_deref(),
                finished_at,
            )
            .await?;
        if let Some(reason) = &reason {
            self.tell_owner(
                NotificationSubject::Job(job_id),
                format!("Backup '{}' failed: {reason}", job.name),
            );
        }
        if !recorded {
            tracing::warn!(
                job_id,
                "job was reset and claimed again during this run; outcome not recorded"
            );
            return Ok(outcome);
        }
        let status = self
            .jobs
            .get_job(job_id)
            .await?
            .map_or(JobStatus::Ready, |job| job.status);
        self.notify_job_status(job_id, status);
        Ok(outcome)
    }

    async fn perform_backup(&self, job: &BackupJob) -> AppResult<TransferReceipt> {
        let host = self.load_host(job.host_id).await?;
        let destination = self.load_destination(job.destination_id).await?;
        let storage = self.storage.bucket(&destination)?;

        let connected = self
            .sessions
            .connect_from_host(&host)
            .with_protocol(SessionProtocol::Sftp)
            .establish()
            .await;
        let mut session = match connected {
            Ok(session) => session,
            Err(err) => {
                self.record_connectivity(host.id, ConnectivityStatus::Offline, Some(err.to_string()))
                    .await;
                return Err(err.into());
            }
        };
        if host.connectivity_status != ConnectivityStatus::Online {
            self.record_connectivity(host.id, ConnectivityStatus::Online, None)
                .await;
        }

        let result = self
            .produce_and_store(job, &destination, storage.as_ref(), session.as_mut())
            .await;
        if let Err(err) = session.disconnect().await {
            tracing::debug!(job_id = job.id, "disconnect failed: {err}");
        }
        result
    }

    async fn record_connectivity(
        &self,
        host_id: i64,
        status: ConnectivityStatus,
        reason: Option<String>,
    ) {
        if let Err(err) = self.set_host_connectivity(host_id, status, reason).await {
            tracing::warn!(host_id, "failed to record connectivity: {err}");
        }
    }

    async fn produce_and_store(
        &self,
        job: &BackupJob,
        destination: &BackupDestination,
        storage: &dyn ObjectStoragePort,
        session: &mut dyn RemoteSession,
    ) -> AppResult<TransferReceipt> {
        let archive = self.produce_archive(job, &mut *session).await?;
        let file_name = archive_file_name(&archive)?;
        let prefix = job.storage_prefix(destination);

        // Downloads and uploads print nothing, so the heartbeat runs on a timer.
        let store = async {
            let receipt = transfer::stream_to_destination(
                &mut *session,
                storage,
                &self.settings.staging_dir,
                &archive,
                &file_name,
                &prefix,
                self.settings.transfer_policy,
            )
            .await?;

            if let Err(err) = session.run(&format!("rm -f -- {}", sh_escape(&archive))).await {
                tracing::warn!(job_id = job.id, "failed to remove remote archive: {err}");
            }
            if let Some(keep) = destination.keep_last {
                match self.prune_backups(storage, &prefix, keep).await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(job_id = job.id, removed, "pruned old backups"),
                    Err(err) => tracing::warn!(job_id = job.id, "retention failed: {err}"),
                }
            }
            Ok::<_, AppError>(receipt)
        };
        self.with_heartbeat(job.id, self.settings.heartbeat_interval.unsigned_abs(), store)
            .await
    }

    /// Drives `work` to completion, touching the job's heartbeat every `period`.
    async fn with_heartbeat<T>(
        &self,
        job_id: i64,
        period: Duration,
        work: impl Future<Output = T>,
    ) -> T {
        let period = period.max(MIN_HEARTBEAT_PERIOD);
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(work);
        loop {
            tokio::select! {
                result = &mut work => return result,
                _ = ticker.tick() => {
                    let now = self.clock.now_utc();
                    if let Err(err) = self.jobs.touch_heartbeat(job_id, now).await {
                        tracing::warn!(job_id, "failed to record heartbeat: {err}");
                    }
                }
            }
        }
    }

    /// Runs the job's backup command, touching the heartbeat as output
    /// arrives, and returns the archive path it printed.
    async fn produce_archive(
        &self,
        job: &BackupJob,
        session: &mut dyn RemoteSession,
    ) -> AppResult<String> {
        let (beat_tx, mut beat_rx) = mpsc::unbounded_channel::<()>();
        let mut output = Vec::new();
        let output_ref = &mut output;
        let command = job.backup_command.as_str();

        // Owns the sender so the heartbeat loop ends with the command.
        let run = async move {
            let mut on_chunk = |chunk: &[u8]| {
                output_ref.extend_from_slice(chunk);
                let _ = beat_tx.send(());
            };
            session.run_streaming(command, &mut on_chunk).await
        };
        let beats = async {
            let mut last: Option<OffsetDateTime> = None;
            while beat_rx.recv().await.is_some() {
                let now = self.clock.now_utc();
                if last.is_some_and(|at| now - at < self.settings.heartbeat_interval) {
                    continue;
                }
                last = Some(now);
                if let Err(err) = self.jobs.touch_heartbeat(job.id, now).await {
                    tracing::warn!(job_id = job.id, "failed to record heartbeat: {err}");
                }
            }
        };
        let (result, ()) = tokio::join!(run, beats);
        result?;
        archive_path_from_output(&output)
    }
}
