// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::services::schedule::check_schedule;
use crate::app::types::{JobStatus, NewBackupJob, NewDestination, NewHost};

use super::UseCases;

fn invalid(message: impl Into<String>) -> AppError {
    AppError::with_message(
        AppErrorKind::InvalidArgument,
        codes::INVALID_ARGUMENT,
        message,
    )
}

impl UseCases {
    pub async fn register_host(&self, host: NewHost) -> AppResult<i64> {
        if host.address.trim().is_empty() || host.username.trim().is_empty() {
            return Err(invalid("host address and username are required"));
        }
        if host.port == 0 {
            return Err(invalid("host port must be between 1 and 65535"));
        }
        let id = self.hosts.insert_host(&host).await?;
        tracing::info!(host_id = id, address = %host.address, "host registered");
        Ok(id)
    }

    pub async fn register_destination(&self, destination: NewDestination) -> AppResult<i64> {
        let bucket = destination.bucket.trim();
        if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
            return Err(invalid(format!("invalid bucket name '{}'", destination.bucket)));
        }
        // Backend-specific naming rules.
        self.storage.check_bucket(bucket)?;
        if destination.keep_last == Some(0) {
            return Err(invalid("keep_last must be at least 1 when set"));
        }
        let id = self.jobs.insert_destination(&destination).await?;
        tracing::info!(destination_id = id, bucket = %destination.bucket, "destination registered");
        Ok(id)
    }

    /// Stores a new job after checking that it references existing records
    /// and that its schedule can ever become due. New jobs always start Ready
    /// without run history.
    pub async fn register_job(&self, job: NewBackupJob) -> AppResult<i64> {
        check_schedule(
            job.frequency,
            job.time_to_run_at.as_deref(),
            job.custom_cron_expression.as_deref(),
        )
        .map_err(|reason| invalid(format!("unusable schedule: {reason}")))?;
        if job.owner_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(invalid("owner UTC offset must be within +/-23:59"));
        }
        self.load_host(job.host_id).await?;
        self.load_destination(job.destination_id).await?;

        let job = NewBackupJob {
            status: JobStatus::Ready,
            last_scheduled_weekly_run_at: None,
            last_script_update_at: None,
            webhook_token: job.webhook_token.filter(|token| !token.is_empty()),
            ..job
        };
        let id = self.jobs.insert_job(&job).await?;
        tracing::info!(job_id = id, frequency = job.frequency.as_str(), "backup job registered");
        Ok(id)
    }
}
