// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use std::{path::Path, str::FromStr, time::Duration};
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

use crate::app::ports::ClaimOutcome;
use crate::app::types::{
    BackupDestination, BackupJob, ConnectivityStatus, JobStatus, NewBackupJob, NewDestination,
    NewHost, RemoteHost, RunOutcome,
};

#[derive(Debug, Error)]
pub enum BackupStoreError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("empty name")]
    EmptyName,
    #[error("empty backup command")]
    EmptyCommand,
    #[error("timestamp cannot be formatted: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("corrupt value in column {column}: {value}")]
    Corrupt { column: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, BackupStoreError>;

const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ','now')";

/// Async SQLite store for hosts, destinations and backup jobs.
#[derive(Clone)]
pub struct BackupStore {
    pool: SqlitePool,
}

impl BackupStore {
    /// Open (or create) a file-backed SQLite DB.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let url = format!("sqlite://{}", path_ref.to_string_lossy());
        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    /// Open an in-memory store (handy for tests).
    #[cfg(test)]
    pub async fn open_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    async fn bootstrap(&self) -> Result<()> {
        // Improve concurrency for file DBs.
        let _ = sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hosts (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL UNIQUE,
              address TEXT NOT NULL,
              port INTEGER NOT NULL DEFAULT 22,
              username TEXT NOT NULL,
              connectivity_status TEXT NOT NULL DEFAULT 'unknown',
              last_checked_at TEXT,
              created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS destinations (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              bucket TEXT NOT NULL,
              prefix TEXT NOT NULL DEFAULT '',
              keep_last INTEGER,
              created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backup_jobs (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL,
              host_id INTEGER NOT NULL REFERENCES hosts(id) ON DELETE CASCADE,
              destination_id INTEGER NOT NULL REFERENCES destinations(id),
              status TEXT NOT NULL DEFAULT 'ready'
                CHECK (status IN ('ready', 'running', 'paused')),
              frequency TEXT NOT NULL
                CHECK (frequency IN ('daily', 'weekly', 'custom')),
              time_to_run_at TEXT,
              custom_cron_expression TEXT,
              owner_utc_offset_minutes INTEGER NOT NULL DEFAULT 0,
              last_scheduled_weekly_run_at TEXT,
              last_run_at TEXT,
              last_started_at TEXT,         -- claim time of the current or latest run
              last_script_update_at TEXT,   -- heartbeat while running
              paused_at TEXT,
              backup_command TEXT NOT NULL,
              webhook_token TEXT,
              last_run_outcome TEXT,
              last_failure_reason TEXT,
              created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
              updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_backup_jobs_host_status ON backup_jobs(host_id, status);",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -- hosts

    pub async fn insert_host(&self, host: &NewHost) -> Result<i64> {
        if host.name.trim().is_empty() {
            return Err(BackupStoreError::EmptyName);
        }
        let res = sqlx::query(
            r#"
            insert into hosts (name, address, port, username)
            values (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&host.name)
        .bind(&host.address)
        .bind(i64::from(host.port))
        .bind(&host.username)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_host(&self, id: i64) -> Result<Option<RemoteHost>> {
        let row = sqlx::query("select * from hosts where id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_host).transpose()
    }

    pub async fn list_hosts(&self) -> Result<Vec<RemoteHost>> {
        let rows = sqlx::query("select * from hosts order by id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_host).collect()
    }

    pub async fn update_host_connectivity(
        &self,
        id: i64,
        status: ConnectivityStatus,
        checked_at: OffsetDateTime,
    ) -> Result<()> {
        sqlx::query(
            r#"
            update hosts
            set connectivity_status = ?1, last_checked_at = ?2
            where id = ?3
            "#,
        )
        .bind(status.as_str())
        .bind(format_ts(checked_at)?)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -- destinations

    pub async fn insert_destination(&self, destination: &NewDestination) -> Result<i64> {
        if destination.name.trim().is_empty() || destination.bucket.trim().is_empty() {
            return Err(BackupStoreError::EmptyName);
        }
        let res = sqlx::query(
            r#"
            insert into destinations (name, bucket, prefix, keep_last)
            values (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&destination.name)
        .bind(&destination.bucket)
        .bind(&destination.prefix)
        .bind(destination.keep_last.map(i64::from))
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_destination(&self, id: i64) -> Result<Option<BackupDestination>> {
        let row = sqlx::query("select * from destinations where id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_destination).transpose()
    }

    // -- jobs

    pub async fn insert_job(&self, job: &NewBackupJob) -> Result<i64> {
        if job.name.trim().is_empty() {
            return Err(BackupStoreError::EmptyName);
        }
        if job.backup_command.trim().is_empty() {
            return Err(BackupStoreError::EmptyCommand);
        }
        let res = sqlx::query(
            r#"
            insert into backup_jobs (
              name, host_id, destination_id, status, frequency, time_to_run_at,
              custom_cron_expression, owner_utc_offset_minutes,
              last_scheduled_weekly_run_at, last_script_update_at, backup_command, webhook_token
            )
            values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&job.name)
        .bind(job.host_id)
        .bind(job.destination_id)
        .bind(job.status.as_str())
        .bind(job.frequency.as_str())
        .bind(job.time_to_run_at.as_deref())
        .bind(job.custom_cron_expression.as_deref())
        .bind(job.owner_utc_offset_minutes)
        .bind(format_opt_ts(job.last_scheduled_weekly_run_at)?)
        .bind(format_opt_ts(job.last_script_update_at)?)
        .bind(&job.backup_command)
        .bind(job.webhook_token.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_job(&self, id: i64) -> Result<Option<BackupJob>> {
        let row = sqlx::query("select * from backup_jobs where id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_job).transpose()
    }

    pub async fn list_jobs_with_status(&self, status: JobStatus) -> Result<Vec<BackupJob>> {
        let rows = sqlx::query("select * from backup_jobs where status = ?1 order by id")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_job).collect()
    }

    pub async fn host_has_running_job(&self, host_id: i64, excluding_job_id: i64) -> Result<bool> {
        let row = sqlx::query(
            r#"
            select exists (
              select 1 from backup_jobs
              where host_id = ?1 and status = 'running' and id <> ?2
            ) as busy
            "#,
        )
        .bind(host_id)
        .bind(excluding_job_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<i64, _>("busy")? != 0)
    }

    /// Ready -> Running in one statement, refusing when the host is busy.
    pub async fn claim_job(&self, id: i64, now: OffsetDateTime) -> Result<ClaimOutcome> {
        let now = format_ts(now)?;
        let res = sqlx::query(
            r#"
            update backup_jobs
            set status = 'running',
                last_started_at = ?1,
                last_script_update_at = ?1,
                updated_at = ?1
            where id = ?2
              and status = 'ready'
              and not exists (
                select 1 from backup_jobs as other
                where other.host_id = backup_jobs.host_id
                  and other.status = 'running'
                  and other.id <> backup_jobs.id
              )
            "#,
        )
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 1 {
            return Ok(ClaimOutcome::Claimed);
        }

        let row = sqlx::query("select status from backup_jobs where id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(ClaimOutcome::Missing);
        };
        match parse_status(row.try_get("status")?)? {
            JobStatus::Ready => Ok(ClaimOutcome::HostBusy),
            other => Ok(ClaimOutcome::NotReady(other)),
        }
    }

    pub async fn record_weekly_dispatch(&self, id: i64, now: OffsetDateTime) -> Result<()> {
        sqlx::query(&format!(
            "update backup_jobs set last_scheduled_weekly_run_at = ?1, updated_at = {NOW_SQL} \
             where id = ?2 and frequency = 'weekly'"
        ))
        .bind(format_ts(now)?)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn touch_heartbeat(&self, id: i64, now: OffsetDateTime) -> Result<()> {
        sqlx::query(
            "update backup_jobs set last_script_update_at = ?1 where id = ?2 and status = 'running'",
        )
        .bind(format_ts(now)?)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resets a Running job whose heartbeat is still `observed_heartbeat`.
    pub async fn reset_stale_job(
        &self,
        id: i64,
        observed_heartbeat: OffsetDateTime,
        reason: &str,
    ) -> Result<bool> {
        let res = sqlx::query(&format!(
            r#"
            update backup_jobs
            set status = 'ready',
                last_script_update_at = null,
                last_run_outcome = 'failed',
                last_failure_reason = ?1,
                updated_at = {NOW_SQL}
            where id = ?2 and status = 'running' and last_script_update_at = ?3
            "#
        ))
        .bind(reason)
        .bind(id)
        .bind(format_ts(observed_heartbeat)?)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Records the outcome of the run claimed at `started_at`. A job paused
    /// while running stays paused. Returns false when the job has been
    /// claimed again since, leaving the newer run's state alone.
    pub async fn finish_job(
        &self,
        id: i64,
        started_at: Option<OffsetDateTime>,
        outcome: RunOutcome,
        failure_reason: Option<&str>,
        finished_at: OffsetDateTime,
    ) -> Result<bool> {
        let finished_at = format_ts(finished_at)?;
        let res = sqlx::query(
            r#"
            update backup_jobs
            set status = case when status = 'running' then 'ready' else status end,
                last_run_at = ?1,
                last_script_update_at = null,
                last_run_outcome = ?2,
                last_failure_reason = ?3,
                updated_at = ?1
            where id = ?4 and last_started_at is ?5
            "#,
        )
        .bind(&finished_at)
        .bind(outcome.as_str())
        .bind(failure_reason)
        .bind(id)
        .bind(format_opt_ts(started_at)?)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    #[cfg(test)]
    pub async fn set_job_status(&self, id: i64, status: JobStatus) -> Result<()> {
        sqlx::query("update backup_jobs set status = ?1 where id = ?2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// -- helpers

fn format_ts(ts: OffsetDateTime) -> Result<String> {
    Ok(ts.to_offset(UtcOffset::UTC).format(&Rfc3339)?)
}

fn format_opt_ts(ts: Option<OffsetDateTime>) -> Result<Option<String>> {
    ts.map(format_ts).transpose()
}

fn parse_ts(column: &'static str, raw: Option<String>) -> Result<Option<OffsetDateTime>> {
    raw.map(|value| {
        OffsetDateTime::parse(&value, &Rfc3339)
            .map_err(|_| BackupStoreError::Corrupt { column, value })
    })
    .transpose()
}

fn parse_enum<T: FromStr>(column: &'static str, value: String) -> Result<T> {
    value
        .parse()
        .map_err(|_| BackupStoreError::Corrupt { column, value })
}

fn parse_status(value: String) -> Result<JobStatus> {
    parse_enum("status", value)
}

fn row_to_host(row: SqliteRow) -> Result<RemoteHost> {
    let port: i64 = row.try_get("port")?;
    Ok(RemoteHost {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        port: u16::try_from(port).map_err(|_| BackupStoreError::Corrupt {
            column: "port",
            value: port.to_string(),
        })?,
        username: row.try_get("username")?,
        connectivity_status: parse_enum("connectivity_status", row.try_get("connectivity_status")?)?,
        last_checked_at: parse_ts("last_checked_at", row.try_get("last_checked_at")?)?,
    })
}

fn row_to_destination(row: SqliteRow) -> Result<BackupDestination> {
    let keep_last: Option<i64> = row.try_get("keep_last")?;
    Ok(BackupDestination {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        bucket: row.try_get("bucket")?,
        prefix: row.try_get("prefix")?,
        keep_last: keep_last
            .map(|value| {
                u32::try_from(value).map_err(|_| BackupStoreError::Corrupt {
                    column: "keep_last",
                    value: value.to_string(),
                })
            })
            .transpose()?,
    })
}

fn row_to_job(row: SqliteRow) -> Result<BackupJob> {
    let outcome: Option<String> = row.try_get("last_run_outcome")?;
    Ok(BackupJob {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        host_id: row.try_get("host_id")?,
        destination_id: row.try_get("destination_id")?,
        status: parse_status(row.try_get("status")?)?,
        frequency: parse_enum("frequency", row.try_get("frequency")?)?,
        time_to_run_at: row.try_get("time_to_run_at")?,
        custom_cron_expression: row.try_get("custom_cron_expression")?,
        owner_utc_offset_minutes: row.try_get("owner_utc_offset_minutes")?,
        last_scheduled_weekly_run_at: parse_ts(
            "last_scheduled_weekly_run_at",
            row.try_get("last_scheduled_weekly_run_at")?,
        )?,
        last_run_at: parse_ts("last_run_at", row.try_get("last_run_at")?)?,
        last_started_at: parse_ts("last_started_at", row.try_get("last_started_at")?)?,
        last_script_update_at: parse_ts(
            "last_script_update_at",
            row.try_get("last_script_update_at")?,
        )?,
        paused_at: parse_ts("paused_at", row.try_get("paused_at")?)?,
        backup_command: row.try_get("backup_command")?,
        webhook_token: row.try_get("webhook_token")?,
        last_run_outcome: outcome
            .map(|value| parse_enum("last_run_outcome", value))
            .transpose()?,
        last_failure_reason: row.try_get("last_failure_reason")?,
    })
}
