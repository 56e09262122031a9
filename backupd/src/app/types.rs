// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::str::FromStr;

use time::{OffsetDateTime, UtcOffset};

#[derive(Debug)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// Scheduling state of a backup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Ready,
    Running,
    Paused,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Ready => "ready",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
        }
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ready" => Ok(JobStatus::Ready),
            "running" => Ok(JobStatus::Running),
            "paused" => Ok(JobStatus::Paused),
            other => Err(ParseEnumError {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    CustomExpression,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::CustomExpression => "custom",
        }
    }
}

impl FromStr for Frequency {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "custom" => Ok(Frequency::CustomExpression),
            other => Err(ParseEnumError {
                kind: "frequency",
                value: other.to_string(),
            }),
        }
    }
}

/// Result of the most recent execution of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Failed => "failed",
        }
    }
}

impl FromStr for RunOutcome {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(RunOutcome::Succeeded),
            "failed" => Ok(RunOutcome::Failed),
            other => Err(ParseEnumError {
                kind: "run outcome",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityStatus {
    #[default]
    Unknown,
    Checking,
    Online,
    Offline,
}

impl ConnectivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectivityStatus::Unknown => "unknown",
            ConnectivityStatus::Checking => "checking",
            ConnectivityStatus::Online => "online",
            ConnectivityStatus::Offline => "offline",
        }
    }
}

impl FromStr for ConnectivityStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(ConnectivityStatus::Unknown),
            "checking" => Ok(ConnectivityStatus::Checking),
            "online" => Ok(ConnectivityStatus::Online),
            "offline" => Ok(ConnectivityStatus::Offline),
            other => Err(ParseEnumError {
                kind: "connectivity status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured backup as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    pub id: i64,
    pub name: String,
    pub host_id: i64,
    pub destination_id: i64,
    pub status: JobStatus,
    pub frequency: Frequency,
    /// Wall-clock "HH:MM" in the owner's timezone.
    pub time_to_run_at: Option<String>,
    pub custom_cron_expression: Option<String>,
    pub owner_utc_offset_minutes: i32,
    pub last_scheduled_weekly_run_at: Option<OffsetDateTime>,
    pub last_run_at: Option<OffsetDateTime>,
    /// When the current or most recent run was claimed.
    pub last_started_at: Option<OffsetDateTime>,
    /// Heartbeat written while the job is running.
    pub last_script_update_at: Option<OffsetDateTime>,
    pub paused_at: Option<OffsetDateTime>,
    /// Remote command producing the archive; prints its path on the last line.
    pub backup_command: String,
    pub webhook_token: Option<String>,
    pub last_run_outcome: Option<RunOutcome>,
    pub last_failure_reason: Option<String>,
}

impl BackupJob {
    /// Owner offset; out-of-range values fall back to UTC.
    pub fn owner_offset(&self) -> UtcOffset {
        UtcOffset::from_whole_seconds(self.owner_utc_offset_minutes.saturating_mul(60))
            .unwrap_or(UtcOffset::UTC)
    }

    /// Object key prefix for this job's archives under a destination.
    pub fn storage_prefix(&self, destination: &BackupDestination) -> String {
        let base = destination.prefix.trim_matches('/');
        if base.is_empty() {
            format!("job-{}", self.id)
        } else {
            format!("{base}/job-{}", self.id)
        }
    }
}

/// Payload for inserting a job; written by the management layer in production.
#[derive(Debug, Clone, Default)]
pub struct NewBackupJob {
    pub name: String,
    pub host_id: i64,
    pub destination_id: i64,
    pub status: JobStatus,
    pub frequency: Frequency,
    pub time_to_run_at: Option<String>,
    pub custom_cron_expression: Option<String>,
    pub owner_utc_offset_minutes: i32,
    pub last_scheduled_weekly_run_at: Option<OffsetDateTime>,
    pub last_script_update_at: Option<OffsetDateTime>,
    pub backup_command: String,
    pub webhook_token: Option<String>,
}

/// Connection coordinates for a target machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub connectivity_status: ConnectivityStatus,
    pub last_checked_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewHost {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: String,
}

/// Object-storage bucket and key prefix a job writes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDestination {
    pub id: i64,
    pub name: String,
    pub bucket: String,
    pub prefix: String,
    /// Number of archives to retain per job; `None` keeps everything.
    pub keep_last: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NewDestination {
    pub name: String,
    pub bucket: String,
    pub prefix: String,
    pub keep_last: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub last_modified: OffsetDateTime,
}
