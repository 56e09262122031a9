// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use time::{Duration, OffsetDateTime};

use crate::app::services::cron::CronExpression;
use crate::app::types::{BackupJob, Frequency, JobStatus};

/// Minimum spacing between two scheduled runs of a weekly job.
pub const WEEKLY_COOLDOWN: Duration = Duration::days(6);

/// Why a job is not due, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotDue {
    NotReady,
    /// A run was already started in this minute.
    StartedThisMinute,
    OtherMinute,
    WeeklyCooldown,
    /// The schedule fields are unusable; the job never becomes due.
    Invalid(String),
}

/// Evaluates whether `job` should run at `now`, in the owner's timezone.
pub fn due_at(job: &BackupJob, now: OffsetDateTime) -> Result<(), NotDue> {
    if job.status != JobStatus::Ready {
        return Err(NotDue::NotReady);
    }
    // Owner offsets are whole minutes, so UTC minutes line up with local ones.
    if job
        .last_started_at
        .is_some_and(|started| epoch_minute(started) == epoch_minute(now))
    {
        return Err(NotDue::StartedThisMinute);
    }
    let local = now.to_offset(job.owner_offset());
    match job.frequency {
        Frequency::Daily => matches_time_of_day(job, local),
        Frequency::Weekly => {
            matches_time_of_day(job, local)?;
            match job.last_scheduled_weekly_run_at {
                Some(last) if now - last <= WEEKLY_COOLDOWN => Err(NotDue::WeeklyCooldown),
                _ => Ok(()),
            }
        }
        Frequency::CustomExpression => {
            let raw = job
                .custom_cron_expression
                .as_deref()
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .ok_or_else(|| NotDue::Invalid("missing cron expression".into()))?;
            let expr = CronExpression::parse(raw).map_err(|err| NotDue::Invalid(err.to_string()))?;
            if expr.matches(local) {
                Ok(())
            } else {
                Err(NotDue::OtherMinute)
            }
        }
    }
}

/// Rejects schedule fields that would leave a job never due.
pub fn check_schedule(
    frequency: Frequency,
    time_to_run_at: Option<&str>,
    custom_cron_expression: Option<&str>,
) -> Result<(), String> {
    match frequency {
        Frequency::Daily | Frequency::Weekly => {
            let raw = time_to_run_at.ok_or("missing time to run at")?;
            parse_time_of_day(raw)
                .map(|_| ())
                .ok_or_else(|| format!("bad time to run at '{raw}'"))
        }
        Frequency::CustomExpression => {
            let raw = custom_cron_expression
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .ok_or("missing cron expression")?;
            CronExpression::parse(raw)
                .map(|_| ())
                .map_err(|err| err.to_string())
        }
    }
}

fn epoch_minute(at: OffsetDateTime) -> i64 {
    at.unix_timestamp().div_euclid(60)
}

fn matches_time_of_day(job: &BackupJob, local: OffsetDateTime) -> Result<(), NotDue> {
    let raw = job
        .time_to_run_at
        .as_deref()
        .ok_or_else(|| NotDue::Invalid("missing time to run at".into()))?;
    let (hour, minute) = parse_time_of_day(raw)
        .ok_or_else(|| NotDue::Invalid(format!("bad time to run at '{raw}'")))?;
    if local.hour() == hour && local.minute() == minute {
        Ok(())
    } else {
        Err(NotDue::OtherMinute)
    }
}

/// Parses `HH:MM`, also tolerating a trailing `:SS`.
pub fn parse_time_of_day(raw: &str) -> Option<(u8, u8)> {
    let mut parts = raw.trim().split(':');
    let hour: u8 = parts.next()?.parse().ok()?;
    let minute: u8 = parts.next()?.parse().ok()?;
    if let Some(seconds) = parts.next() {
        seconds.parse::<u8>().ok().filter(|s| *s < 60)?;
    }
    if parts.next().is_some() || hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}
