// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::types::{ConnectivityStatus, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSubject {
    Job(i64),
    Host(i64),
}

/// State changes surfaced to whoever displays live status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    HostConnectivity {
        host_id: i64,
        status: ConnectivityStatus,
        reason: Option<String>,
    },
    JobStatus {
        job_id: i64,
        status: JobStatus,
    },
    OwnerMessage {
        subject: NotificationSubject,
        message: String,
    },
}

/// Fire-and-forget sink; publishing never fails the caller.
pub trait NotificationPort: Send + Sync {
    fn publish(&self, event: StatusEvent);
}
