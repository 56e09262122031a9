// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::ports::{NotificationPort, NotificationSubject, StatusEvent};

/// Publishes status changes as structured log events under `backupd::notify`.
#[derive(Clone, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl NotificationPort for TracingNotifier {
    fn publish(&self, event: StatusEvent) {
        match event {
            StatusEvent::HostConnectivity {
                host_id,
                status,
                reason,
            } => tracing::info!(
                target: "backupd::notify",
                event = "host_connectivity",
                host_id,
                status = status.as_str(),
                reason = reason.as_deref(),
            ),
            StatusEvent::JobStatus { job_id, status } => tracing::info!(
                target: "backupd::notify",
                event = "job_status",
                job_id,
                status = status.as_str(),
            ),
            StatusEvent::OwnerMessage { subject, message } => {
                let (kind, id) = match subject {
                    NotificationSubject::Job(id) => ("job", id),
                    NotificationSubject::Host(id) => ("host", id),
                };
                tracing::info!(
                    target: "backupd::notify",
                    event = "owner_message",
                    subject = kind,
                    subject_id = id,
                    message = %message,
                );
            }
        }
    }
}
