// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{NotificationSubject, RemoteSession};
use crate::app::services::authorized_keys::{
    AUTHORIZED_KEYS, key_body, parse_presence, presence_command, removal_command,
};
use crate::app::types::{ConnectivityStatus, RemoteHost};

use super::UseCases;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRemoval {
    Removed,
    AlreadyAbsent,
}

impl UseCases {
    /// Connects once and records whether the host answered.
    ///
    /// Emits Checking, then Online or Offline (with the failure reason).
    /// An unreachable host is a result, not an error.
    #[tracing::instrument(name = "check_host", level = "debug", skip(self))]
    pub async fn check_host_connectivity(&self, host_id: i64) -> AppResult<ConnectivityStatus> {
        let host = self.load_host(host_id).await?;
        self.set_host_connectivity(host.id, ConnectivityStatus::Checking, None)
            .await?;

        match self.sessions.connect_from_host(&host).establish().await {
            Ok(mut session) => {
                if let Err(err) = session.disconnect().await {
                    tracing::debug!(host_id, "disconnect after connectivity check failed: {err}");
                }
                self.set_host_connectivity(host.id, ConnectivityStatus::Online, None)
                    .await?;
                Ok(ConnectivityStatus::Online)
            }
            Err(err) => {
                tracing::info!(host_id, address = %host.address, "host unreachable: {err}");
                self.set_host_connectivity(
                    host.id,
                    ConnectivityStatus::Offline,
                    Some(err.to_string()),
                )
                .await?;
                Ok(ConnectivityStatus::Offline)
            }
        }
    }

    /// Checks every host in turn; returns how many are online.
    pub async fn verify_all_hosts(&self) -> AppResult<usize> {
        let mut online = 0;
        for host in self.hosts.list_hosts().await? {
            match self.check_host_connectivity(host.id).await {
                Ok(ConnectivityStatus::Online) => online += 1,
                Ok(_) => {}
                Err(err) => tracing::warn!(host_id = host.id, "connectivity sweep failed: {err}"),
            }
        }
        Ok(online)
    }

    /// Removes the service's public key from the host's authorized_keys.
    /// A key that is already gone counts as success.
    #[tracing::instrument(name = "remove_key", level = "debug", skip(self))]
    pub async fn remove_service_key(&self, host_id: i64) -> AppResult<KeyRemoval> {
        let host = self.load_host(host_id).await?;
        let subject = NotificationSubject::Host(host.id);
        let result = self.remove_key_from(&host).await;
        match &result {
            Ok(KeyRemoval::Removed) => self.tell_owner(
                subject,
                format!("Service key removed from host '{}'", host.name),
            ),
            Ok(KeyRemoval::AlreadyAbsent) => self.tell_owner(
                subject,
                format!("Service key was not present on host '{}'", host.name),
            ),
            Err(err) => self.tell_owner(
                subject,
                format!("Could not remove service key from host '{}': {err}", host.name),
            ),
        }
        result
    }

    async fn remove_key_from(&self, host: &RemoteHost) -> AppResult<KeyRemoval> {
        let public_key = self.credentials.public_key().await?;
        let body = key_body(&public_key)?;
        let mut session = self.sessions.connect_from_host(host).establish().await?;

        let result: AppResult<KeyRemoval> = async {
            if !key_present(session.as_mut(), body).await? {
                return Ok(KeyRemoval::AlreadyAbsent);
            }
            session.run(&removal_command(body)).await?;
            if key_present(session.as_mut(), body).await? {
                return Err(AppError::with_message(
                    AppErrorKind::Aborted,
                    codes::COMMAND_FAILURE,
                    format!("service key is still in {AUTHORIZED_KEYS} after removal"),
                ));
            }
            Ok::<_, AppError>(KeyRemoval::Removed)
        }
        .await;

        if let Err(err) = session.disconnect().await {
            tracing::debug!(host_id = host.id, "disconnect failed: {err}");
        }
        result
    }
}

async fn key_present(session: &mut dyn RemoteSession, body: &str) -> AppResult<bool> {
    let output = session.run(&presence_command(body)).await?;
    parse_presence(&output).ok_or_else(|| {
        AppError::with_message(
            AppErrorKind::Aborted,
            codes::COMMAND_FAILURE,
            format!("unexpected output from key check: {}", output.trim()),
        )
    })
}
