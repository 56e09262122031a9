// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::Config;

use crate::app::ports::{
    ConnectionDescriptor, RemoteSession, SessionConnectorPort, SessionError,
};

mod session;

#[cfg(test)]
pub mod fake;

pub use session::RusshSession;

/// Transport settings shared by every session the connector opens.
#[derive(Debug, Clone)]
pub struct SshSettings {
    /// `None` uses the user's default `~/.ssh/known_hosts`.
    pub known_hosts_path: Option<PathBuf>,
    pub inactivity_timeout: Duration,
    pub keepalive_interval: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            known_hosts_path: None,
            inactivity_timeout: Duration::from_secs(600),
            keepalive_interval: Duration::from_secs(15),
        }
    }
}

/// Opens real SSH sessions with russh; one transport per session.
#[derive(Clone)]
pub struct RusshConnector {
    config: Arc<Config>,
    known_hosts_path: Option<PathBuf>,
}

impl RusshConnector {
    pub fn new(settings: SshSettings) -> Self {
        let config = Config {
            inactivity_timeout: Some(settings.inactivity_timeout),
            keepalive_interval: Some(settings.keepalive_interval),
            channel_buffer_size: 64,
            window_size: 1024 * 1024,
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
            known_hosts_path: settings.known_hosts_path,
        }
    }
}

#[async_trait]
impl SessionConnectorPort for RusshConnector {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, descriptor),
        fields(op = "connect", host = %descriptor.host, port = descriptor.port)
    )]
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        let session = RusshSession::open(
            self.config.clone(),
            self.known_hosts_path.as_deref(),
            descriptor,
        )
        .await?;
        Ok(Box::new(session))
    }
}
