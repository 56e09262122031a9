// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::ports::{
    AuthMethod, ConnectionDescriptor, CredentialStorePort, RemoteSession, SessionConnectorPort,
    SessionError, SessionProtocol,
};
use crate::app::types::RemoteHost;

/// Auth material used when a pending connection does not set its own.
#[derive(Clone)]
pub struct ConnectionDefaults {
    pub private_key_path: PathBuf,
    pub passphrase: Option<String>,
}

impl ConnectionDefaults {
    pub fn from_credentials(credentials: &dyn CredentialStorePort) -> Self {
        Self {
            private_key_path: credentials.private_key_path().to_path_buf(),
            passphrase: credentials.passphrase(),
        }
    }
}

impl fmt::Debug for ConnectionDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDefaults")
            .field("private_key_path", &self.private_key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Entry point for opening remote sessions; defaults are fixed at construction.
#[derive(Clone)]
pub struct SessionFactory {
    connector: Arc<dyn SessionConnectorPort>,
    defaults: Arc<ConnectionDefaults>,
}

impl SessionFactory {
    pub fn new(connector: Arc<dyn SessionConnectorPort>, defaults: ConnectionDefaults) -> Self {
        Self {
            connector,
            defaults: Arc::new(defaults),
        }
    }

    pub fn connect(
        &self,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
    ) -> PendingConnection {
        PendingConnection {
            connector: self.connector.clone(),
            defaults: self.defaults.clone(),
            host: host.into(),
            port,
            username: username.into(),
            auth: None,
            protocol: SessionProtocol::default(),
        }
    }

    pub fn connect_from_host(&self, host: &RemoteHost) -> PendingConnection {
        self.connect(host.address.clone(), host.port, host.username.clone())
    }
}

/// A described but not yet opened session. Setters consume and return `self`.
#[derive(Clone)]
pub struct PendingConnection {
    connector: Arc<dyn SessionConnectorPort>,
    defaults: Arc<ConnectionDefaults>,
    host: String,
    port: u16,
    username: String,
    auth: Option<AuthMethod>,
    protocol: SessionProtocol,
}

impl PendingConnection {
    pub fn with_private_key(mut self, path: impl Into<PathBuf>, passphrase: Option<&str>) -> Self {
        self.auth = Some(AuthMethod::PrivateKey {
            path: path.into(),
            passphrase: passphrase.map(str::to_string),
        });
        self
    }

    #[cfg(test)]
    pub fn with_password(mut self, secret: impl Into<String>) -> Self {
        self.auth = Some(AuthMethod::Password(secret.into()));
        self
    }

    pub fn with_protocol(mut self, protocol: SessionProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn descriptor(&self) -> ConnectionDescriptor {
        let auth = self.auth.clone().unwrap_or_else(|| AuthMethod::PrivateKey {
            path: self.defaults.private_key_path.clone(),
            passphrase: self.defaults.passphrase.clone(),
        });
        ConnectionDescriptor {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth,
            protocol: self.protocol,
        }
    }

    pub async fn establish(self) -> Result<Box<dyn RemoteSession>, SessionError> {
        let descriptor = self.descriptor();
        tracing::debug!(
            host = %descriptor.host,
            port = descriptor.port,
            user = %descriptor.username,
            protocol = ?descriptor.protocol,
            "establishing session"
        );
        self.connector.connect(&descriptor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ssh::fake::FakeSessionConnector;

    fn factory(connector: &FakeSessionConnector) -> SessionFactory {
        SessionFactory::new(
            Arc::new(connector.clone()),
            ConnectionDefaults {
                private_key_path: PathBuf::from("/etc/backupd/id_ed25519"),
                passphrase: Some("default-pass".into()),
            },
        )
    }

    #[test]
    fn falls_back_to_default_key_and_passphrase() {
        let connector = FakeSessionConnector::new();
        let descriptor = factory(&connector)
            .connect("db.internal", 2222, "backup")
            .descriptor();
        assert_eq!(descriptor.host, "db.internal");
        assert_eq!(descriptor.port, 2222);
        assert_eq!(descriptor.username, "backup");
        assert_eq!(descriptor.protocol, SessionProtocol::Exec);
        assert_eq!(
            descriptor.auth,
            AuthMethod::PrivateKey {
                path: PathBuf::from("/etc/backupd/id_ed25519"),
                passphrase: Some("default-pass".into()),
            }
        );
    }

    #[test]
    fn fluent_setters_do_not_affect_the_original() {
        let connector = FakeSessionConnector::new();
        let base = factory(&connector).connect("db.internal", 22, "backup");
        let with_password = base.clone().with_password("pw");
        let with_key = base
            .clone()
            .with_private_key("/keys/other", None)
            .with_protocol(SessionProtocol::Sftp);

        assert_eq!(with_password.descriptor().auth, AuthMethod::Password("pw".into()));
        assert_eq!(
            with_key.descriptor().auth,
            AuthMethod::PrivateKey {
                path: PathBuf::from("/keys/other"),
                passphrase: None,
            }
        );
        assert_eq!(with_key.descriptor().protocol, SessionProtocol::Sftp);
        assert!(matches!(base.descriptor().auth, AuthMethod::PrivateKey { .. }));
        assert_eq!(base.descriptor().protocol, SessionProtocol::Exec);
    }

    #[tokio::test]
    async fn establish_hands_descriptor_to_connector() {
        let connector = FakeSessionConnector::new();
        let host = RemoteHost {
            id: 4,
            name: "web-1".into(),
            address: "10.0.0.4".into(),
            port: 22,
            username: "ops".into(),
            connectivity_status: Default::default(),
            last_checked_at: None,
        };
        assert!(!connector.was_connected());
        let session = factory(&connector)
            .connect_from_host(&host)
            .with_protocol(SessionProtocol::Sftp)
            .establish()
            .await
            .unwrap();
        assert!(session.is_connected());
        assert_eq!(session.protocol(), SessionProtocol::Sftp);
        assert!(connector.was_connected_to("10.0.0.4"));
        let attempts = connector.connection_attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].username, "ops");
    }
}
