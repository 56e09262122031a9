// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error as ThisError;

/// Which channel kind a session is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionProtocol {
    /// Interactive command execution only.
    #[default]
    Exec,
    /// Command execution plus SFTP file transfer.
    Sftp,
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
    Password(String),
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::PrivateKey { path, passphrase } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Fully specified connection request handed to a connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    pub protocol: SessionProtocol,
}

#[derive(Debug, Clone, Copy)]
pub enum UploadSource<'a> {
    File(&'a Path),
    Bytes(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOperation {
    Upload,
    Download,
}

impl fmt::Display for TransferOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOperation::Upload => f.write_str("upload"),
            TransferOperation::Download => f.write_str("download"),
        }
    }
}

fn exit_label(code: &Option<u32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit status".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SessionError {
    #[error("authentication failed for {host}")]
    AuthenticationFailed { host: String },
    #[error("connection to {host} failed: {reason}")]
    ConnectionFailed { host: String, reason: String },
    #[error("remote command `{command}` failed with {}", exit_label(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<u32>,
        output: String,
    },
    #[error("{operation} of {path} failed: {reason}")]
    FileTransferFailed {
        operation: TransferOperation,
        path: String,
        reason: String,
    },
    #[error("session is closed")]
    ConnectionClosed,
}

impl SessionError {
    pub fn transfer(
        operation: TransferOperation,
        path: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        SessionError::FileTransferFailed {
            operation,
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Live, authenticated channel to one host.
///
/// Every operation fails with [`SessionError::ConnectionClosed`] once
/// [`RemoteSession::disconnect`] has been called. Upload and download are only
/// available on [`SessionProtocol::Sftp`] sessions.
#[async_trait]
pub trait RemoteSession: Send {
    fn protocol(&self) -> SessionProtocol;

    fn is_connected(&self) -> bool;

    /// Message of the most recent failed operation, if any.
    fn last_error(&self) -> Option<String>;

    /// Runs a command and returns its combined stdout and stderr.
    async fn run(&mut self, command: &str) -> Result<String, SessionError>;

    /// Runs a command, handing every output chunk to `on_chunk` as it arrives.
    async fn run_streaming(
        &mut self,
        command: &str,
        on_chunk: &mut (dyn for<'a> FnMut(&'a [u8]) + Send),
    ) -> Result<(), SessionError>;

    async fn upload(
        &mut self,
        remote_path: &str,
        source: UploadSource<'_>,
    ) -> Result<(), SessionError>;

    async fn download(&mut self, remote_path: &str, local_path: &Path)
    -> Result<(), SessionError>;

    /// Idempotent.
    async fn disconnect(&mut self) -> Result<(), SessionError>;
}

#[async_trait]
/// Turns a connection descriptor into a live session.
pub trait SessionConnectorPort: Send + Sync {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn RemoteSession>, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_debug_output_hides_secrets() {
        let password = AuthMethod::Password("hunter2".into());
        assert!(!format!("{password:?}").contains("hunter2"));

        let key = AuthMethod::PrivateKey {
            path: PathBuf::from("/keys/id_ed25519"),
            passphrase: Some("s3cret".into()),
        };
        let rendered = format!("{key:?}");
        assert!(rendered.contains("/keys/id_ed25519"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn command_failure_message_names_command_and_exit() {
        let err = SessionError::CommandFailed {
            command: "tar czf /tmp/a.tgz /srv".into(),
            exit_code: Some(2),
            output: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "remote command `tar czf /tmp/a.tgz /srv` failed with exit code 2"
        );

        let err = SessionError::transfer(TransferOperation::Download, "/tmp/a.tgz", "eof");
        assert_eq!(err.to_string(), "download of /tmp/a.tgz failed: eof");
    }
}
