// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Recording connector used in place of [`super::RusshConnector`] in tests.
//!
//! Every connection attempt, command, upload, download and disconnect is
//! recorded in a ledger shared between the connector and the sessions it
//! hands out, so a test can keep the connector and inspect it afterwards.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::app::ports::{
    ConnectionDescriptor, RemoteSession, SessionConnectorPort, SessionError, SessionProtocol,
    TransferOperation, UploadSource,
};

#[derive(Debug, Clone)]
enum Reply {
    Output(String),
    Fail { exit_code: u32, output: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadedContent {
    File(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Default)]
struct Ledger {
    attempts: Vec<ConnectionDescriptor>,
    connect_failure: Option<SessionError>,
    connects: usize,
    disconnects: usize,
    replies: Vec<(String, VecDeque<Reply>)>,
    commands: Vec<String>,
    uploads: Vec<(String, UploadedContent)>,
    downloads: Vec<(String, PathBuf)>,
    download_failures_left: u32,
    download_content: Vec<u8>,
}

impl Ledger {
    fn reply_for(&mut self, command: &str) -> Reply {
        for (pattern, queue) in self.replies.iter_mut() {
            if command.contains(pattern.as_str()) {
                let reply = if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                };
                if let Some(reply) = reply {
                    return reply;
                }
            }
        }
        Reply::Output(String::new())
    }
}

#[derive(Clone, Default)]
pub struct FakeSessionConnector {
    ledger: Arc<Mutex<Ledger>>,
}

impl FakeSessionConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following `connect` fails with `err`.
    pub fn fail_connect(&self, err: SessionError) -> &Self {
        self.ledger.lock().connect_failure = Some(err);
        self
    }

    /// Commands containing `pattern` print `output`.
    pub fn respond(&self, pattern: &str, output: &str) -> &Self {
        self.respond_sequence(pattern, &[output])
    }

    /// Commands containing `pattern` print each output in turn; the last one repeats.
    pub fn respond_sequence(&self, pattern: &str, outputs: &[&str]) -> &Self {
        let queue = outputs
            .iter()
            .map(|output| Reply::Output((*output).to_string()))
            .collect();
        self.ledger.lock().replies.push((pattern.to_string(), queue));
        self
    }

    /// Commands containing `pattern` exit with `exit_code`.
    pub fn fail_command(&self, pattern: &str, exit_code: u32, output: &str) -> &Self {
        let queue = VecDeque::from([Reply::Fail {
            exit_code,
            output: output.to_string(),
        }]);
        self.ledger.lock().replies.push((pattern.to_string(), queue));
        self
    }

    /// The next `count` downloads fail.
    pub fn fail_downloads(&self, count: u32) -> &Self {
        self.ledger.lock().download_failures_left = count;
        self
    }

    /// Bytes written to the local path by successful downloads.
    pub fn serve_downloads(&self, content: &[u8]) -> &Self {
        self.ledger.lock().download_content = content.to_vec();
        self
    }

    pub fn connection_attempts(&self) -> Vec<ConnectionDescriptor> {
        self.ledger.lock().attempts.clone()
    }

    pub fn was_connected(&self) -> bool {
        self.ledger.lock().connects > 0
    }

    pub fn was_connected_to(&self, host: &str) -> bool {
        let ledger = self.ledger.lock();
        ledger.connects > 0 && ledger.attempts.iter().any(|attempt| attempt.host == host)
    }

    pub fn was_disconnected(&self) -> bool {
        let ledger = self.ledger.lock();
        ledger.disconnects > 0 && ledger.disconnects == ledger.connects
    }

    pub fn commands(&self) -> Vec<String> {
        self.ledger.lock().commands.clone()
    }

    pub fn ran(&self, command: &str) -> bool {
        self.ledger.lock().commands.iter().any(|ran| ran == command)
    }

    pub fn ran_matching(&self, pattern: &str) -> bool {
        self.ledger
            .lock()
            .commands
            .iter()
            .any(|ran| ran.contains(pattern))
    }

    pub fn ran_any(&self) -> bool {
        !self.ledger.lock().commands.is_empty()
    }

    pub fn ran_nothing(&self) -> bool {
        !self.ran_any()
    }

    pub fn uploaded(&self, remote_path: &str, local_path: &Path) -> bool {
        self.ledger.lock().uploads.iter().any(|(remote, content)| {
            remote == remote_path && *content == UploadedContent::File(local_path.to_path_buf())
        })
    }

    pub fn uploaded_bytes(&self, remote_path: &str) -> Option<Vec<u8>> {
        self.ledger
            .lock()
            .uploads
            .iter()
            .find_map(|(remote, content)| match content {
                UploadedContent::Bytes(bytes) if remote == remote_path => Some(bytes.clone()),
                _ => None,
            })
    }

    pub fn downloaded(&self, remote_path: &str, local_path: &Path) -> bool {
        self.ledger
            .lock()
            .downloads
            .iter()
            .any(|(remote, local)| remote == remote_path && local == local_path)
    }

    pub fn download_attempts(&self) -> usize {
        self.ledger.lock().downloads.len()
    }

    pub fn downloaded_paths(&self) -> Vec<PathBuf> {
        self.ledger
            .lock()
            .downloads
            .iter()
            .map(|(_, local)| local.clone())
            .collect()
    }
}

#[async_trait]
impl SessionConnectorPort for FakeSessionConnector {
    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Box<dyn RemoteSession>, SessionError> {
        let mut ledger = self.ledger.lock();
        ledger.attempts.push(descriptor.clone());
        if let Some(err) = ledger.connect_failure.clone() {
            return Err(err);
        }
        ledger.connects += 1;
        Ok(Box::new(FakeSession {
            ledger: self.ledger.clone(),
            protocol: descriptor.protocol,
            closed: false,
            last_error: None,
        }))
    }
}

pub struct FakeSession {
    ledger: Arc<Mutex<Ledger>>,
    protocol: SessionProtocol,
    closed: bool,
    last_error: Option<String>,
}

impl FakeSession {
    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    fn ensure_sftp(&mut self, operation: TransferOperation, path: &str) -> Result<(), SessionError> {
        if self.protocol == SessionProtocol::Sftp {
            return Ok(());
        }
        let err = SessionError::transfer(operation, path, "session was opened without sftp");
        self.last_error = Some(err.to_string());
        Err(err)
    }

    fn execute(&mut self, command: &str) -> Result<String, SessionError> {
        self.ensure_open()?;
        let reply = {
            let mut ledger = self.ledger.lock();
            ledger.commands.push(command.to_string());
            ledger.reply_for(command)
        };
        match reply {
            Reply::Output(output) => Ok(output),
            Reply::Fail { exit_code, output } => {
                let err = SessionError::CommandFailed {
                    command: command.to_string(),
                    exit_code: Some(exit_code),
                    output,
                };
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    fn protocol(&self) -> SessionProtocol {
        self.protocol
    }

    fn is_connected(&self) -> bool {
        !self.closed
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    async fn run(&mut self, command: &str) -> Result<String, SessionError> {
        self.execute(command)
    }

    async fn run_streaming(
        &mut self,
        command: &str,
        on_chunk: &mut (dyn for<'a> FnMut(&'a [u8]) + Send),
    ) -> Result<(), SessionError> {
        let output = self.execute(command)?;
        for line in output.split_inclusive('\n') {
            on_chunk(line.as_bytes());
        }
        Ok(())
    }

    async fn upload(
        &mut self,
        remote_path: &str,
        source: UploadSource<'_>,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.ensure_sftp(TransferOperation::Upload, remote_path)?;
        let content = match source {
            UploadSource::File(path) => UploadedContent::File(path.to_path_buf()),
            UploadSource::Bytes(bytes) => UploadedContent::Bytes(bytes.to_vec()),
        };
        self.ledger
            .lock()
            .uploads
            .push((remote_path.to_string(), content));
        Ok(())
    }

    async fn download(
        &mut self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.ensure_sftp(TransferOperation::Download, remote_path)?;
        let content = {
            let mut ledger = self.ledger.lock();
            ledger
                .downloads
                .push((remote_path.to_string(), local_path.to_path_buf()));
            if ledger.download_failures_left > 0 {
                ledger.download_failures_left -= 1;
                None
            } else {
                Some(ledger.download_content.clone())
            }
        };
        let Some(content) = content else {
            self.last_error = Some("simulated transfer failure".into());
            return Err(SessionError::transfer(
                TransferOperation::Download,
                remote_path,
                "simulated transfer failure",
            ));
        };
        tokio::fs::write(local_path, content).await.map_err(|err| {
            self.last_error = Some(err.to_string());
            SessionError::transfer(TransferOperation::Download, remote_path, err)
        })
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        if !self.closed {
            self.closed = true;
            self.ledger.lock().disconnects += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::AuthMethod;

    fn descriptor(protocol: SessionProtocol) -> ConnectionDescriptor {
        ConnectionDescriptor {
            host: "files.example".into(),
            port: 22,
            username: "backup".into(),
            auth: AuthMethod::Password("pw".into()),
            protocol,
        }
    }

    #[tokio::test]
    async fn full_sequence_is_reconstructable() {
        let connector = FakeSessionConnector::new();
        connector.respond("uname", "Linux\n");
        assert!(!connector.was_connected());
        assert!(connector.ran_nothing());

        let mut session = connector
            .connect(&descriptor(SessionProtocol::Sftp))
            .await
            .unwrap();
        assert_eq!(session.run("uname -s").await.unwrap(), "Linux\n");
        session
            .upload("/srv/a.txt", UploadSource::File(Path::new("/tmp/b.txt")))
            .await
            .unwrap();
        session.disconnect().await.unwrap();

        assert!(connector.was_connected_to("files.example"));
        assert!(connector.ran("uname -s"));
        assert!(connector.ran_any());
        assert!(!connector.ran("uname -a"));
        assert!(connector.uploaded("/srv/a.txt", Path::new("/tmp/b.txt")));
        assert!(!connector.uploaded("/srv/a.txt", Path::new("/tmp/c.txt")));
        assert!(connector.was_disconnected());
    }

    #[tokio::test]
    async fn every_operation_fails_after_disconnect() {
        let connector = FakeSessionConnector::new();
        let mut session = connector
            .connect(&descriptor(SessionProtocol::Sftp))
            .await
            .unwrap();
        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();

        assert!(!session.is_connected());
        assert_eq!(session.run("X").await, Err(SessionError::ConnectionClosed));
        let mut sink = |_: &[u8]| {};
        assert_eq!(
            session.run_streaming("X", &mut sink).await,
            Err(SessionError::ConnectionClosed)
        );
        assert_eq!(
            session
                .upload("/a", UploadSource::Bytes(b"x"))
                .await,
            Err(SessionError::ConnectionClosed)
        );
        assert_eq!(
            session.download("/a", Path::new("/tmp/never")).await,
            Err(SessionError::ConnectionClosed)
        );
        assert!(connector.ran_nothing());
    }

    #[tokio::test]
    async fn connect_failure_is_recorded() {
        let connector = FakeSessionConnector::new();
        connector.fail_connect(SessionError::AuthenticationFailed {
            host: "files.example".into(),
        });
        let result = connector.connect(&descriptor(SessionProtocol::Exec)).await;
        assert!(matches!(
            result,
            Err(SessionError::AuthenticationFailed { .. })
        ));
        assert_eq!(connector.connection_attempts().len(), 1);
        assert!(!connector.was_connected());
    }

    #[tokio::test]
    async fn sequenced_replies_and_failures() {
        let connector = FakeSessionConnector::new();
        connector
            .respond_sequence("uptime", &["first\n", "second\n"])
            .fail_command("explode", 3, "boom");
        let mut session = connector
            .connect(&descriptor(SessionProtocol::Exec))
            .await
            .unwrap();
        assert_eq!(session.run("uptime").await.unwrap(), "first\n");
        assert_eq!(session.run("uptime").await.unwrap(), "second\n");
        assert_eq!(session.run("uptime").await.unwrap(), "second\n");

        let err = session.run("explode now").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::CommandFailed {
                exit_code: Some(3),
                ..
            }
        ));
        assert!(session.last_error().unwrap().contains("explode now"));

        let mut chunks = Vec::new();
        connector.respond("multi", "a\nb\nc");
        session
            .run_streaming("multi", &mut |chunk: &[u8]| chunks.push(chunk.to_vec()))
            .await
            .unwrap();
        assert_eq!(chunks, vec![b"a\n".to_vec(), b"b\n".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn exec_sessions_reject_file_transfer() {
        let connector = FakeSessionConnector::new();
        let mut session = connector
            .connect(&descriptor(SessionProtocol::Exec))
            .await
            .unwrap();
        let err = session
            .download("/srv/a.tgz", Path::new("/tmp/a.tgz"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::FileTransferFailed {
                operation: TransferOperation::Download,
                ..
            }
        ));
        assert_eq!(connector.download_attempts(), 0);
    }

    #[tokio::test]
    async fn downloads_write_served_content() {
        let dir = tempfile::TempDir::new().unwrap();
        let local = dir.path().join("archive.tgz");
        let connector = FakeSessionConnector::new();
        connector.serve_downloads(b"payload").fail_downloads(1);
        let mut session = connector
            .connect(&descriptor(SessionProtocol::Sftp))
            .await
            .unwrap();

        assert!(session.download("/srv/archive.tgz", &local).await.is_err());
        assert!(session.last_error().is_some());
        session.download("/srv/archive.tgz", &local).await.unwrap();
        assert_eq!(std::fs::read(&local).unwrap(), b"payload");
        assert_eq!(connector.download_attempts(), 2);
        assert!(connector.downloaded("/srv/archive.tgz", &local));
    }
}
