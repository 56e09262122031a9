// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use russh::client::{AuthResult, Config, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh::keys::known_hosts::{learn_known_hosts, learn_known_hosts_path};
use russh_sftp::client::SftpSession;

use crate::app::ports::{
    AuthMethod, ConnectionDescriptor, RemoteSession, SessionError, SessionProtocol,
    TransferOperation, UploadSource,
};

mod exec;
mod sftp;

#[derive(Clone, Debug)]
pub(super) struct ClientHandler {
    host: String,
    addr: SocketAddr,
    known_hosts_path: Option<PathBuf>,
}

impl ClientHandler {
    fn new(host: String, addr: SocketAddr, known_hosts_path: Option<PathBuf>) -> Self {
        Self {
            host,
            addr,
            known_hosts_path,
        }
    }
}

impl russh::client::Handler for ClientHandler {
    type Error = anyhow::Error;
    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        verify_server_key(
            &self.host,
            self.addr,
            server_public_key,
            self.known_hosts_path.as_deref(),
        )
    }
}

fn check_known_hosts_for(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> std::result::Result<bool, russh::keys::Error> {
    match known_hosts_path {
        Some(path) => russh::keys::check_known_hosts_path(host, port, key, path),
        None => russh::keys::check_known_hosts(host, port, key),
    }
}

fn learn_known_hosts_for(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> std::result::Result<(), russh::keys::Error> {
    match known_hosts_path {
        Some(path) => learn_known_hosts_path(host, port, key, path),
        None => learn_known_hosts(host, port, key),
    }
}

/// Accepts keys already in known_hosts (by name, then by IP), learns keys
/// for hosts never seen before and rejects keys that changed.
fn verify_server_key(
    host: &str,
    addr: SocketAddr,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> std::result::Result<bool, anyhow::Error> {
    let port = addr.port();
    let ip_host = addr.ip().to_string();
    let mut candidates = vec![host];
    if ip_host != host {
        candidates.push(ip_host.as_str());
    }
    for candidate in &candidates {
        match check_known_hosts_for(candidate, port, key, known_hosts_path) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(err) => {
                tracing::warn!("server key validation failed for {host}:{port}: {err}");
                return Err(anyhow!(
                    "server key validation failed for {host}:{port}: {err}"
                ));
            }
        }
    }

    tracing::info!(
        "server key for {host}:{port} is not present in known_hosts (tried {}); learning",
        candidates.join(", ")
    );
    learn_known_hosts_for(host, port, key, known_hosts_path).map_err(|err| {
        tracing::warn!("failed to learn server key for {host}:{port}: {err}");
        anyhow!("failed to learn server key for {host}:{port}: {err}")
    })?;
    Ok(true)
}

/// Live russh transport. Sftp sessions also open the sftp subsystem up front.
pub struct RusshSession {
    host: String,
    protocol: SessionProtocol,
    handle: Option<Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
    last_error: Option<String>,
}

impl RusshSession {
    pub(crate) async fn open(
        config: Arc<Config>,
        known_hosts_path: Option<&Path>,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Self, SessionError> {
        let host = descriptor.host.clone();
        let connection_failed = |reason: String| SessionError::ConnectionFailed {
            host: host.clone(),
            reason,
        };

        let addr = tokio::net::lookup_host((descriptor.host.as_str(), descriptor.port))
            .await
            .map_err(|err| connection_failed(format!("address lookup failed: {err}")))?
            .next()
            .ok_or_else(|| connection_failed("address lookup returned nothing".into()))?;

        let handler = ClientHandler::new(
            host.clone(),
            addr,
            known_hosts_path.map(Path::to_path_buf),
        );
        let mut handle = russh::client::connect(config, addr, handler)
            .await
            .map_err(|err| connection_failed(format!("{err:#}")))?;
        tracing::debug!(
            "established connection with {}@{addr}, proceeding with auth",
            descriptor.username
        );

        if !authenticate(&mut handle, descriptor).await? {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "English")
                .await;
            return Err(SessionError::AuthenticationFailed { host: host.clone() });
        }

        let sftp = match descriptor.protocol {
            SessionProtocol::Sftp => Some(
                sftp::open_subsystem(&handle)
                    .await
                    .map_err(|err| connection_failed(format!("sftp subsystem: {err:#}")))?,
            ),
            SessionProtocol::Exec => None,
        };

        Ok(Self {
            host,
            protocol: descriptor.protocol,
            handle: Some(handle),
            sftp,
            last_error: None,
        })
    }

    fn live_handle(&self) -> Result<&Handle<ClientHandler>, SessionError> {
        self.handle.as_ref().ok_or(SessionError::ConnectionClosed)
    }

    fn live_sftp(
        &self,
        operation: TransferOperation,
        path: &str,
    ) -> Result<&SftpSession, SessionError> {
        if self.handle.is_none() {
            return Err(SessionError::ConnectionClosed);
        }
        self.sftp.as_ref().ok_or_else(|| {
            SessionError::transfer(operation, path, "session was opened without sftp")
        })
    }

    fn remember<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(err) = &result
            && *err != SessionError::ConnectionClosed
        {
            self.last_error = Some(err.to_string());
        }
        result
    }
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    descriptor: &ConnectionDescriptor,
) -> Result<bool, SessionError> {
    let auth_failed = |reason: String| {
        tracing::warn!(host = %descriptor.host, "authentication failed: {reason}");
        SessionError::AuthenticationFailed {
            host: descriptor.host.clone(),
        }
    };
    let result = match &descriptor.auth {
        AuthMethod::PrivateKey { path, passphrase } => {
            let key = russh::keys::load_secret_key(path, passphrase.as_deref()).map_err(|err| {
                auth_failed(format!("failed to load secret key at {}: {err}", path.display()))
            })?;
            // Prefer SHA-256 for RSA if applicable (ignored for non-RSA keys)
            let hash = handle
                .best_supported_rsa_hash()
                .await
                .map_err(|err| auth_failed(err.to_string()))?
                .flatten();
            let key = PrivateKeyWithHashAlg::new(Arc::new(key), hash);
            handle
                .authenticate_publickey(descriptor.username.clone(), key)
                .await
        }
        AuthMethod::Password(secret) => {
            handle
                .authenticate_password(descriptor.username.clone(), secret.clone())
                .await
        }
    };
    match result.map_err(|err| auth_failed(err.to_string()))? {
        AuthResult::Success => Ok(true),
        AuthResult::Failure { .. } => Ok(false),
    }
}

#[async_trait]
impl RemoteSession for RusshSession {
    fn protocol(&self) -> SessionProtocol {
        self.protocol
    }

    fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_closed())
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    async fn run(&mut self, command: &str) -> Result<String, SessionError> {
        let mut output = Vec::new();
        let mut collect = |chunk: &[u8]| output.extend_from_slice(chunk);
        self.run_streaming(command, &mut collect).await?;
        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    async fn run_streaming(
        &mut self,
        command: &str,
        on_chunk: &mut (dyn for<'a> FnMut(&'a [u8]) + Send),
    ) -> Result<(), SessionError> {
        let result = match self.live_handle() {
            Ok(handle) => exec::run_command(handle, &self.host, command, on_chunk).await,
            Err(err) => Err(err),
        };
        self.remember(result)
    }

    async fn upload(
        &mut self,
        remote_path: &str,
        source: UploadSource<'_>,
    ) -> Result<(), SessionError> {
        let result = match self.live_sftp(TransferOperation::Upload, remote_path) {
            Ok(session) => sftp::upload(session, remote_path, source).await,
            Err(err) => Err(err),
        };
        self.remember(result)
    }

    async fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<(), SessionError> {
        let result = match self.live_sftp(TransferOperation::Download, remote_path) {
            Ok(session) => sftp::download(session, remote_path, local_path).await,
            Err(err) => Err(err),
        };
        self.remember(result)
    }

    async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.sftp = None;
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle
                .disconnect(russh::Disconnect::ByApplication, "", "English")
                .await
        {
            tracing::debug!(host = %self.host, "disconnect was not clean: {err}");
        }
        Ok(())
    }
}
