// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use anyhow::Result;
use russh::client::Handle;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{OpenFlags, StatusCode};
use tokio::fs as tokiofs;
use tokio::io::AsyncWriteExt;

use crate::app::ports::{SessionError, TransferOperation, UploadSource};

use super::ClientHandler;

pub(super) async fn open_subsystem(handle: &Handle<ClientHandler>) -> Result<SftpSession> {
    let channel = handle.channel_open_session().await?;
    channel.request_subsystem(true, "sftp").await?;
    let sftp = SftpSession::new(channel.into_stream()).await?;
    Ok(sftp)
}

fn is_sftp_missing_path(err: &russh_sftp::client::error::Error) -> bool {
    matches!(
        err,
        russh_sftp::client::error::Error::Status(status)
            if status.status_code == StatusCode::NoSuchFile
    )
}

fn remote_failure(
    operation: TransferOperation,
    path: &str,
    err: russh_sftp::client::error::Error,
) -> SessionError {
    if is_sftp_missing_path(&err) {
        SessionError::transfer(operation, path, "no such file on remote host")
    } else {
        SessionError::transfer(operation, path, err)
    }
}

pub(super) async fn upload(
    sftp: &SftpSession,
    remote_path: &str,
    source: UploadSource<'_>,
) -> Result<(), SessionError> {
    let op = TransferOperation::Upload;
    let flags = OpenFlags::WRITE
        .union(OpenFlags::CREATE)
        .union(OpenFlags::TRUNCATE);
    let mut remote = sftp
        .open_with_flags(remote_path, flags)
        .await
        .map_err(|err| remote_failure(op, remote_path, err))?;
    match source {
        UploadSource::File(local_path) => {
            let mut local = tokiofs::File::open(local_path)
                .await
                .map_err(|err| SessionError::transfer(op, remote_path, err))?;
            tokio::io::copy(&mut local, &mut remote)
                .await
                .map_err(|err| SessionError::transfer(op, remote_path, err))?;
        }
        UploadSource::Bytes(bytes) => {
            remote
                .write_all(bytes)
                .await
                .map_err(|err| SessionError::transfer(op, remote_path, err))?;
        }
    }
    remote
        .flush()
        .await
        .map_err(|err| SessionError::transfer(op, remote_path, err))?;
    remote
        .shutdown()
        .await
        .map_err(|err| SessionError::transfer(op, remote_path, err))?;
    Ok(())
}

pub(super) async fn download(
    sftp: &SftpSession,
    remote_path: &str,
    local_path: &Path,
) -> Result<(), SessionError> {
    let op = TransferOperation::Download;
    let mut remote = sftp
        .open(remote_path)
        .await
        .map_err(|err| remote_failure(op, remote_path, err))?;
    let mut local = tokiofs::File::create(local_path)
        .await
        .map_err(|err| SessionError::transfer(op, remote_path, err))?;
    let bytes = tokio::io::copy(&mut remote, &mut local)
        .await
        .map_err(|err| SessionError::transfer(op, remote_path, err))?;
    local
        .flush()
        .await
        .map_err(|err| SessionError::transfer(op, remote_path, err))?;
    tracing::debug!(remote_path, local_path = %local_path.display(), bytes, "downloaded");
    Ok(())
}
