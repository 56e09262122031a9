// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{ObjectStoragePort, RemoteSession};
use crate::app::services::retry::{BoxFuture, RetryPolicy, retry_with_backoff};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub key: String,
    pub bytes: u64,
    pub attempts: u32,
}

/// Joins a destination prefix and a file name into an object key.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let file_name = file_name.trim_start_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    }
}

struct TransferContext<'s> {
    session: &'s mut dyn RemoteSession,
    storage: &'s dyn ObjectStoragePort,
    staging_dir: &'s Path,
    remote_path: &'s str,
    key: String,
    attempts: u32,
}

/// Moves a remote archive into object storage under `prefix/file_name`.
///
/// Each attempt downloads into a fresh staging file inside `staging_dir`,
/// streams it to storage and removes the staging file whatever the outcome.
/// Attempts are bounded and spaced by `policy`; the last failure is returned
/// once they are exhausted.
pub async fn stream_to_destination(
    session: &mut dyn RemoteSession,
    storage: &dyn ObjectStoragePort,
    staging_dir: &Path,
    remote_archive_path: &str,
    file_name: &str,
    destination_prefix: &str,
    policy: RetryPolicy,
) -> AppResult<TransferReceipt> {
    let mut ctx = TransferContext {
        session,
        storage,
        staging_dir,
        remote_path: remote_archive_path,
        key: object_key(destination_prefix, file_name),
        attempts: 0,
    };
    let bytes = retry_with_backoff(
        &mut ctx,
        policy,
        "stream_to_destination",
        is_retryable,
        attempt_transfer,
    )
    .await?;
    tracing::info!(
        remote_path = remote_archive_path,
        key = %ctx.key,
        bytes,
        attempts = ctx.attempts,
        "archive stored"
    );
    Ok(TransferReceipt {
        key: ctx.key,
        bytes,
        attempts: ctx.attempts,
    })
}

/// A closed session stays closed; retrying it only burns the delay.
fn is_retryable(err: &AppError) -> bool {
    err.code() != codes::CONNECTION_CLOSED
}

fn attempt_transfer<'a>(
    ctx: &'a mut TransferContext<'_>,
    attempt: u32,
) -> BoxFuture<'a, AppResult<u64>> {
    Box::pin(async move {
        ctx.attempts = attempt;
        let staging = tempfile::Builder::new()
            .prefix("backupd-")
            .suffix(".staging")
            .tempfile_in(ctx.staging_dir)
            .map_err(|err| local_error("create staging file", ctx.staging_dir, err))?
            .into_temp_path();
        let result = stage_and_store(ctx, &staging).await;
        if let Err(err) = staging.close() {
            tracing::warn!("failed to remove staging file: {err}");
        }
        result
    })
}

async fn stage_and_store(ctx: &mut TransferContext<'_>, staging: &Path) -> AppResult<u64> {
    if let Err(err) = ctx.session.download(ctx.remote_path, staging).await {
        let detail = ctx.session.last_error().unwrap_or_else(|| err.to_string());
        return Err(AppError::from(err).with_context(format!("last session error: {detail}")));
    }
    let file = tokio::fs::File::open(staging)
        .await
        .map_err(|err| local_error("open staging file", staging, err))?;
    ctx.storage.write_stream(&ctx.key, Box::new(file)).await
}

fn local_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::with_message(
        AppErrorKind::Internal,
        codes::LOCAL_ERROR,
        format!("{action} in {}: {err}", path.display()),
    )
}
