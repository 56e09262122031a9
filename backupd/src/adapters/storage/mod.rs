// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Object storage backed by a local directory tree: `<root>/<bucket>/<key>`.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{ByteStream, ObjectStoragePort, ObjectStorageProvider};
use crate::app::types::{BackupDestination, StoredObject};

const PARTIAL_PREFIX: &str = ".partial-";

#[derive(Debug, Clone)]
pub struct FilesystemStorageProvider {
    root: PathBuf,
}

impl FilesystemStorageProvider {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ObjectStorageProvider for FilesystemStorageProvider {
    fn check_bucket(&self, bucket: &str) -> AppResult<()> {
        let trimmed = bucket.trim();
        if trimmed.is_empty() || !is_plain_segment(trimmed) {
            return Err(AppError::with_message(
                AppErrorKind::InvalidArgument,
                codes::INVALID_ARGUMENT,
                format!("invalid bucket name '{bucket}'"),
            ));
        }
        Ok(())
    }

    fn bucket(&self, destination: &BackupDestination) -> AppResult<Arc<dyn ObjectStoragePort>> {
        self.check_bucket(&destination.bucket)?;
        Ok(Arc::new(FilesystemObjectStore::new(
            self.root.join(destination.bucket.trim()),
        )))
    }
}

#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    dir: PathBuf,
}

impl FilesystemObjectStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        let segments: Vec<&str> = key.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() || !segments.iter().all(|s| is_plain_segment(s)) {
            return Err(AppError::with_message(
                AppErrorKind::InvalidArgument,
                codes::INVALID_ARGUMENT,
                format!("invalid object key '{key}'"),
            ));
        }
        Ok(segments
            .iter()
            .fold(self.dir.clone(), |path, segment| path.join(segment)))
    }
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.contains('/')
        && matches!(
            Path::new(segment).components().next(),
            Some(Component::Normal(_))
        )
        && Path::new(segment).components().count() == 1
}

fn storage_error(action: &str, target: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::with_message(
        AppErrorKind::Unavailable,
        codes::STORAGE_ERROR,
        format!("{action} {}: {err}", target.display()),
    )
}

fn scan(dir: &Path, prefix: &str) -> AppResult<Vec<StoredObject>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut objects = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|err| storage_error("failed to list", dir, err))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(PARTIAL_PREFIX))
        {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !key.starts_with(prefix) {
            continue;
        }
        let metadata = entry
            .metadata()
            .map_err(|err| storage_error("failed to stat", entry.path(), err))?;
        let last_modified = metadata
            .modified()
            .map(OffsetDateTime::from)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        objects.push(StoredObject {
            key,
            size: metadata.len(),
            last_modified,
        });
    }
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
}

#[async_trait]
impl ObjectStoragePort for FilesystemObjectStore {
    #[tracing::instrument(name = "storage", level = "debug", skip(self), fields(op = "list"))]
    async fn list_objects(&self, prefix: &str) -> AppResult<Vec<StoredObject>> {
        let dir = self.dir.clone();
        let prefix = prefix.trim_start_matches('/').to_string();
        tokio::task::spawn_blocking(move || scan(&dir, &prefix))
            .await
            .map_err(|err| {
                AppError::with_message(
                    AppErrorKind::Internal,
                    codes::INTERNAL_ERROR,
                    format!("listing task failed: {err}"),
                )
            })?
    }

    #[tracing::instrument(name = "storage", level = "debug", skip(self), fields(op = "delete"))]
    async fn delete_object(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_error("failed to delete", &path, err)),
        }
    }

    #[tracing::instrument(name = "storage", level = "debug", skip(self, stream), fields(op = "write"))]
    async fn write_stream(&self, key: &str, mut stream: ByteStream) -> AppResult<u64> {
        let path = self.path_for(key)?;
        let parent = path.parent().unwrap_or(&self.dir).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|err| storage_error("failed to create", &parent, err))?;

        // Readers never observe a half-written object: write aside, then rename.
        let partial = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(&parent)
            .map_err(|err| storage_error("failed to stage in", &parent, err))?
            .into_temp_path();
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&partial)
            .await
            .map_err(|err| storage_error("failed to open", &partial, err))?;
        let bytes = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|err| storage_error("failed to write", &path, err))?;
        file.flush()
            .await
            .map_err(|err| storage_error("failed to flush", &path, err))?;
        file.sync_all()
            .await
            .map_err(|err| storage_error("failed to sync", &path, err))?;
        drop(file);
        partial
            .persist(&path)
            .map_err(|err| storage_error("failed to commit", &path, err.error))?;
        Ok(bytes)
    }
}
