// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::app::errors::AppResult;
use crate::app::types::{BackupDestination, StoredObject};

pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
/// Bucket-scoped object storage client.
pub trait ObjectStoragePort: Send + Sync {
    async fn list_objects(&self, prefix: &str) -> AppResult<Vec<StoredObject>>;
    async fn delete_object(&self, key: &str) -> AppResult<()>;
    /// Writes the whole stream under `key`; returns the number of bytes stored.
    async fn write_stream(&self, key: &str, stream: ByteStream) -> AppResult<u64>;
}

/// Resolves the bucket client for a destination.
pub trait ObjectStorageProvider: Send + Sync {
    /// Rejects bucket names the backend cannot address.
    fn check_bucket(&self, bucket: &str) -> AppResult<()>;
    fn bucket(&self, destination: &BackupDestination) -> AppResult<Arc<dyn ObjectStoragePort>>;
}
