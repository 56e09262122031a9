// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use globset::Glob;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::ObjectStoragePort;
use crate::app::services::transfer::object_key;
use crate::app::types::StoredObject;

use super::UseCases;

impl UseCases {
    /// Lists a job's stored archives, newest first, optionally filtered by a
    /// glob over the file name.
    pub async fn list_stored_backups(
        &self,
        job_id: i64,
        pattern: Option<&str>,
    ) -> AppResult<Vec<StoredObject>> {
        let job = self.load_job(job_id).await?;
        let destination = self.load_destination(job.destination_id).await?;
        let storage = self.storage.bucket(&destination)?;
        let prefix = format!("{}/", job.storage_prefix(&destination));

        let matcher = pattern
            .map(|raw| {
                Glob::new(raw)
                    .map(|glob| glob.compile_matcher())
                    .map_err(|err| {
                        AppError::with_message(
                            AppErrorKind::InvalidArgument,
                            codes::INVALID_ARGUMENT,
                            format!("invalid pattern '{raw}': {err}"),
                        )
                    })
            })
            .transpose()?;

        let mut objects: Vec<StoredObject> = storage
            .list_objects(&prefix)
            .await?
            .into_iter()
            .filter(|object| {
                let name = object.key.strip_prefix(&prefix).unwrap_or(&object.key);
                matcher.as_ref().is_none_or(|m| m.is_match(name))
            })
            .collect();
        sort_newest_first(&mut objects);
        Ok(objects)
    }

    /// Deletes one stored archive of a job. Deleting a missing archive succeeds.
    pub async fn delete_stored_backup(&self, job_id: i64, file_name: &str) -> AppResult<()> {
        if file_name.is_empty() || file_name.contains('/') {
            return Err(AppError::with_message(
                AppErrorKind::InvalidArgument,
                codes::INVALID_ARGUMENT,
                format!("'{file_name}' is not a backup file name"),
            ));
        }
        let job = self.load_job(job_id).await?;
        let destination = self.load_destination(job.destination_id).await?;
        let storage = self.storage.bucket(&destination)?;
        let key = object_key(&job.storage_prefix(&destination), file_name);
        storage.delete_object(&key).await?;
        tracing::info!(job_id, key = %key, "stored backup deleted");
        Ok(())
    }

    /// Keeps the `keep` newest objects under `prefix` and deletes the rest.
    pub(crate) async fn prune_backups(
        &self,
        storage: &dyn ObjectStoragePort,
        prefix: &str,
        keep: u32,
    ) -> AppResult<usize> {
        let mut objects = storage.list_objects(&format!("{prefix}/")).await?;
        sort_newest_first(&mut objects);
        let mut removed = 0;
        for object in objects.iter().skip(keep as usize) {
            storage.delete_object(&object.key).await?;
            removed += 1;
        }
        Ok(removed)
    }
}

fn sort_newest_first(objects: &mut [StoredObject]) {
    objects.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| b.key.cmp(&a.key))
    });
}
