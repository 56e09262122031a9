// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;

#[async_trait]
/// Hands a claimed job to the worker pool for out-of-line execution.
pub trait JobDispatchPort: Send + Sync {
    async fn dispatch(&self, job_id: i64) -> AppResult<()>;
}
