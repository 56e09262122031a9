// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::app::errors::AppResult;
use crate::app::types::{ConnectivityStatus, NewHost, RemoteHost};

#[async_trait]
pub trait HostStorePort: Send + Sync {
    async fn insert_host(&self, host: &NewHost) -> AppResult<i64>;
    async fn get_host(&self, id: i64) -> AppResult<Option<RemoteHost>>;
    async fn list_hosts(&self) -> AppResult<Vec<RemoteHost>>;
    async fn update_connectivity(
        &self,
        id: i64,
        status: ConnectivityStatus,
        checked_at: OffsetDateTime,
    ) -> AppResult<()>;
}
