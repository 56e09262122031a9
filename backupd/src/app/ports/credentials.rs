// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use async_trait::async_trait;

use crate::app::errors::AppResult;

#[async_trait]
/// Service identity used to reach every target host.
pub trait CredentialStorePort: Send + Sync {
    fn private_key_path(&self) -> &Path;
    fn passphrase(&self) -> Option<String>;
    async fn private_key(&self) -> AppResult<Vec<u8>>;
    /// OpenSSH single-line public key (`<type> <base64> [comment]`).
    async fn public_key(&self) -> AppResult<String>;
}
