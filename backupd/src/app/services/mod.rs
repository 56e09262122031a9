// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod authorized_keys;
pub mod cron;
pub mod rate_limit;
pub mod retry;
pub mod schedule;
pub mod sessions;
pub mod shell;
pub mod transfer;
