// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod cli;
pub mod credentials;
pub mod db;
pub mod http;
pub mod notify;
pub mod queue;
pub mod ssh;
pub mod storage;
pub mod time;
