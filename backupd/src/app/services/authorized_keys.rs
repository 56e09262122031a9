// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::services::shell::sh_escape;

pub const AUTHORIZED_KEYS: &str = "~/.ssh/authorized_keys";
const PRESENT: &str = "present";
const ABSENT: &str = "absent";

/// Extracts the base64 body of an OpenSSH public key line.
///
/// Only the body is matched on the host so that comments and key options do
/// not affect detection. The body is restricted to the base64 alphabet, which
/// keeps it safe inside the `sed` address built by [`removal_command`].
pub fn key_body(public_key: &str) -> AppResult<&str> {
    let mut fields = public_key.split_whitespace();
    let body = match (fields.next(), fields.next()) {
        (Some(_kind), Some(body)) => body,
        _ => {
            return Err(AppError::with_message(
                AppErrorKind::InvalidArgument,
                codes::INVALID_ARGUMENT,
                "public key is not in OpenSSH '<type> <base64>' form",
            ));
        }
    };
    let valid = body.len() >= 16
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
    if !valid {
        return Err(AppError::with_message(
            AppErrorKind::InvalidArgument,
            codes::INVALID_ARGUMENT,
            "public key body is not base64",
        ));
    }
    Ok(body)
}

/// Prints `present` or `absent`; exits zero either way.
pub fn presence_command(body: &str) -> String {
    format!(
        "if grep -qF -- {} {AUTHORIZED_KEYS} 2>/dev/null; then echo {PRESENT}; else echo {ABSENT}; fi",
        sh_escape(body)
    )
}

pub fn removal_command(body: &str) -> String {
    format!("sed -i '\\#{body}#d' {AUTHORIZED_KEYS}")
}

/// Reads the output of [`presence_command`].
pub fn parse_presence(output: &str) -> Option<bool> {
    match output.lines().map(str::trim).rfind(|line| !line.is_empty()) {
        Some(PRESENT) => Some(true),
        Some(ABSENT) => Some(false),
        _ => None,
    }
}
