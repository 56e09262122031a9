// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;

use crate::app::ports::SessionError;

pub mod codes {
    pub const AUTHENTICATION_FAILURE: &str = "authentication_failure";
    pub const CONNECTION_FAILURE: &str = "connection_failure";
    pub const CONNECTION_CLOSED: &str = "connection_closed";
    pub const COMMAND_FAILURE: &str = "command_failure";
    pub const TRANSFER_FAILURE: &str = "transfer_failure";
    pub const STORAGE_ERROR: &str = "storage_error";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const LOCAL_ERROR: &str = "local_error";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorKind {
    InvalidArgument,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct AppError {
    kind: AppErrorKind,
    code: &'static str,
    message: String,
    context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind, code: &'static str) -> Self {
        Self {
            kind,
            code,
            message: code.to_string(),
            context: None,
        }
    }

    pub fn with_message(
        kind: AppErrorKind,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::with_message(
            AppErrorKind::NotFound,
            codes::NOT_FOUND,
            format!("{what} not found"),
        )
    }

    pub fn kind(&self) -> AppErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ctx) = &self.context {
            write!(f, "{} ({})", self.message, ctx)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for AppError {}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let (kind, code) = match &err {
            SessionError::AuthenticationFailed { .. } => {
                (AppErrorKind::Unavailable, codes::AUTHENTICATION_FAILURE)
            }
            SessionError::ConnectionFailed { .. } => {
                (AppErrorKind::Unavailable, codes::CONNECTION_FAILURE)
            }
            SessionError::CommandFailed { .. } => (AppErrorKind::Aborted, codes::COMMAND_FAILURE),
            SessionError::FileTransferFailed { .. } => {
                (AppErrorKind::Aborted, codes::TRANSFER_FAILURE)
            }
            SessionError::ConnectionClosed => (AppErrorKind::Internal, codes::CONNECTION_CLOSED),
        };
        AppError::with_message(kind, code, err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
