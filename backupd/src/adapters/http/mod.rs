// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::net::SocketAddr;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::app::errors::{AppError, AppErrorKind};
use crate::app::usecases::{UseCases, WebhookOutcome};

pub fn router(usecases: UseCases) -> Router {
    Router::new()
        .route("/backup-jobs/{id}/run", post(run_job))
        .with_state(usecases)
}

pub async fn serve(addr: SocketAddr, usecases: UseCases) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind webhook listener on {addr}"))?;
    tracing::info!("webhook server listening on {addr}");
    axum::serve(listener, router(usecases))
        .await
        .context("webhook server stopped")
}

#[derive(Debug, Deserialize)]
struct RunQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct Accepted {
    status: &'static str,
    job_id: i64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error,
        message: message.into(),
        retry_after_secs: None,
    };
    (status, Json(body)).into_response()
}

fn status_from_app_error(err: &AppError) -> StatusCode {
    match err.kind() {
        AppErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        AppErrorKind::NotFound => StatusCode::NOT_FOUND,
        AppErrorKind::Conflict => StatusCode::CONFLICT,
        AppErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        AppErrorKind::Internal | AppErrorKind::Aborted => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn run_job(
    State(usecases): State<UseCases>,
    Path(job_id): Path<i64>,
    Query(query): Query<RunQuery>,
) -> Response {
    let outcome = match usecases
        .trigger_from_webhook(job_id, query.token.as_deref())
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(job_id, code = err.code(), "webhook failed: {err}");
            return error_response(status_from_app_error(&err), err.code(), err.message());
        }
    };

    match outcome {
        WebhookOutcome::Accepted => (
            StatusCode::ACCEPTED,
            Json(Accepted {
                status: "accepted",
                job_id,
            }),
        )
            .into_response(),
        WebhookOutcome::NotFound => error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("backup job {job_id} not found"),
        ),
        WebhookOutcome::Forbidden => {
            error_response(StatusCode::FORBIDDEN, "forbidden", "invalid or missing token")
        }
        WebhookOutcome::Conflict(reason) => {
            error_response(StatusCode::CONFLICT, "conflict", reason.as_str())
        }
        WebhookOutcome::RateLimited { retry_after_secs } => {
            let body = ErrorBody {
                error: "rate_limited",
                message: "too many requests for this job".into(),
                retry_after_secs: Some(retry_after_secs),
            };
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        }
    }
}
