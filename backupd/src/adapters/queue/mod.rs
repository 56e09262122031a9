// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::JobDispatchPort;
use crate::app::usecases::UseCases;

/// Sending half of the bounded job queue.
///
/// Closing the queue lets the workers drain what was already accepted and
/// exit; later dispatches fail.
#[derive(Clone)]
pub struct WorkerQueue {
    sender: Arc<Mutex<Option<mpsc::Sender<i64>>>>,
}

impl WorkerQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<i64>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    pub fn close(&self) {
        self.sender.lock().take();
    }
}

fn queue_closed(job_id: i64) -> AppError {
    AppError::with_message(
        AppErrorKind::Unavailable,
        codes::INTERNAL_ERROR,
        format!("worker queue is closed; job {job_id} not dispatched"),
    )
}

#[async_trait]
impl JobDispatchPort for WorkerQueue {
    async fn dispatch(&self, job_id: i64) -> AppResult<()> {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            return Err(queue_closed(job_id));
        };
        sender.send(job_id).await.map_err(|_| queue_closed(job_id))
    }
}

/// Fixed set of tasks executing dispatched jobs.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(workers: usize, receiver: mpsc::Receiver<i64>, usecases: UseCases) -> Self {
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let handles = (0..workers.max(1))
            .map(|worker| {
                let receiver = receiver.clone();
                let usecases = usecases.clone();
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(job_id) = next else {
                            tracing::debug!(worker, "worker queue closed; stopping");
                            break;
                        };
                        match usecases.execute_job(job_id).await {
                            Ok(outcome) => {
                                tracing::debug!(worker, job_id, ?outcome, "job finished")
                            }
                            Err(err) => {
                                tracing::error!(worker, job_id, "job execution failed: {err}")
                            }
                        }
                    }
                })
            })
            .collect();
        Self { handles }
    }

    /// Waits for every worker to exit; call after closing the queue.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                tracing::error!("worker task panicked: {err}");
            }
        }
    }
}
