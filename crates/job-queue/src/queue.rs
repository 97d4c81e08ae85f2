//! Worker pool executing render jobs in the background.
//!
//! ```text
//! submit ── validate ── store(waiting) ── channel ──┬── worker 0 ─┐
//!                                                   ├── worker 1 ─┼── rate limiter ── handler (blocking)
//!                                                   └── worker N ─┘          │
//!        retryable failure: store(waiting) ── backoff ── channel ◄───────────┘
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use subburn_common::config::QueueConfig;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_cue_model::request::SubmitRequest;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::handler::JobHandler;
use crate::job::{JobSnapshot, JobStatus};
use crate::rate_limit::RateLimiter;
use crate::store::{JobStore, MemoryJobStore};

/// Largest exponent applied to the initial backoff.
const MAX_BACKOFF_DOUBLINGS: u32 = 16;

/// Failure reason of jobs still waiting when the queue stops.
pub const SHUTDOWN_REASON: &str = "Job queue shut down before the job could run";

/// Shared by all workers of one queue.
struct WorkerContext {
    store: Arc<dyn JobStore>,
    handler: Arc<dyn JobHandler>,
    limiter: RateLimiter,
    sender: mpsc::UnboundedSender<String>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    max_attempts: u32,
    backoff_initial: Duration,
}

/// Handle to a running worker pool.
pub struct JobQueue {
    context: Arc<WorkerContext>,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    /// Start `config.workers` workers backed by an in-memory store.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &QueueConfig, handler: Arc<dyn JobHandler>) -> Self {
        Self::with_store(config, handler, Arc::new(MemoryJobStore::new()))
    }

    pub fn with_store(
        config: &QueueConfig,
        handler: Arc<dyn JobHandler>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let context = Arc::new(WorkerContext {
            store,
            handler,
            limiter: RateLimiter::new(
                config.rate_limit_max,
                Duration::from_millis(config.rate_limit_window_ms),
            ),
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            max_attempts: config.max_attempts.max(1),
            backoff_initial: Duration::from_millis(config.backoff_initial_ms),
        });

        let worker_count = config.workers.max(1);
        let workers = (0..worker_count)
            .map(|worker_id| {
                let context = Arc::clone(&context);
                let shutdown = shutdown_rx.clone();
                tokio::spawn(worker_loop(worker_id, context, shutdown))
            })
            .collect();

        tracing::info!(
            workers = worker_count,
            rate_limit_max = config.rate_limit_max,
            rate_limit_window_ms = config.rate_limit_window_ms,
            max_attempts = config.max_attempts,
            "Job queue started"
        );

        Self {
            context,
            shutdown,
            workers: Mutex::new(workers),
        }
    }

    /// Validate a request and enqueue it. Returns the new job id.
    ///
    /// Invalid requests are rejected here and never create a job.
    pub fn submit(&self, request: SubmitRequest) -> SubburnResult<String> {
        if *self.shutdown.borrow() {
            return Err(SubburnError::queue("Job queue is shut down"));
        }

        let input = request
            .into_input()
            .map_err(|e| SubburnError::validation(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        self.context.store.insert(&id, Arc::new(input))?;
        self.context
            .sender
            .send(id.clone())
            .map_err(|_| SubburnError::queue("Job queue is shut down"))?;

        tracing::info!(job_id = %id, "Job submitted");
        Ok(id)
    }

    /// Current status of a job.
    pub fn status(&self, id: &str) -> SubburnResult<JobSnapshot> {
        self.context.store.snapshot(id)
    }

    /// All known jobs, oldest first.
    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.context.store.list()
    }

    /// Forget a completed or failed job and release its result.
    pub fn remove(&self, id: &str) -> SubburnResult<JobSnapshot> {
        let removed = self.context.store.remove(id)?;
        tracing::debug!(job_id = id, status = %removed.status, "Job removed");
        Ok(removed)
    }

    /// Poll until the job is completed or failed.
    pub async fn wait_for_terminal(
        &self,
        id: &str,
        poll_interval: Duration,
    ) -> SubburnResult<JobSnapshot> {
        loop {
            let snapshot = self.status(id)?;
            if snapshot.is_terminal() {
                return Ok(snapshot);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Stop taking new jobs and wait for workers to finish their current
    /// attempt.
    ///
    /// Jobs that never got to run (still queued or waiting for a retry)
    /// are failed, so every submitted job ends in a terminal state.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let workers: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            if let Err(err) = worker.await {
                tracing::warn!(error = %err, "Worker task ended abnormally");
            }
        }

        let mut abandoned = 0usize;
        for job in self.context.store.list() {
            if job.status != JobStatus::Waiting {
                continue;
            }
            match self.context.store.fail(&job.id, SHUTDOWN_REASON) {
                Ok(()) => abandoned += 1,
                Err(err) => tracing::warn!(job_id = %job.id, error = %err, "Failed to close job"),
            }
        }
        tracing::info!(abandoned, "Job queue stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    context: Arc<WorkerContext>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            id = async { context.receiver.lock().await.recv().await } => id,
        };
        let Some(id) = next else {
            break;
        };

        context.limiter.acquire().await;
        run_attempt(worker_id, &context, &id, &shutdown).await;
    }

    tracing::debug!(worker_id, "Worker stopped");
}

async fn run_attempt(
    worker_id: usize,
    context: &Arc<WorkerContext>,
    id: &str,
    shutdown: &watch::Receiver<bool>,
) {
    let attempt = match context.store.start_attempt(id) {
        Ok(attempt) => attempt,
        Err(err) => {
            tracing::warn!(job_id = id, error = %err, "Skipping job");
            return;
        }
    };
    let input = match context.store.input(id) {
        Ok(input) => input,
        Err(err) => {
            tracing::warn!(job_id = id, error = %err, "Job input missing");
            let _ = context.store.fail(id, &err.to_string());
            return;
        }
    };

    tracing::info!(job_id = id, worker_id, attempt, "Job started");

    let store = Arc::clone(&context.store);
    let handler = Arc::clone(&context.handler);
    let job_id = id.to_string();
    let outcome = tokio::task::spawn_blocking(move || {
        let report = |value: f64| {
            if let Err(err) = store.set_progress(&job_id, value) {
                tracing::debug!(job_id = %job_id, error = %err, "Progress update dropped");
            }
        };
        handler.handle(&job_id, &input, &report)
    })
    .await;

    let transition = match outcome {
        Ok(Ok(bytes)) => {
            tracing::info!(job_id = id, attempt, output_bytes = bytes.len(), "Job completed");
            context.store.complete(id, bytes)
        }
        Ok(Err(err)) if err.is_retryable() && attempt < context.max_attempts => {
            let delay = backoff_delay(context.backoff_initial, attempt);
            tracing::warn!(
                job_id = id,
                attempt,
                max_attempts = context.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Job attempt failed, retrying"
            );
            let requeued = context.store.requeue(id, &err.to_string());
            if requeued.is_ok() {
                schedule_retry(context, id.to_string(), delay, shutdown.clone());
            }
            requeued
        }
        Ok(Err(err)) => {
            tracing::error!(job_id = id, attempt, error = %err, "Job failed");
            context.store.fail(id, &err.to_string())
        }
        Err(join_err) => {
            tracing::error!(job_id = id, attempt, error = %join_err, "Job handler panicked");
            context
                .store
                .fail(id, &format!("Render worker crashed: {join_err}"))
        }
    };

    if let Err(err) = transition {
        tracing::warn!(job_id = id, error = %err, "Failed to record job outcome");
    }
}

fn schedule_retry(
    context: &Arc<WorkerContext>,
    id: String,
    delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let sender = context.sender.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                if sender.send(id.clone()).is_err() {
                    tracing::warn!(job_id = %id, "Queue closed before retry");
                }
            }
            _ = shutdown.changed() => {
                tracing::debug!(job_id = %id, "Retry abandoned on shutdown");
            }
        }
    });
}

/// `initial * 2^(attempt - 1)`.
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let doublings = attempt.saturating_sub(1).min(MAX_BACKOFF_DOUBLINGS);
    initial.saturating_mul(1u32 << doublings)
}
