//! Job record storage.
//!
//! Every mutation happens under one lock, so a reader never sees a
//! half-applied transition such as `completed` without a result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use subburn_common::error::{SubburnError, SubburnResult};
use subburn_cue_model::request::RenderInput;

use crate::job::{JobRecord, JobSnapshot, JobStatus};

/// Persistence for job records.
pub trait JobStore: Send + Sync {
    /// Create a `Waiting` record.
    fn insert(&self, id: &str, input: Arc<RenderInput>) -> SubburnResult<()>;

    fn snapshot(&self, id: &str) -> SubburnResult<JobSnapshot>;

    fn input(&self, id: &str) -> SubburnResult<Arc<RenderInput>>;

    /// `Waiting -> Active`. Returns the attempt number now starting.
    fn start_attempt(&self, id: &str) -> SubburnResult<u32>;

    /// Raise progress of an active job. Lower values and updates to jobs
    /// that are not active are ignored.
    fn set_progress(&self, id: &str, progress: f64) -> SubburnResult<()>;

    /// `Active -> Completed` with the output video.
    fn complete(&self, id: &str, result: Vec<u8>) -> SubburnResult<()>;

    /// `Active -> Waiting` for another attempt, remembering why.
    fn requeue(&self, id: &str, reason: &str) -> SubburnResult<()>;

    /// Any non-terminal state `-> Failed`.
    fn fail(&self, id: &str, reason: &str) -> SubburnResult<()>;

    fn list(&self) -> Vec<JobSnapshot>;

    /// Drop a completed or failed job along with its result bytes.
    /// Jobs that are still waiting or running cannot be removed.
    fn remove(&self, id: &str) -> SubburnResult<JobSnapshot>;
}

/// In-process [`JobStore`].
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut JobRecord) -> SubburnResult<T>,
    ) -> SubburnResult<T> {
        let mut jobs = self.lock();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| SubburnError::JobNotFound { id: id.to_string() })?;
        let value = apply(&mut *record)?;
        record.updated_at = Utc::now();
        Ok(value)
    }
}

fn transition_error(record: &JobRecord, to: JobStatus) -> SubburnError {
    SubburnError::queue(format!(
        "Job {} cannot move from {} to {}",
        record.id, record.status, to
    ))
}

impl JobStore for MemoryJobStore {
    fn insert(&self, id: &str, input: Arc<RenderInput>) -> SubburnResult<()> {
        let mut jobs = self.lock();
        if jobs.contains_key(id) {
            return Err(SubburnError::queue(format!("Job {id} already exists")));
        }
        jobs.insert(id.to_string(), JobRecord::new(id, input));
        Ok(())
    }

    fn snapshot(&self, id: &str) -> SubburnResult<JobSnapshot> {
        self.lock()
            .get(id)
            .map(JobRecord::snapshot)
            .ok_or_else(|| SubburnError::JobNotFound { id: id.to_string() })
    }

    fn input(&self, id: &str) -> SubburnResult<Arc<RenderInput>> {
        self.lock()
            .get(id)
            .map(|record| record.input.clone())
            .ok_or_else(|| SubburnError::JobNotFound { id: id.to_string() })
    }

    fn start_attempt(&self, id: &str) -> SubburnResult<u32> {
        self.update(id, |record| {
            if record.status != JobStatus::Waiting {
                return Err(transition_error(record, JobStatus::Active));
            }
            record.status = JobStatus::Active;
            record.attempts += 1;
            if record.started_at.is_none() {
                record.started_at = Some(Utc::now());
            }
            Ok(record.attempts)
        })
    }

    fn set_progress(&self, id: &str, progress: f64) -> SubburnResult<()> {
        let mut jobs = self.lock();
        let record = jobs
            .get_mut(id)
            .ok_or_else(|| SubburnError::JobNotFound { id: id.to_string() })?;
        if record.status != JobStatus::Active || !progress.is_finite() {
            return Ok(());
        }
        let progress = progress.clamp(0.0, 100.0);
        if progress > record.progress {
            record.progress = progress;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    fn complete(&self, id: &str, result: Vec<u8>) -> SubburnResult<()> {
        self.update(id, |record| {
            if record.status != JobStatus::Active {
                return Err(transition_error(record, JobStatus::Completed));
            }
            record.status = JobStatus::Completed;
            record.progress = 100.0;
            record.result = Some(Arc::new(result));
            record.failure_reason = None;
            record.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    fn requeue(&self, id: &str, reason: &str) -> SubburnResult<()> {
        self.update(id, |record| {
            if record.status != JobStatus::Active {
                return Err(transition_error(record, JobStatus::Waiting));
            }
            record.status = JobStatus::Waiting;
            record.failure_reason = Some(reason.to_string());
            Ok(())
        })
    }

    fn fail(&self, id: &str, reason: &str) -> SubburnResult<()> {
        self.update(id, |record| {
            if record.status.is_terminal() {
                return Err(transition_error(record, JobStatus::Failed));
            }
            record.status = JobStatus::Failed;
            record.result = None;
            record.failure_reason = Some(reason.to_string());
            record.finished_at = Some(Utc::now());
            Ok(())
        })
    }

    fn list(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self.lock().values().map(JobRecord::snapshot).collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    fn remove(&self, id: &str) -> SubburnResult<JobSnapshot> {
        let mut jobs = self.lock();
        let record = jobs
            .get(id)
            .ok_or_else(|| SubburnError::JobNotFound { id: id.to_string() })?;
        if !record.status.is_terminal() {
            return Err(SubburnError::queue(format!(
                "Job {id} is {} and cannot be removed",
                record.status
            )));
        }
        jobs.remove(id)
            .map(|record| record.snapshot())
            .ok_or_else(|| SubburnError::JobNotFound { id: id.to_string() })
    }
}
