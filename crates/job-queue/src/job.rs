//! Render job records and the status view handed to pollers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subburn_cue_model::request::RenderInput;

/// Lifecycle state of a render job.
///
/// `Waiting -> Active -> {Completed | Failed}`; a retried attempt goes
/// `Active -> Waiting` on the same record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStatus::Waiting => "waiting",
            JobStatus::Active => "active",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Stored state of one job.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub input: Arc<RenderInput>,
    pub status: JobStatus,
    /// Percent, `0.0..=100.0`, never decreasing.
    pub progress: f64,
    /// Attempts started so far.
    pub attempts: u32,
    pub result: Option<Arc<Vec<u8>>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, input: Arc<RenderInput>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            input,
            status: JobStatus::Waiting,
            progress: 0.0,
            attempts: 0,
            result: None,
            failure_reason: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            attempts: self.attempts,
            result_size: self.result.as_ref().map(|bytes| bytes.len()),
            result: self.result.clone(),
            failure_reason: self.failure_reason.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            updated_at: self.updated_at,
        }
    }
}

/// Point-in-time copy of a job's status.
///
/// Serializes without the video bytes; `resultSize` stands in for them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub attempts: u32,
    #[serde(skip)]
    pub result: Option<Arc<Vec<u8>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subburn_cue_model::style::Style;

    fn input() -> Arc<RenderInput> {
        Arc::new(RenderInput::new(vec![1, 2, 3], Vec::new(), Style::default()).unwrap())
    }

    #[test]
    fn test_new_record_is_waiting() {
        let record = JobRecord::new("j1", input());
        assert_eq!(record.status, JobStatus::Waiting);
        assert_eq!(record.attempts, 0);
        assert!(record.result.is_none());
        assert!(!record.snapshot().is_terminal());
    }

    #[test]
    fn test_snapshot_serializes_result_size_not_bytes() {
        let mut record = JobRecord::new("j1", input());
        record.status = JobStatus::Completed;
        record.result = Some(Arc::new(vec![0u8; 42]));

        let json = serde_json::to_value(record.snapshot()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["resultSize"], 42);
        assert!(json.get("result").is_none());
        assert!(json.get("failureReason").is_none());
        assert!(json.get("createdAt").is_some());
    }
}
