//! Subburn Job Queue
//!
//! Accepts burn-in requests, stores their state and runs them on a bounded
//! pool of tokio workers. Job starts are rate limited independently of the
//! worker count, and failures of the external encoder are retried with
//! exponential backoff before a job is marked failed.

pub mod handler;
pub mod job;
pub mod queue;
pub mod rate_limit;
pub mod store;

pub use handler::JobHandler;
pub use job::{JobRecord, JobSnapshot, JobStatus};
pub use queue::{backoff_delay, JobQueue, SHUTDOWN_REASON};
pub use rate_limit::RateLimiter;
pub use store::{JobStore, MemoryJobStore};
