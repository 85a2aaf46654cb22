use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::ScheduledJob;

/// Durable storage for scheduled jobs.
///
/// `claim_due` removes the jobs it returns, so a job is handed to at most one
/// poller and a later `remove` of the same id reports `false`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace a job by id
    async fn insert(&self, job: ScheduledJob) -> Result<()>;

    /// Returns false when the id is unknown
    async fn remove(&self, job_id: &str) -> Result<bool>;

    /// Atomically take up to `limit` jobs with `run_at <= now`, earliest first
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledJob>>;

    /// All pending jobs ordered by `run_at`
    async fn list(&self) -> Result<Vec<ScheduledJob>>;

    async fn count(&self) -> Result<u64>;
}
