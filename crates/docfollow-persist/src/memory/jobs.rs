use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::job_store::JobStore;
use crate::models::ScheduledJob;

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, ScheduledJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: ScheduledJob) -> Result<()> {
        self.jobs.lock().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn remove(&self, job_id: &str) -> Result<bool> {
        Ok(self.jobs.lock().await.remove(job_id).is_some())
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledJob>> {
        let mut jobs = self.jobs.lock().await;
        let mut due: Vec<(DateTime<Utc>, String)> = jobs
            .values()
            .filter(|j| j.run_at <= now)
            .map(|j| (j.run_at, j.id.clone()))
            .collect();
        due.sort();
        due.truncate(limit);

        Ok(due
            .into_iter()
            .filter_map(|(_, id)| jobs.remove(&id))
            .collect())
    }

    async fn list(&self) -> Result<Vec<ScheduledJob>> {
        let mut jobs: Vec<ScheduledJob> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.run_at.cmp(&b.run_at));
        Ok(jobs)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.jobs.lock().await.len() as u64)
    }
}
