use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{Client, Collection, IndexModel};

use crate::dbs::mongo::models::MongoJob;
use crate::error::Result;
use crate::job_store::JobStore;
use crate::models::ScheduledJob;

/// `scheduled_jobs` collection backing the reminder scheduler
#[derive(Clone)]
pub struct MongoJobStore {
    collection: Collection<MongoJob>,
}

impl MongoJobStore {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("scheduled_jobs");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.collection
            .create_index(IndexModel::builder().keys(doc! { "run_at": 1 }).build())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for MongoJobStore {
    async fn insert(&self, job: ScheduledJob) -> Result<()> {
        let job = MongoJob::from(job);
        self.collection
            .replace_one(doc! { "_id": job.id.as_str() }, &job)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn remove(&self, job_id: &str) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": job_id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledJob>> {
        let filter = doc! { "run_at": { "$lte": bson::DateTime::from_chrono(now) } };
        let mut claimed = Vec::new();

        while claimed.len() < limit {
            let job = self
                .collection
                .find_one_and_delete(filter.clone())
                .sort(doc! { "run_at": 1 })
                .await?;
            match job {
                Some(job) => claimed.push(job.into()),
                None => break,
            }
        }

        Ok(claimed)
    }

    async fn list(&self) -> Result<Vec<ScheduledJob>> {
        let jobs: Vec<MongoJob> = self
            .collection
            .find(doc! {})
            .sort(doc! { "run_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(jobs.into_iter().map(Into::into).collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }
}
