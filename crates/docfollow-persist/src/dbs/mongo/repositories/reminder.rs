use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::{DateTime, Utc};
use docfollow_types::{Reminder, ReminderStatus};
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, IndexModel};
use std::collections::BTreeMap;

use crate::dbs::mongo::models::MongoReminder;
use crate::error::Result;
use crate::models::{ReminderFilter, ReminderUpdate};

#[derive(Clone)]
pub struct MongoReminderRepository {
    collection: Collection<MongoReminder>,
}

fn status_strings(statuses: &[ReminderStatus]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.as_str()).collect()
}

fn filter_document(filter: &ReminderFilter) -> Document {
    let mut query = Document::new();
    if let Some(doctor_id) = &filter.doctor_id {
        query.insert("doctor_id", doctor_id.as_str());
    }
    if let Some(patient_id) = &filter.patient_id {
        query.insert("patient_id", patient_id.as_str());
    }
    if !filter.statuses.is_empty() {
        query.insert("status", doc! { "$in": status_strings(&filter.statuses) });
    }
    if let Some(due) = filter.due_before {
        query.insert("followup_date", doc! { "$lte": bson::DateTime::from_chrono(due) });
    }
    query
}

impl MongoReminderRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("reminders");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "doctor_id": 1, "followup_date": 1 })
                    .build(),
            )
            .await?;
        Ok(())
    }

    pub async fn create_reminder(&self, reminder: Reminder) -> Result<MongoReminder> {
        let reminder = MongoReminder::from_domain(reminder, ObjectId::new());
        self.collection.insert_one(&reminder).await?;
        Ok(reminder)
    }

    pub async fn get_reminder(&self, id: ObjectId) -> Result<Option<MongoReminder>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<MongoReminder>> {
        let reminders = self
            .collection
            .find(filter_document(filter))
            .sort(doc! { "followup_date": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(reminders)
    }

    pub async fn update_reminder(
        &self,
        id: ObjectId,
        update: ReminderUpdate,
    ) -> Result<Option<MongoReminder>> {
        if update.is_empty() {
            return self.get_reminder(id).await;
        }

        let mut set = Document::new();
        if let Some(status) = update.status {
            set.insert("status", status.as_str());
        }
        if let Some(date) = update.followup_date {
            set.insert("followup_date", bson::DateTime::from_chrono(date));
        }
        if let Some(v) = update.message_template {
            set.insert("message_template", v);
        }
        if let Some(v) = update.scheduled_job_id {
            set.insert("scheduled_job_id", v);
        }
        if let Some(v) = update.error_message {
            set.insert("error_message", v);
        }
        if update.touch_last_attempt {
            set.insert("last_attempt", bson::DateTime::now());
        }

        let mut changes = Document::new();
        if !set.is_empty() {
            changes.insert("$set", set);
        }
        if update.increment_attempts {
            changes.insert("$inc", doc! { "attempts": 1 });
        }

        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": id }, changes)
            .return_document(ReturnDocument::After)
            .await?)
    }

    pub async fn delete_reminder(&self, id: ObjectId) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn delete_stale(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[ReminderStatus],
    ) -> Result<u64> {
        let filter = doc! {
            "created_at": { "$lt": bson::DateTime::from_chrono(cutoff) },
            "status": { "$in": status_strings(statuses) },
        };
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }

    pub async fn status_counts(&self, doctor_id: &str) -> Result<BTreeMap<String, u64>> {
        let pipeline = vec![
            doc! { "$match": { "doctor_id": doctor_id } },
            doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } },
        ];

        let groups: Vec<Document> = self
            .collection
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?;

        let mut counts = BTreeMap::new();
        for group in groups {
            let Ok(status) = group.get_str("_id") else {
                continue;
            };
            let count = match group.get("count") {
                Some(Bson::Int32(n)) => *n as u64,
                Some(Bson::Int64(n)) => *n as u64,
                _ => 0,
            };
            counts.insert(status.to_string(), count);
        }
        Ok(counts)
    }

    pub async fn count(&self, filter: &ReminderFilter) -> Result<u64> {
        Ok(self
            .collection
            .count_documents(filter_document(filter))
            .await?)
    }
}
