use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::{DateTime, Utc};
use docfollow_types::{Followup, FollowupFilter, FollowupStatus};
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, IndexModel};

use crate::dbs::mongo::models::{MongoAppointmentDetails, MongoFollowup, MongoHistoryEntry};
use crate::error::Result;
use crate::models::FollowupUpdate;

#[derive(Clone)]
pub struct MongoFollowupRepository {
    collection: Collection<MongoFollowup>,
}

fn status_strings(statuses: &[FollowupStatus]) -> Vec<&'static str> {
    statuses.iter().map(|s| s.as_str()).collect()
}

impl MongoFollowupRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("followups");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "patient_id": 1, "created_at": -1 })
                    .build(),
            )
            .await?;
        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "doctor_id": 1, "status": 1 })
                    .build(),
            )
            .await?;
        Ok(())
    }

    pub async fn create_followup(&self, followup: Followup) -> Result<MongoFollowup> {
        let followup = MongoFollowup::from_domain(followup, ObjectId::new());
        self.collection.insert_one(&followup).await?;
        Ok(followup)
    }

    pub async fn get_followup(&self, id: ObjectId) -> Result<Option<MongoFollowup>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn list_followups(&self, filter: &FollowupFilter) -> Result<Vec<MongoFollowup>> {
        let mut query = Document::new();
        if let Some(doctor_id) = &filter.doctor_id {
            query.insert("doctor_id", doctor_id.as_str());
        }
        if let Some(patient_id) = &filter.patient_id {
            query.insert("patient_id", patient_id.as_str());
        }
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }

        let followups = self
            .collection
            .find(query)
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(followups)
    }

    pub async fn find_active(
        &self,
        patient_id: &str,
        statuses: &[FollowupStatus],
    ) -> Result<Option<MongoFollowup>> {
        let filter = doc! {
            "patient_id": patient_id,
            "status": { "$in": status_strings(statuses) },
        };
        Ok(self
            .collection
            .find_one(filter)
            .sort(doc! { "created_at": -1 })
            .await?)
    }

    /// One `find_one_and_update` carrying every change in `update`.
    pub async fn apply_update(
        &self,
        id: ObjectId,
        update: FollowupUpdate,
    ) -> Result<Option<MongoFollowup>> {
        let terminal = status_strings(&[FollowupStatus::Closed, FollowupStatus::Completed]);

        let mut status_guard = doc! { "$nin": terminal };
        if let Some(expected) = &update.expected_status {
            status_guard.insert("$in", status_strings(expected));
        }

        let mut filter = doc! { "_id": id, "status": status_guard };
        if let Some(key) = &update.dedup_key {
            filter.insert("processed_message_ids", doc! { "$ne": key.as_str() });
        }

        let now = bson::DateTime::now();
        let mut set = doc! { "updated_at": now };
        if let Some(status) = update.status {
            set.insert("status", status.as_str());
        }
        if let Some(v) = update.ai_draft_message {
            set.insert("ai_draft_message", v);
        }
        if let Some(v) = update.doctor_summary {
            set.insert("doctor_summary", v);
        }
        if let Some(v) = update.suggests_appointment {
            set.insert("suggests_appointment", v);
        }
        if let Some(v) = update.doctor_decision {
            set.insert("doctor_decision", v);
        }
        if let Some(v) = update.final_message_sent {
            set.insert("final_message_sent", v);
        }
        if let Some(v) = update.final_message {
            set.insert("final_message", v);
        }
        if let Some(details) = update.appointment_details {
            set.insert(
                "appointment_details",
                bson::to_bson(&MongoAppointmentDetails::from(details))?,
            );
        }
        if let Some(v) = update.scheduled_for {
            set.insert("scheduled_for", v.map(bson::DateTime::from_chrono));
        }
        if let Some(v) = update.scheduled_job_id {
            set.insert("scheduled_job_id", v);
        }
        if let Some(v) = update.error_message {
            set.insert("error_message", v);
        }
        if update.touch_last_attempt {
            set.insert("last_attempt", now);
        }

        let mut push = Document::new();
        if !update.push_history.is_empty() {
            let entries = update
                .push_history
                .into_iter()
                .map(|e| {
                    let mut entry = MongoHistoryEntry::from(e);
                    entry.timestamp = now;
                    bson::to_bson(&entry)
                })
                .collect::<std::result::Result<Vec<Bson>, _>>()?;
            push.insert("history", doc! { "$each": entries });
        }
        if let Some(text) = update.append_extracted_text {
            push.insert("extracted_text_parts", text);
        }

        let mut add_to_set = Document::new();
        if !update.add_raw_data.is_empty() {
            add_to_set.insert("raw_data", doc! { "$each": update.add_raw_data });
        }
        if let Some(key) = update.dedup_key {
            add_to_set.insert("processed_message_ids", key);
        }

        let mut changes = doc! { "$set": set };
        if !push.is_empty() {
            changes.insert("$push", push);
        }
        if !add_to_set.is_empty() {
            changes.insert("$addToSet", add_to_set);
        }
        if update.increment_attempts {
            changes.insert("$inc", doc! { "attempts": 1 });
        }

        Ok(self
            .collection
            .find_one_and_update(filter, changes)
            .return_document(ReturnDocument::After)
            .await?)
    }

    pub async fn delete_followup(&self, id: ObjectId) -> Result<bool> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn delete_stale(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[FollowupStatus],
    ) -> Result<u64> {
        let filter = doc! {
            "created_at": { "$lt": bson::DateTime::from_chrono(cutoff) },
            "status": { "$in": status_strings(statuses) },
        };
        let result = self.collection.delete_many(filter).await?;
        Ok(result.deleted_count)
    }
}
