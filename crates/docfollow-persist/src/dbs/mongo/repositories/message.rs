use bson::doc;
use mongodb::{Client, Collection};

use crate::dbs::mongo::map_write_error;
use crate::dbs::mongo::models::MongoProcessedMessage;
use crate::error::{PersistError, Result};

/// Gateway message ids across all followups, keyed on `_id`
#[derive(Clone)]
pub struct MongoProcessedMessageRepository {
    collection: Collection<MongoProcessedMessage>,
}

impl MongoProcessedMessageRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("processed_messages");
        Self { collection }
    }

    /// Insert the id; the `_id` index rejects a second insert of the same id.
    pub async fn claim(&self, message_id: &str, followup_id: &str) -> Result<Option<String>> {
        let row = MongoProcessedMessage {
            id: message_id.to_string(),
            followup_id: followup_id.to_string(),
            received_at: bson::DateTime::now(),
        };

        match self.collection.insert_one(&row).await {
            Ok(_) => Ok(None),
            Err(e) => match map_write_error(e, &format!("message {}", message_id)) {
                PersistError::Duplicate(_) => {
                    let existing = self.collection.find_one(doc! { "_id": message_id }).await?;
                    Ok(Some(
                        existing.map(|m| m.followup_id).unwrap_or_default(),
                    ))
                }
                other => Err(other),
            },
        }
    }

    pub async fn release(&self, message_id: &str) -> Result<()> {
        self.collection.delete_one(doc! { "_id": message_id }).await?;
        Ok(())
    }
}
