use bson::{doc, oid::ObjectId, Document};
use docfollow_types::{Appointment, AppointmentUpdate};
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, IndexModel};

use crate::dbs::mongo::models::MongoAppointment;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoAppointmentRepository {
    collection: Collection<MongoAppointment>,
}

impl MongoAppointmentRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("appointments");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "doctor_id": 1, "datetime": 1 })
                    .build(),
            )
            .await?;
        Ok(())
    }

    pub async fn create_appointment(&self, appointment: Appointment) -> Result<MongoAppointment> {
        let appointment = MongoAppointment::from_domain(appointment, ObjectId::new());
        self.collection.insert_one(&appointment).await?;
        Ok(appointment)
    }

    pub async fn get_appointment(&self, id: ObjectId) -> Result<Option<MongoAppointment>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn list_appointments(&self, doctor_id: &str) -> Result<Vec<MongoAppointment>> {
        let appointments = self
            .collection
            .find(doc! { "doctor_id": doctor_id })
            .sort(doc! { "datetime": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(appointments)
    }

    pub async fn update_appointment(
        &self,
        id: ObjectId,
        doctor_id: &str,
        update: AppointmentUpdate,
    ) -> Result<Option<MongoAppointment>> {
        let filter = doc! { "_id": id, "doctor_id": doctor_id };

        let mut set = Document::new();
        if let Some(v) = update.datetime {
            set.insert("datetime", bson::DateTime::from_chrono(v));
        }
        if let Some(v) = update.status {
            set.insert("status", v.as_str());
        }

        if set.is_empty() {
            return Ok(self.collection.find_one(filter).await?);
        }

        Ok(self
            .collection
            .find_one_and_update(filter, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?)
    }

    pub async fn delete_appointment(&self, id: ObjectId, doctor_id: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id, "doctor_id": doctor_id })
            .await?;
        Ok(result.deleted_count > 0)
    }
}
