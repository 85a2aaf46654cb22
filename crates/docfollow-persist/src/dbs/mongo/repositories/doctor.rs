use bson::{doc, oid::ObjectId, Document};
use docfollow_types::{Doctor, DoctorSettingsUpdate};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};

use crate::dbs::mongo::map_write_error;
use crate::dbs::mongo::models::MongoDoctor;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoDoctorRepository {
    collection: Collection<MongoDoctor>,
}

impl MongoDoctorRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("doctors");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn create_doctor(&self, doctor: Doctor) -> Result<MongoDoctor> {
        let email = doctor.email.clone();
        let doctor = MongoDoctor::from_domain(doctor, ObjectId::new());
        self.collection
            .insert_one(&doctor)
            .await
            .map_err(|e| map_write_error(e, &format!("email {}", email)))?;
        Ok(doctor)
    }

    pub async fn get_doctor(&self, id: ObjectId) -> Result<Option<MongoDoctor>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<MongoDoctor>> {
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    pub async fn update_settings(
        &self,
        id: ObjectId,
        update: DoctorSettingsUpdate,
    ) -> Result<Option<MongoDoctor>> {
        let mut set = Document::new();
        if let Some(v) = update.whatsapp_connected {
            set.insert("whatsapp_connected", v);
        }
        if let Some(v) = update.whatsapp_number {
            set.insert("whatsapp_number", v);
        }
        if let Some(v) = update.whatsapp_sandbox_id {
            set.insert("whatsapp_sandbox_id", v);
        }
        if let Some(v) = update.google_calendar_connected {
            set.insert("google_calendar_connected", v);
        }
        if let Some(v) = update.settings {
            set.insert("settings", bson::to_bson(&v)?);
        }

        if set.is_empty() {
            return self.get_doctor(id).await;
        }

        Ok(self
            .collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?)
    }
}
