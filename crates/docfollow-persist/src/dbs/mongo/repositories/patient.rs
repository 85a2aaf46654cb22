use bson::{doc, oid::ObjectId, Document};
use docfollow_types::{Patient, PatientUpdate};
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, IndexModel};

use crate::dbs::mongo::models::MongoPatient;
use crate::error::Result;

#[derive(Clone)]
pub struct MongoPatientRepository {
    collection: Collection<MongoPatient>,
}

impl MongoPatientRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("patients");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.collection
            .create_index(IndexModel::builder().keys(doc! { "phone": 1 }).build())
            .await?;
        self.collection
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "doctor_id": 1, "created_at": -1 })
                    .build(),
            )
            .await?;
        Ok(())
    }

    pub async fn create_patient(&self, patient: Patient) -> Result<MongoPatient> {
        let patient = MongoPatient::from_domain(patient, ObjectId::new());
        self.collection.insert_one(&patient).await?;
        Ok(patient)
    }

    pub async fn get_patient(&self, id: ObjectId) -> Result<Option<MongoPatient>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn list_patients(&self, doctor_id: &str) -> Result<Vec<MongoPatient>> {
        let patients = self
            .collection
            .find(doc! { "doctor_id": doctor_id })
            .sort(doc! { "created_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(patients)
    }

    pub async fn update_patient(
        &self,
        id: ObjectId,
        doctor_id: &str,
        update: PatientUpdate,
    ) -> Result<Option<MongoPatient>> {
        let filter = doc! { "_id": id, "doctor_id": doctor_id };

        let mut set = Document::new();
        if let Some(v) = update.phone {
            set.insert("phone", v);
        }
        if let Some(v) = update.address {
            set.insert("address", v);
        }
        if let Some(v) = update.notes {
            set.insert("notes", v);
        }
        if let Some(v) = update.image_url {
            set.insert("image_url", v);
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

    pub async fn delete_patient(&self, id: ObjectId, doctor_id: &str) -> Result<bool> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id, "doctor_id": doctor_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Vec<MongoPatient>> {
        let patients = self
            .collection
            .find(doc! { "phone": phone })
            .await?
            .try_collect()
            .await?;
        Ok(patients)
    }
}
