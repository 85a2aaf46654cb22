use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use docfollow_types::{
    Appointment, AppointmentUpdate, Doctor, DoctorSettingsUpdate, Followup, FollowupFilter, FollowupStatus, Patient, PatientUpdate,
    Reminder, ReminderStatus,
};
use mongodb::Client;
use std::collections::BTreeMap;

use crate::dbs::mongo::parse_object_id;
use crate::dbs::mongo::repositories::{
    MongoAppointmentRepository, MongoDoctorRepository, MongoFollowupRepository, MongoPatientRepository,
    MongoProcessedMessageRepository, MongoReminderRepository,
};
use crate::dbs::mongo::MongoJobStore;
use crate::error::{PersistError, Result};
use crate::models::{FollowupUpdate, ReminderFilter, ReminderUpdate};
use crate::trait_client::PersistenceClient;

pub struct MongoPersistenceClient {
    client: Client,
    database: String,
    doctor_repo: MongoDoctorRepository,
    patient_repo: MongoPatientRepository,
    followup_repo: MongoFollowupRepository,
    reminder_repo: MongoReminderRepository,
    message_repo: MongoProcessedMessageRepository,
    appointment_repo: MongoAppointmentRepository,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self {
            doctor_repo: MongoDoctorRepository::new(&client, database),
            patient_repo: MongoPatientRepository::new(&client, database),
            followup_repo: MongoFollowupRepository::new(&client, database),
            reminder_repo: MongoReminderRepository::new(&client, database),
            message_repo: MongoProcessedMessageRepository::new(&client, database),
            appointment_repo: MongoAppointmentRepository::new(&client, database),
            database: database.to_string(),
            client,
        })
    }

    /// Job store sharing this client's connection pool
    pub fn job_store(&self) -> MongoJobStore {
        MongoJobStore::new(&self.client, &self.database)
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.doctor_repo.ensure_indexes().await?;
        self.patient_repo.ensure_indexes().await?;
        self.followup_repo.ensure_indexes().await?;
        self.reminder_repo.ensure_indexes().await?;
        self.appointment_repo.ensure_indexes().await?;
        self.job_store().ensure_indexes().await?;
        tracing::debug!(database = %self.database, "MongoDB indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl PersistenceClient for MongoPersistenceClient {
    async fn create_doctor(&self, doctor: Doctor) -> Result<Doctor> {
        Ok(self.doctor_repo.create_doctor(doctor).await?.into())
    }

    async fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>> {
        let id = parse_object_id(doctor_id)?;
        Ok(self.doctor_repo.get_doctor(id).await?.map(Into::into))
    }

    async fn find_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>> {
        Ok(self.doctor_repo.find_by_email(email).await?.map(Into::into))
    }

    async fn update_doctor_settings(
        &self,
        doctor_id: &str,
        update: DoctorSettingsUpdate,
    ) -> Result<Option<Doctor>> {
        let id = parse_object_id(doctor_id)?;
        Ok(self
            .doctor_repo
            .update_settings(id, update)
            .await?
            .map(Into::into))
    }

    async fn create_patient(&self, patient: Patient) -> Result<Patient> {
        Ok(self.patient_repo.create_patient(patient).await?.into())
    }

    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>> {
        let id = parse_object_id(patient_id)?;
        Ok(self.patient_repo.get_patient(id).await?.map(Into::into))
    }

    async fn list_patients(&self, doctor_id: &str) -> Result<Vec<Patient>> {
        let patients = self.patient_repo.list_patients(doctor_id).await?;
        Ok(patients.into_iter().map(Into::into).collect())
    }

    async fn update_patient(
        &self,
        patient_id: &str,
        doctor_id: &str,
        update: PatientUpdate,
    ) -> Result<Option<Patient>> {
        let id = parse_object_id(patient_id)?;
        Ok(self
            .patient_repo
            .update_patient(id, doctor_id, update)
            .await?
            .map(Into::into))
    }

    async fn delete_patient(&self, patient_id: &str, doctor_id: &str) -> Result<bool> {
        let id = parse_object_id(patient_id)?;
        self.patient_repo.delete_patient(id, doctor_id).await
    }

    async fn find_patients_by_phone(&self, phone: &str) -> Result<Vec<Patient>> {
        let patients = self.patient_repo.find_by_phone(phone).await?;
        Ok(patients.into_iter().map(Into::into).collect())
    }

    async fn create_followup(&self, followup: Followup) -> Result<Followup> {
        Ok(self.followup_repo.create_followup(followup).await?.into())
    }

    async fn get_followup(&self, followup_id: &str) -> Result<Option<Followup>> {
        let id = parse_object_id(followup_id)?;
        Ok(self.followup_repo.get_followup(id).await?.map(Into::into))
    }

    async fn list_followups(&self, filter: &FollowupFilter) -> Result<Vec<Followup>> {
        let followups = self.followup_repo.list_followups(filter).await?;
        Ok(followups.into_iter().map(Into::into).collect())
    }

    async fn find_active_followup(
        &self,
        patient_id: &str,
        statuses: &[FollowupStatus],
    ) -> Result<Option<Followup>> {
        Ok(self
            .followup_repo
            .find_active(patient_id, statuses)
            .await?
            .map(Into::into))
    }

    async fn apply_followup_update(
        &self,
        followup_id: &str,
        update: FollowupUpdate,
    ) -> Result<Option<Followup>> {
        let id = parse_object_id(followup_id)?;
        Ok(self
            .followup_repo
            .apply_update(id, update)
            .await?
            .map(Into::into))
    }

    async fn delete_followup(&self, followup_id: &str) -> Result<bool> {
        let id = parse_object_id(followup_id)?;
        self.followup_repo.delete_followup(id).await
    }

    async fn claim_message_id(&self, message_id: &str, followup_id: &str) -> Result<Option<String>> {
        self.message_repo.claim(message_id, followup_id).await
    }

    async fn release_message_id(&self, message_id: &str) -> Result<()> {
        self.message_repo.release(message_id).await
    }

    async fn delete_stale_followups(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[FollowupStatus],
    ) -> Result<u64> {
        self.followup_repo.delete_stale(cutoff, statuses).await
    }

    async fn create_reminder(&self, reminder: Reminder) -> Result<Reminder> {
        Ok(self.reminder_repo.create_reminder(reminder).await?.into())
    }

    async fn get_reminder(&self, reminder_id: &str) -> Result<Option<Reminder>> {
        let id = parse_object_id(reminder_id)?;
        Ok(self.reminder_repo.get_reminder(id).await?.map(Into::into))
    }

    async fn list_reminders(&self, filter: &ReminderFilter) -> Result<Vec<Reminder>> {
        let reminders = self.reminder_repo.list_reminders(filter).await?;
        Ok(reminders.into_iter().map(Into::into).collect())
    }

    async fn list_reminders_for_patient(&self, patient_id: &str) -> Result<Vec<Reminder>> {
        self.list_reminders(&ReminderFilter {
            patient_id: Some(patient_id.to_string()),
            ..Default::default()
        })
        .await
    }

    async fn update_reminder(
        &self,
        reminder_id: &str,
        update: ReminderUpdate,
    ) -> Result<Option<Reminder>> {
        let id = parse_object_id(reminder_id)?;
        Ok(self
            .reminder_repo
            .update_reminder(id, update)
            .await?
            .map(Into::into))
    }

    async fn delete_reminder(&self, reminder_id: &str) -> Result<bool> {
        let id = parse_object_id(reminder_id)?;
        self.reminder_repo.delete_reminder(id).await
    }

    async fn delete_stale_reminders(
        &self,
        cutoff: DateTime<Utc>,
        statuses: &[ReminderStatus],
    ) -> Result<u64> {
        self.reminder_repo.delete_stale(cutoff, statuses).await
    }

    async fn reminder_status_counts(&self, doctor_id: &str) -> Result<BTreeMap<String, u64>> {
        self.reminder_repo.status_counts(doctor_id).await
    }

    async fn count_reminders(&self, filter: &ReminderFilter) -> Result<u64> {
        self.reminder_repo.count(filter).await
    }

    async fn create_appointment(&self, appointment: Appointment) -> Result<Appointment> {
        Ok(self
            .appointment_repo
            .create_appointment(appointment)
            .await?
            .into())
    }

    async fn get_appointment(&self, appointment_id: &str) -> Result<Option<Appointment>> {
        let id = parse_object_id(appointment_id)?;
        Ok(self
            .appointment_repo
            .get_appointment(id)
            .await?
            .map(Into::into))
    }

    async fn list_appointments(&self, doctor_id: &str) -> Result<Vec<Appointment>> {
        let appointments = self.appointment_repo.list_appointments(doctor_id).await?;
        Ok(appointments.into_iter().map(Into::into).collect())
    }

    async fn update_appointment(
        &self,
        appointment_id: &str,
        doctor_id: &str,
        update: AppointmentUpdate,
    ) -> Result<Option<Appointment>> {
        let id = parse_object_id(appointment_id)?;
        Ok(self
            .appointment_repo
            .update_appointment(id, doctor_id, update)
            .await?
            .map(Into::into))
    }

    async fn delete_appointment(&self, appointment_id: &str, doctor_id: &str) -> Result<bool> {
        let id = parse_object_id(appointment_id)?;
        self.appointment_repo
            .delete_appointment(id, doctor_id)
            .await
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}
